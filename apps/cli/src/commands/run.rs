//! run 命令
//!
//! 上传并执行时间线文件，Ctrl-C 取消

use crate::connection::LinkArgs;
use anyhow::{Context, Result};
use clap::Args;
use rig_client::{
    CancelToken, ScheduledBlock, Sequencer, SequencerState, SessionEvent, SessionSink, Timeline,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 时间线执行参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 时间线文件（TOML）
    #[arg(short, long)]
    pub timeline: PathBuf,

    /// 只打印展开后的运动块，不连接设备
    #[arg(long)]
    pub dry_run: bool,

    /// 把执行报告写入 JSON 文件
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        println!("📜 加载时间线: {}", self.timeline.display());
        let timeline = load_timeline(&self.timeline)?;
        let blocks = timeline.flatten();
        println!(
            "📋 {} 条轨道, {} 个运动块",
            timeline.tracks.len(),
            blocks.len()
        );

        if self.dry_run {
            for block in &blocks {
                println!("  {}", describe_block(block));
            }
            return Ok(());
        }

        let (link, config) = self.link.open()?;

        let cancel = CancelToken::new();
        let handle = cancel.clone();
        ctrlc::set_handler(move || {
            println!();
            println!("⚠️  收到 Ctrl-C，正在停止...");
            handle.cancel();
        })
        .context("设置 Ctrl-C 处理失败")?;

        let sequencer =
            Sequencer::new(&link, config.sequencer.clone()).with_sink(Arc::new(ConsoleSink));
        let report = sequencer.execute(&timeline, &cancel)?;

        println!();
        println!("📊 执行结果:");
        println!("  状态: {}", report.outcome);
        println!("  上传: {}/{}", report.uploaded, report.total);
        println!("  失败: {}", report.failed);
        println!("  耗时: {:.2} 秒", report.elapsed.as_secs_f64());

        if let Some(path) = &self.report {
            let json = serde_json::to_string_pretty(&report)?;
            fs::write(path, json)
                .with_context(|| format!("写入报告失败: {}", path.display()))?;
            println!("💾 报告已保存: {}", path.display());
        }

        report.into_result()?;
        Ok(())
    }
}

fn load_timeline(path: &Path) -> Result<Timeline> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取时间线失败: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("解析时间线失败: {}", path.display()))
}

fn describe_block(block: &ScheduledBlock) -> String {
    match block {
        ScheduledBlock::Position(b) => format!(
            "{:>7} ms  #{:<2} -> {:>7.2}°  v={} a={} d={}",
            b.timestamp_ms, b.actuator_id, b.target, b.velocity, b.acceleration, b.deceleration
        ),
        ScheduledBlock::Continuous(b) => format!(
            "{:>7} ms  #{:<2} ~ {:>4}%  +{}/-{} for {} ms",
            b.timestamp_ms, b.actuator_id, b.speed_percent, b.accel_rate, b.decel_rate, b.duration_ms
        ),
    }
}

/// 终端进度输出
struct ConsoleSink;

impl SessionSink for ConsoleSink {
    fn on_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged { to, .. } => match to {
                SequencerState::ClearingBuffer => println!("🧹 清空运动缓冲区..."),
                SequencerState::Uploading => println!("⬆️  上传运动块..."),
                SequencerState::Starting => println!("🚀 开始执行..."),
                SequencerState::Running => println!("▶️  执行中（Ctrl-C 取消）"),
                SequencerState::Completed => println!("✅ 执行完成"),
                SequencerState::Cancelled => println!("⏹️  已取消"),
                SequencerState::Failed(reason) => println!("❌ 失败: {}", reason),
                SequencerState::Idle => {},
            },
            SessionEvent::BlockUploaded { index, total, .. } => {
                let done = index + 1;
                if done % 10 == 0 || done == *total {
                    println!("  {}/{}", done, total);
                }
            },
            SessionEvent::BlockRejected {
                index,
                error,
                consecutive,
                ..
            } => println!("  ⚠️  块 {} 失败 ({}): {}", index + 1, consecutive, error),
            SessionEvent::Status(status) => println!(
                "  缓冲区: 待执行 {} / 空位 {}{}",
                status.used,
                status.available,
                if status.running { "" } else { " (未运行)" }
            ),
            SessionEvent::Finished(_) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW: &str = r#"
[[tracks]]
actuator_id = 2
name = "shoulder"

[[tracks.events]]
at_ms = 1000
kind = "position"
target = 45.0

[[tracks.events]]
at_ms = 0
kind = "position"
target = -10.5
velocity = 90.0

[[tracks]]
actuator_id = 7
name = "wheel"

[[tracks.events]]
at_ms = 500
kind = "continuous"
speed_percent = 80
duration_ms = 300
"#;

    #[test]
    fn test_load_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.toml");
        fs::write(&path, SHOW).unwrap();

        let timeline = load_timeline(&path).unwrap();
        let blocks = timeline.flatten();
        let times: Vec<u32> = blocks.iter().map(ScheduledBlock::timestamp_ms).collect();
        assert_eq!(times, vec![0, 500, 1000]);
        assert!(describe_block(&blocks[0]).contains("-10.50°"));
        assert!(describe_block(&blocks[1]).contains("80%"));
    }

    #[test]
    fn test_missing_timeline() {
        assert!(load_timeline(Path::new("/nonexistent/show.toml")).is_err());
    }
}
