//! 监视设备输出
//!
//! 打印设备文本、应答帧和损坏帧，结束时输出链路统计。

use crate::connection::LinkArgs;
use anyhow::Result;
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use rig_driver::LinkEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 监视时长（秒），0 表示直到 Ctrl-C
    #[arg(short, long, default_value_t = 10)]
    pub seconds: u64,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl MonitorCommand {
    pub fn execute(&self) -> Result<()> {
        let (link, _) = self.link.open()?;
        let events = link.subscribe();

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Release))?;

        let deadline = (self.seconds > 0).then(|| Instant::now() + Duration::from_secs(self.seconds));
        println!("👀 监视设备输出（Ctrl-C 结束）");

        while !stop.load(Ordering::Acquire) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => println!("{}", format_event(&event)),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !link.is_connected() {
                println!("❌ 链路已断开");
                break;
            }
        }

        let metrics = link.metrics();
        println!();
        println!("📊 链路统计:");
        println!("  接收字节: {}", metrics.rx_bytes);
        println!("  应答帧: {}", metrics.rx_frames);
        println!("  文本行: {}", metrics.rx_text_lines);
        println!(
            "  损坏帧: {} ({:.2}%)",
            metrics.rx_corrupt_frames,
            metrics.corrupt_rate() * 100.0
        );
        println!("  订阅丢弃: {}", metrics.subscriber_drops);
        Ok(())
    }
}

fn format_event(event: &LinkEvent) -> String {
    match event {
        LinkEvent::Text(text) => format!("📟 {}", text),
        LinkEvent::Frame(frame) => format!("📦 {}", frame),
        LinkEvent::CorruptFrame { raw, error } => {
            format!("⚠️  损坏帧 ({}): {}", error, hex::encode_upper(raw))
        },
        LinkEvent::ReaderExited { error } => format!("❌ 读线程退出: {}", error),
    }
}
