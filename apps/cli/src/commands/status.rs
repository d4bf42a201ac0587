//! 状态查询

use crate::connection::LinkArgs;
use anyhow::{Context, Result};
use clap::Args;
use rig_client::Commander;
use rig_protocol::{BufferStatus, PositionReport};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 同时查询全部舵机位置
    #[arg(long)]
    pub positions: bool,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    buffer: BufferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    positions: Option<Vec<(u8, f32)>>,
}

impl StatusCommand {
    pub fn execute(&self) -> Result<()> {
        let (link, _) = self.link.open()?;
        let commander = Commander::new(&link);

        let buffer = commander.buffer_status().context("查询缓冲区状态失败")?;
        let positions = if self.positions {
            Some(commander.query_all_positions().context("查询位置失败")?)
        } else {
            None
        };

        if self.json {
            let output = StatusOutput {
                buffer,
                positions: positions.map(|report| report.positions),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_status(&buffer, positions.as_ref());
        }
        Ok(())
    }
}

fn print_status(buffer: &BufferStatus, positions: Option<&PositionReport>) {
    let state = match (buffer.running, buffer.paused) {
        (true, true) => "⏸️  已暂停",
        (true, false) => "▶️  执行中",
        _ => "⏹️  空闲",
    };
    println!("📊 运动缓冲区: {}", state);
    println!("  待执行: {}", buffer.used);
    println!("  剩余空位: {}", buffer.available);

    if let Some(report) = positions {
        println!("📐 舵机位置:");
        for (id, angle) in &report.positions {
            println!("  #{:<2} {:>8.2}°", id, angle);
        }
    }
}
