//! 列出串口

use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct PortsCommand {}

impl PortsCommand {
    pub fn execute(&self) -> Result<()> {
        let ports = rig_serial::list_ports().context("枚举串口失败")?;
        if ports.is_empty() {
            println!("⚠️  未找到串口");
            return Ok(());
        }

        println!("📋 可用串口:");
        for port in ports {
            println!("  {}  {}", port.name, port.description);
        }
        Ok(())
    }
}
