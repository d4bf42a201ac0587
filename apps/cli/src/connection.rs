//! 连接参数与链路建立

use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use rig_driver::{Link, LinkBuilder};

/// 串口参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// 串口（如 /dev/ttyACM0, COM3）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long)]
    pub baud: Option<u32>,
}

impl LinkArgs {
    /// 命令行参数优先，其次配置文件
    pub fn resolve_port(&self, config: &CliConfig) -> Result<String> {
        self.port
            .clone()
            .or_else(|| config.port.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("未指定串口，请使用 --port 或 `rig-cli config set --port <PORT>`")
            })
    }

    pub fn resolve_baud(&self, config: &CliConfig) -> u32 {
        self.baud.unwrap_or(config.baud_rate)
    }

    /// 加载配置并打开链路
    pub fn open(&self) -> Result<(Link, CliConfig)> {
        let config = CliConfig::load()?;
        let port = self.resolve_port(&config)?;
        let baud = self.resolve_baud(&config);

        println!("🔌 连接到 {} @ {}...", port, baud);
        let link = LinkBuilder::new()
            .port(&port)
            .baud_rate(baud)
            .config(config.link.clone())
            .build()
            .with_context(|| format!("打开串口 {} 失败", port))?;
        Ok((link, config))
    }
}
