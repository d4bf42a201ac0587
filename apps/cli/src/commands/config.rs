//! 配置管理命令
//!
//! 管理默认串口、波特率以及链路和序列器参数

use crate::config::{CliConfig, config_file};
use anyhow::{Context, Result};
use clap::Subcommand;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认串口
        #[arg(short, long)]
        port: Option<String>,

        /// 默认波特率
        #[arg(short, long)]
        baud: Option<u32>,

        /// 应答超时（毫秒）
        #[arg(long)]
        reply_timeout: Option<u64>,

        /// 执行时的轮询间隔（毫秒）
        #[arg(long)]
        poll_interval: Option<u64>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（port, baud_rate, link, sequencer, all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置文件
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud,
                reply_timeout,
                poll_interval,
            } => {
                let mut config = CliConfig::load()?;
                for line in apply_set(&mut config, port, baud, reply_timeout, poll_interval) {
                    println!("✅ {}", line);
                }
                let path = config.save()?;
                println!("💾 已保存到 {}", path.display());
                Ok(())
            },
            ConfigCommand::Get { key } => {
                let config = CliConfig::load()?;
                println!("{}", render_key(&config, &key)?);
                Ok(())
            },
            ConfigCommand::Check => {
                let path = config_file()?;
                println!("配置文件: {}", path.display());
                if !path.exists() {
                    println!("⚠️  文件不存在，使用默认配置");
                }
                let config = CliConfig::load()?;
                match &config.port {
                    Some(port) => println!("  串口: {} @ {}", port, config.baud_rate),
                    None => println!("  串口: (未设置)"),
                }
                println!("✅ 配置有效");
                Ok(())
            },
        }
    }
}

fn apply_set(
    config: &mut CliConfig,
    port: Option<String>,
    baud: Option<u32>,
    reply_timeout: Option<u64>,
    poll_interval: Option<u64>,
) -> Vec<String> {
    let mut changes = Vec::new();
    if let Some(port) = port {
        changes.push(format!("设置默认串口: {}", port));
        config.port = Some(port);
    }
    if let Some(baud) = baud {
        config.baud_rate = baud;
        changes.push(format!("设置波特率: {}", baud));
    }
    if let Some(ms) = reply_timeout {
        config.link.reply_timeout_ms = ms;
        changes.push(format!("设置应答超时: {} ms", ms));
    }
    if let Some(ms) = poll_interval {
        config.sequencer.poll_interval_ms = ms;
        changes.push(format!("设置轮询间隔: {} ms", ms));
    }
    changes
}

fn render_key(config: &CliConfig, key: &str) -> Result<String> {
    let text = match key {
        "port" => config.port.clone().unwrap_or_else(|| "(未设置)".to_string()),
        "baud_rate" | "baud" => config.baud_rate.to_string(),
        "link" => toml::to_string_pretty(&config.link).context("序列化配置失败")?,
        "sequencer" => toml::to_string_pretty(&config.sequencer).context("序列化配置失败")?,
        "all" => toml::to_string_pretty(config).context("序列化配置失败")?,
        other => anyhow::bail!("未知配置项: {}", other),
    };
    Ok(text)
}
