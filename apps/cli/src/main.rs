//! # Rig CLI
//!
//! 舵机控制板命令行工具。
//!
//! ```bash
//! # 配置默认串口
//! rig-cli config set --port /dev/ttyACM0
//!
//! # 即时命令（内部：连接 -> 命令 -> 断开）
//! rig-cli ping
//! rig-cli enable --id 3
//! rig-cli move --id 3 --angle 90 --duration 1000
//!
//! # 上传并执行时间线，Ctrl-C 取消
//! rig-cli run --timeline dance.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod connection;

use commands::{
    ConfigCommand, DisableCommand, EnableCommand, EstopCommand, MonitorCommand, MoveCommand,
    PingCommand, PortsCommand, RunCommand, StatusCommand, TrapezoidCommand,
};

/// Rig CLI - 舵机控制板命令行工具
#[derive(Parser, Debug)]
#[command(name = "rig-cli")]
#[command(about = "Command-line interface for serial motion rigs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出可用串口
    Ports(PortsCommand),

    /// 心跳检测
    Ping(PingCommand),

    /// 定时运动（单轴或全部）
    Move(MoveCommand),

    /// 梯形速度曲线运动
    Trapezoid(TrapezoidCommand),

    /// 使能舵机
    Enable(EnableCommand),

    /// 失能舵机
    Disable(DisableCommand),

    /// 急停
    Estop(EstopCommand),

    /// 查询缓冲区状态和位置
    Status(StatusCommand),

    /// 上传并执行时间线
    Run(RunCommand),

    /// 打印设备输出
    Monitor(MonitorCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rig_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Ports(cmd) => cmd.execute(),
        Commands::Ping(cmd) => cmd.execute(),
        Commands::Move(cmd) => cmd.execute(),
        Commands::Trapezoid(cmd) => cmd.execute(),
        Commands::Enable(cmd) => cmd.execute(),
        Commands::Disable(cmd) => cmd.execute(),
        Commands::Estop(cmd) => cmd.execute(),
        Commands::Status(cmd) => cmd.execute(),
        Commands::Run(cmd) => cmd.execute(),
        Commands::Monitor(cmd) => cmd.execute(),
    }
}
