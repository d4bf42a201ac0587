//! 命令定义和实现

pub mod config;
pub mod monitor;
pub mod motion;
pub mod ping;
pub mod ports;
pub mod power;
pub mod run;
pub mod status;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
pub use motion::{MoveCommand, TrapezoidCommand};
pub use ping::PingCommand;
pub use ports::PortsCommand;
pub use power::{DisableCommand, EnableCommand, EstopCommand};
pub use run::RunCommand;
pub use status::StatusCommand;
