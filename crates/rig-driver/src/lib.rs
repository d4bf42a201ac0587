//! # Rig Driver
//!
//! 串口链路层，负责：
//! - 字节流解帧（帧与设备文本混合输出）
//! - 后台读线程与事件分发（sink / 订阅通道）
//! - 命令发送、请求/应答匹配
//! - 链路状态、指标与存活检测
//!
//! 大多数调用方应使用 `rig-client` 提供的 `Commander` 和 `Sequencer`。

mod builder;
pub mod channel_sink;
mod config;
pub mod deframer;
mod error;
mod event;
mod link;
pub mod metrics;
pub mod monitor;
mod reader;
pub mod sink;
pub mod state;

pub use builder::LinkBuilder;
pub use channel_sink::ChannelSink;
pub use config::LinkConfig;
pub use deframer::StreamDeframer;
pub use error::LinkError;
pub use event::LinkEvent;
pub use link::Link;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use monitor::ConnectionMonitor;
pub use sink::{EventSink, SinkRegistry, TracingSink};
pub use state::{AtomicLinkState, EnableMask, LinkState};
