//! 事件接收器（Event Sink）
//!
//! 读线程把每个 [`LinkEvent`] 分发给已注册的 sink。sink 运行在读线程上，
//! 必须立即返回：需要耗时处理时应转发到通道（见 [`ChannelSink`](crate::ChannelSink)）。
//!
//! ```rust
//! use rig_driver::{ChannelSink, EventSink, SinkRegistry, TracingSink};
//! use std::sync::Arc;
//!
//! let mut sinks = SinkRegistry::new();
//! sinks.add(Arc::new(TracingSink));
//!
//! let (channel, rx) = ChannelSink::new(16);
//! sinks.add(Arc::new(channel));
//! assert_eq!(sinks.len(), 2);
//! # drop(rx);
//! ```

use crate::event::LinkEvent;
use rig_protocol::Frame;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 链路事件回调
///
/// # 性能要求
///
/// - 非阻塞：禁止 I/O、长时间持锁
/// - 推荐使用 `try_send` 转发
pub trait EventSink: Send + Sync {
    /// 读线程产生事件时调用
    fn on_link_event(&self, event: &LinkEvent);

    /// 帧成功写入传输后调用（可选）
    ///
    /// 写失败的帧不会触发。
    fn on_frame_sent(&self, frame: &Frame) {
        let _ = frame;
    }

    /// 不再需要事件（如订阅者已释放接收端），注册表会移除它
    fn is_closed(&self) -> bool {
        false
    }
}

/// sink 列表
///
/// 构造 `Link` 时确定，之后只读，读线程和写调用共享同一个 `Arc<SinkRegistry>`。
#[derive(Default, Clone)]
pub struct SinkRegistry {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl SinkRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// 移除已关闭的 sink
    pub fn prune(&mut self) {
        self.sinks.retain(|sink| !sink.is_closed());
    }

    /// 分发接收事件
    pub fn dispatch(&self, event: &LinkEvent) {
        for sink in &self.sinks {
            sink.on_link_event(event);
        }
    }

    /// 分发发送事件
    pub fn dispatch_sent(&self, frame: &Frame) {
        for sink in &self.sinks {
            sink.on_frame_sent(frame);
        }
    }
}

impl FromIterator<Arc<dyn EventSink>> for SinkRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn EventSink>>>(iter: I) -> Self {
        Self {
            sinks: iter.into_iter().collect(),
        }
    }
}

/// 把事件写入 `tracing` 日志
///
/// 文本行用 `info!`（设备启动日志对操作者有用），帧用 `debug!`，坏帧用 `warn!`。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_link_event(&self, event: &LinkEvent) {
        match event {
            LinkEvent::Frame(frame) => debug!("rx {}", frame),
            LinkEvent::Text(line) => info!(target: "rig_driver::device", "{}", line),
            LinkEvent::CorruptFrame { raw, error } => {
                warn!("corrupt frame dropped: {} ({})", error, hex::encode(raw))
            },
            LinkEvent::ReaderExited { error } => warn!("reader exited: {}", error),
        }
    }

    fn on_frame_sent(&self, frame: &Frame) {
        trace!("tx {}", hex::encode(frame.to_bytes()));
    }
}
