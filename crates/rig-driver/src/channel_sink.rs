//! 通道 sink
//!
//! 把事件转发到有界 crossbeam 通道。通道满时丢弃事件并计数，
//! 读线程永远不会因为消费者慢而阻塞。

use crate::event::LinkEvent;
use crate::sink::EventSink;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 事件过滤器
pub type EventFilter = fn(&LinkEvent) -> bool;

/// 转发到有界通道的 sink
///
/// ```rust
/// use rig_driver::{ChannelSink, EventSink, LinkEvent};
///
/// let (sink, rx) = ChannelSink::new(1);
/// sink.on_link_event(&LinkEvent::Text("a".into()));
/// sink.on_link_event(&LinkEvent::Text("b".into()));
///
/// assert_eq!(rx.try_recv().unwrap(), LinkEvent::Text("a".into()));
/// assert_eq!(sink.dropped(), 1);
/// ```
pub struct ChannelSink {
    tx: Sender<LinkEvent>,
    filter: Option<EventFilter>,
    /// 通道满时丢弃的事件数
    dropped: Arc<AtomicU64>,
    /// 成功转发的事件数
    forwarded: Arc<AtomicU64>,
    /// 接收端已释放
    closed: AtomicBool,
}

impl ChannelSink {
    /// 创建容量为 `capacity` 的通道 sink
    pub fn new(capacity: usize) -> (Self, Receiver<LinkEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                filter: None,
                dropped: Arc::new(AtomicU64::new(0)),
                forwarded: Arc::new(AtomicU64::new(0)),
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// 只转发帧事件（`Link` 的应答通道使用）
    pub fn frames_only(capacity: usize) -> (Self, Receiver<LinkEvent>) {
        let (sink, rx) = Self::new(capacity);
        (sink.with_filter(|event| event.as_frame().is_some()), rx)
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// 与其他 sink 共用一个丢弃计数器
    pub fn with_dropped_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.dropped = counter;
        self
    }

    /// 共享丢弃计数器（可在 sink 注册后继续读取）
    pub fn dropped_counter(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn on_link_event(&self, event: &LinkEvent) {
        if let Some(filter) = self.filter
            && !filter(event)
        {
            return;
        }

        match self.tx.try_send(event.clone()) {
            Ok(()) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
            },
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            },
            Err(TrySendError::Disconnected(_)) => {
                self.closed.store(true, Ordering::Relaxed);
            },
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
