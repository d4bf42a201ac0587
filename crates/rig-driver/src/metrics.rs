//! 链路指标
//!
//! 原子计数器，读线程和调用方线程都可以无锁更新；任何线程都可以读取快照。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
///
/// ```rust
/// use rig_driver::LinkMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LinkMetrics::new();
/// metrics.rx_frames.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_frames, 1);
/// ```
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 读到的总字节数
    pub rx_bytes: AtomicU64,

    /// 通过校验的帧数
    pub rx_frames: AtomicU64,

    /// 设备文本行数
    pub rx_text_lines: AtomicU64,

    /// 校验失败被丢弃的帧数
    pub rx_corrupt_frames: AtomicU64,

    /// 读超时次数（空闲链路上的正常现象）
    pub rx_timeouts: AtomicU64,

    /// 成功写出的帧数
    pub tx_frames: AtomicU64,

    /// 写失败次数（含写超时）
    pub tx_errors: AtomicU64,

    /// 请求等待应答超时次数
    pub reply_timeouts: AtomicU64,

    /// 订阅通道满时丢弃的事件数（所有订阅者共享）
    pub subscriber_drops: Arc<AtomicU64>,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_text_lines: self.rx_text_lines.load(Ordering::Relaxed),
            rx_corrupt_frames: self.rx_corrupt_frames.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            reply_timeouts: self.reply_timeouts.load(Ordering::Relaxed),
            subscriber_drops: self.subscriber_drops.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.rx_bytes.store(0, Ordering::Relaxed);
        self.rx_frames.store(0, Ordering::Relaxed);
        self.rx_text_lines.store(0, Ordering::Relaxed);
        self.rx_corrupt_frames.store(0, Ordering::Relaxed);
        self.rx_timeouts.store(0, Ordering::Relaxed);
        self.tx_frames.store(0, Ordering::Relaxed);
        self.tx_errors.store(0, Ordering::Relaxed);
        self.reply_timeouts.store(0, Ordering::Relaxed);
        self.subscriber_drops.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub rx_bytes: u64,
    pub rx_frames: u64,
    pub rx_text_lines: u64,
    pub rx_corrupt_frames: u64,
    pub rx_timeouts: u64,
    pub tx_frames: u64,
    pub tx_errors: u64,
    pub reply_timeouts: u64,
    pub subscriber_drops: u64,
}

impl MetricsSnapshot {
    /// 坏帧占全部帧的百分比，没有收到帧时为 0
    pub fn corrupt_rate(&self) -> f64 {
        let total = self.rx_frames + self.rx_corrupt_frames;
        if total == 0 {
            return 0.0;
        }
        (self.rx_corrupt_frames as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = LinkMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.corrupt_rate(), 0.0);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = LinkMetrics::new();
        metrics.rx_bytes.fetch_add(512, Ordering::Relaxed);
        metrics.tx_frames.fetch_add(3, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().rx_bytes, 512);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_corrupt_rate() {
        let snapshot = MetricsSnapshot {
            rx_frames: 3,
            rx_corrupt_frames: 1,
            ..Default::default()
        };
        assert!((snapshot.corrupt_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(LinkMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.rx_frames.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().rx_frames, 4000);
    }
}
