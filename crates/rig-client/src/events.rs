//! 会话事件
//!
//! 序列器把每次状态变化和进度推送给 [`SessionSink`]，默认写入 `tracing` 日志。

use crate::session::{SequencerState, SessionReport};
use crate::timeline::ScheduledBlock;
use rig_protocol::BufferStatus;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SequencerState,
        to: SequencerState,
    },
    BlockUploaded {
        index: usize,
        total: usize,
        block: ScheduledBlock,
        /// 设备回报的剩余空位（旧固件不回报）
        available: Option<u8>,
    },
    BlockRejected {
        index: usize,
        total: usize,
        block: ScheduledBlock,
        error: String,
        /// 当前连续失败次数
        consecutive: u32,
    },
    Status(BufferStatus),
    Finished(SessionReport),
}

/// 会话事件回调（在执行 `execute` 的线程上调用）
pub trait SessionSink: Send + Sync {
    fn on_session_event(&self, event: &SessionEvent);
}

/// 写入 `tracing` 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSessionSink;

impl SessionSink for TracingSessionSink {
    fn on_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged { from, to } => info!("sequencer: {} -> {}", from, to),
            SessionEvent::BlockUploaded { index, total, .. } => {
                // 每 10 条或最后一条输出一次进度
                let done = index + 1;
                if done % 10 == 0 || done == *total {
                    info!("uploaded {}/{} blocks", done, total);
                }
            },
            SessionEvent::BlockRejected {
                index,
                total,
                error,
                consecutive,
                ..
            } => warn!(
                "block {}/{} failed ({} consecutive): {}",
                index + 1,
                total,
                consecutive,
                error
            ),
            SessionEvent::Status(status) => info!(
                "buffer: used={} running={} paused={} available={}",
                status.used, status.running, status.paused, status.available
            ),
            SessionEvent::Finished(report) => info!(
                "session finished: {} (uploaded {}/{}, failed {}, {:.1}s)",
                report.outcome,
                report.uploaded,
                report.total,
                report.failed,
                report.elapsed.as_secs_f64()
            ),
        }
    }
}
