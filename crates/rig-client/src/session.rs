//! 运动会话
//!
//! 每次执行创建一个 [`SequencerSession`]，结束（完成、取消、失败）后丢弃。

use crate::error::{FailureReason, SequencerError};
use crate::timeline::ScheduledBlock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 会话状态
///
/// ```text
/// Idle -> ClearingBuffer -> Uploading -> Starting -> Running -> Completed
///                                                             \-> Cancelled
///                                                             \-> Failed(reason)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SequencerState {
    #[default]
    Idle,
    ClearingBuffer,
    Uploading,
    Starting,
    Running,
    Completed,
    Cancelled,
    Failed(FailureReason),
}

impl SequencerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SequencerState::Completed | SequencerState::Cancelled | SequencerState::Failed(_)
        )
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerState::Idle => f.write_str("idle"),
            SequencerState::ClearingBuffer => f.write_str("clearing-buffer"),
            SequencerState::Uploading => f.write_str("uploading"),
            SequencerState::Starting => f.write_str("starting"),
            SequencerState::Running => f.write_str("running"),
            SequencerState::Completed => f.write_str("completed"),
            SequencerState::Cancelled => f.write_str("cancelled"),
            SequencerState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// 协作式取消标志
///
/// 序列器在每个运动块上传前和每次轮询时检查，不会打断正在进行的发送。
///
/// ```rust
/// use rig_client::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// 一次执行的工作状态
#[derive(Debug, Clone)]
pub struct SequencerSession {
    blocks: Vec<ScheduledBlock>,
    actuators: BTreeSet<u8>,
    pub(crate) uploaded: usize,
    pub(crate) failed: usize,
    pub(crate) state: SequencerState,
}

impl SequencerSession {
    /// `blocks` 必须已经排好序（见 `Timeline::flatten`）
    pub fn new(blocks: Vec<ScheduledBlock>) -> Self {
        let actuators = blocks.iter().map(ScheduledBlock::actuator_id).collect();
        Self {
            blocks,
            actuators,
            uploaded: 0,
            failed: 0,
            state: SequencerState::Idle,
        }
    }

    pub fn blocks(&self) -> &[ScheduledBlock] {
        &self.blocks
    }

    /// 涉及的舵机（升序）
    pub fn actuators(&self) -> &BTreeSet<u8> {
        &self.actuators
    }

    pub fn uploaded(&self) -> usize {
        self.uploaded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// 最后一个块的时间戳，即时间线长度
    pub fn span(&self) -> Duration {
        let last = self.blocks.last().map_or(0, ScheduledBlock::timestamp_ms);
        Duration::from_millis(u64::from(last))
    }
}

/// 执行结果
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionReport {
    /// 终止状态
    pub outcome: SequencerState,
    pub uploaded: usize,
    pub failed: usize,
    /// 运动块总数
    pub total: usize,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == SequencerState::Completed
    }

    /// `Failed(reason)` 转换为 `SequencerError::Failed(reason)`，其余原样返回
    pub fn into_result(self) -> Result<SessionReport, SequencerError> {
        match self.outcome {
            SequencerState::Failed(reason) => Err(SequencerError::Failed(reason)),
            _ => Ok(self),
        }
    }
}
