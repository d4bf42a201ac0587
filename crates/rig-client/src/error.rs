//! 客户端层错误类型

use rig_driver::LinkError;
use rig_protocol::ProtocolError;
use std::fmt;
use thiserror::Error;

/// 运动会话失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureReason {
    /// 清空缓冲区失败（缓冲区可能残留旧指令，不能继续）
    ClearFailed,
    /// 连续上传失败达到上限
    UploadAborted,
    /// 没有任何运动块上传成功
    NothingUploaded,
    /// 启动执行失败
    StartFailed,
    /// 超过预计执行时长仍未完成
    Timeout,
    /// 链路断开
    LinkLost,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::ClearFailed => "clearing the motion buffer failed",
            FailureReason::UploadAborted => "upload aborted after consecutive failures",
            FailureReason::NothingUploaded => "no motion block was uploaded",
            FailureReason::StartFailed => "starting motion failed",
            FailureReason::Timeout => "execution exceeded the estimated duration",
            FailureReason::LinkLost => "link lost",
        };
        f.write_str(text)
    }
}

/// 运动序列器错误
#[derive(Error, Debug)]
pub enum SequencerError {
    /// 同一个序列器上已有会话在执行
    #[error("A motion session is already running")]
    Busy,

    #[error("Motion session failed: {0}")]
    Failed(FailureReason),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SequencerError {
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            SequencerError::Failed(reason) => Some(*reason),
            _ => None,
        }
    }
}
