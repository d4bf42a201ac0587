//! 链路层错误类型定义

use rig_protocol::{ProtocolError, ResponseCode};
use rig_serial::SerialError;
use thiserror::Error;

/// 链路层错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 串口传输错误
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编码/解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 链路未连接（或读线程已因故障退出）
    #[error("Link is not connected")]
    NotConnected,

    /// 重复连接
    #[error("Link is already connected")]
    AlreadyConnected,

    /// 写超时（设备不读串口或线缆异常）
    #[error("Write timeout")]
    WriteTimeout,

    /// 等待应答超时
    #[error("No reply to opcode 0x{opcode:02X} within timeout")]
    ReplyTimeout { opcode: u8 },

    /// 设备返回非 OK 应答码
    #[error("Device rejected opcode 0x{opcode:02X}: {code}")]
    Rejected { opcode: u8, code: ResponseCode },

    /// 事件通道已关闭（读线程退出）
    #[error("Event channel closed")]
    ChannelClosed,

    /// 读线程错误
    #[error("Reader thread error: {0}")]
    ReaderThread(String),
}

impl LinkError {
    /// 是否表示链路已经丢失（会话应立即终止）
    pub fn is_link_lost(&self) -> bool {
        match self {
            LinkError::NotConnected | LinkError::ChannelClosed | LinkError::ReaderThread(_) => {
                true
            },
            LinkError::Serial(err) => !err.is_timeout(),
            _ => false,
        }
    }
}
