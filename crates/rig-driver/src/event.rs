//! 链路事件
//!
//! 读线程产生的不可变事件，通过 sink 和通道发布给订阅者。

use bytes::Bytes;
use rig_protocol::{DecodeError, Frame};

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// 一帧通过校验的协议帧
    Frame(Frame),

    /// 一行设备调试文本（已去除首尾空白）
    Text(String),

    /// 完整但校验失败的帧（已丢弃帧头并重新同步）
    CorruptFrame { raw: Bytes, error: DecodeError },

    /// 读线程因传输错误退出，链路已断开
    ReaderExited { error: String },
}

impl LinkEvent {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            LinkEvent::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            LinkEvent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, LinkEvent::CorruptFrame { .. })
    }
}
