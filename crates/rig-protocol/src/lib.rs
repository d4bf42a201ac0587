//! # Rig Protocol
//!
//! 舵机控制板串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `crc`: CRC-16/CCITT-FALSE 校验
//! - `frame`: 帧编解码（`FF FE | id | opcode | len | payload | crc`）
//! - `opcode`: 操作码和响应码
//! - `scale`: 角度/速度的定点缩放
//! - `command`: 每个操作的载荷编码（封闭枚举）
//! - `reply`: 设备应答解析
//!
//! ## 字节序
//!
//! - 帧尾 CRC 高位在前
//! - 缓冲运动块（0x40/0x50）使用小端
//! - 即时控制命令（0x01/0x03/0x04/0x33）及查询应答使用大端，与固件一致

pub mod command;
pub mod crc;
pub mod frame;
pub mod opcode;
pub mod reply;
pub mod scale;
mod wire;

pub use command::*;
pub use crc::checksum;
pub use frame::*;
pub use opcode::*;
pub use reply::*;
pub use scale::*;

use thiserror::Error;

/// 协议层错误类型
///
/// 帧级别的结构错误见 [`DecodeError`]，这里只覆盖载荷编码和应答解析。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Value out of range for field {field}: {value}")]
    ValueOutOfRange { field: &'static str, value: f64 },

    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },

    #[error("Unknown opcode: 0x{opcode:02X}")]
    UnknownOpcode { opcode: u8 },

    #[error("Empty reply for opcode 0x{opcode:02X}")]
    EmptyReply { opcode: u8 },

    #[error("Unexpected reply opcode: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedOpcode { expected: u8, actual: u8 },
}

impl ProtocolError {
    /// 检查载荷长度是否与期望一致
    pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), ProtocolError> {
        if expected == actual {
            Ok(())
        } else {
            Err(ProtocolError::InvalidLength { expected, actual })
        }
    }
}
