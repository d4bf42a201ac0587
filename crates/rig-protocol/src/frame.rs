//! 帧编解码
//!
//! 线上格式（从左到右）：
//!
//! ```text
//! 0xFF 0xFE | device_id | opcode | length | payload[length] | crc_hi | crc_lo
//! ```
//!
//! CRC 覆盖 `device_id..payload`，帧总长 `7 + length`。

use crate::ProtocolError;
use crate::crc::checksum;
use crate::opcode::Opcode;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// 帧头标记
pub const MARKER: [u8; 2] = [0xFF, 0xFE];

/// 读出 `length` 字段所需的最少字节数（帧头 + id + opcode + length）
pub const HEADER_LEN: usize = 5;

/// 帧头 + 元数据 + CRC 的固定开销
pub const FRAME_OVERHEAD: usize = 7;

/// 单帧最大载荷
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// 默认/广播设备地址
pub const BROADCAST_ID: u8 = 0x00;

/// 帧解析错误
///
/// `Truncated` 表示需要更多字节；`ChecksumMismatch` 表示帧已完整但内容损坏，
/// 上层据此决定是等待还是丢弃重同步。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Bad frame marker")]
    BadMarker,

    #[error("Frame length mismatch: declared {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}

impl DecodeError {
    /// 是否只是数据不足（继续等待即可）
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

/// 一条完整的协议消息
///
/// 帧头、长度和 CRC 都由内容推导，因此 `Frame` 总是自洽的。
/// 构造后不可修改，`payload` 使用 `Bytes` 共享底层缓冲，克隆成本很低。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    device_id: u8,
    opcode: u8,
    payload: Bytes,
}

impl Frame {
    /// 构造帧
    ///
    /// 载荷超过 255 字节时返回 `PayloadTooLarge`。
    pub fn new(
        device_id: u8,
        opcode: impl Into<u8>,
        payload: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self {
            device_id,
            opcode: opcode.into(),
            payload,
        })
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// 原始操作码字节
    pub fn opcode_byte(&self) -> u8 {
        self.opcode
    }

    /// 已知操作码（未知值返回 `None`）
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 共享的载荷缓冲
    pub fn payload_bytes(&self) -> &Bytes {
        &self.payload
    }

    /// 线上总长度
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// 校验值（覆盖 id、opcode、length、payload）
    pub fn checksum(&self) -> u16 {
        let mut body = Vec::with_capacity(3 + self.payload.len());
        self.write_body(&mut body);
        checksum(&body)
    }

    /// 序列化为线上字节
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.extend_from_slice(&MARKER);
        self.write_body(&mut out);
        let crc = checksum(&out[MARKER.len()..]);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        out.push(self.device_id);
        out.push(self.opcode);
        // new() 已保证长度不超过 255
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id=0x{:02X} op=0x{:02X} len={} [",
            self.device_id,
            self.opcode,
            self.payload.len()
        )?;
        for (i, byte) in self.payload.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        write!(f, "]")
    }
}

/// 编码一帧
///
/// # 示例
///
/// ```rust
/// use rig_protocol::{encode, Opcode};
///
/// let bytes = encode(0x00, Opcode::Ping, &[]).unwrap();
/// assert_eq!(bytes, vec![0xFF, 0xFE, 0x00, 0xFE, 0x00, 0xFC, 0x52]);
/// ```
pub fn encode(
    device_id: u8,
    opcode: impl Into<u8>,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let frame = Frame::new(device_id, opcode, Bytes::copy_from_slice(payload))?;
    Ok(frame.to_bytes())
}

/// 根据帧头计算完整帧长度
///
/// 字节数不足 `HEADER_LEN` 时返回 `None`。不检查帧头标记。
pub fn frame_len(header: &[u8]) -> Option<usize> {
    header
        .get(HEADER_LEN - 1)
        .map(|&len| FRAME_OVERHEAD + len as usize)
}

/// 解码一帧
///
/// `bytes` 必须恰好是一帧：不足返回 `Truncated`，多余返回 `LengthMismatch`。
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.len() >= MARKER.len() && bytes[..MARKER.len()] != MARKER {
        return Err(DecodeError::BadMarker);
    }

    let declared = frame_len(bytes).ok_or(DecodeError::Truncated {
        needed: HEADER_LEN,
        available: bytes.len(),
    })?;

    if bytes.len() < declared {
        return Err(DecodeError::Truncated {
            needed: declared,
            available: bytes.len(),
        });
    }
    if bytes.len() > declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let body = &bytes[MARKER.len()..declared - 2];
    let expected = checksum(body);
    let actual = u16::from_be_bytes([bytes[declared - 2], bytes[declared - 1]]);
    if expected != actual {
        return Err(DecodeError::ChecksumMismatch { expected, actual });
    }

    Ok(Frame {
        device_id: bytes[2],
        opcode: bytes[3],
        payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..declared - 2]),
    })
}
