//! 设备应答解析
//!
//! 应答帧回显请求的操作码，载荷第一个字节是 [`ResponseCode`]，其余字节与操作码相关。

use crate::ProtocolError;
use crate::frame::Frame;
use crate::opcode::{Opcode, ResponseCode};
use crate::scale::{unsigned_angle_from_raw, unsigned_angle_to_raw};
use crate::wire::Reader;
use bytes::Bytes;

/// 心跳应答的固定内容
pub const PONG: &[u8; 4] = b"PONG";

/// 一条设备应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    opcode: u8,
    code: ResponseCode,
    data: Bytes,
}

impl Reply {
    pub fn new(opcode: impl Into<u8>, code: ResponseCode, data: impl Into<Bytes>) -> Self {
        Self {
            opcode: opcode.into(),
            code,
            data: data.into(),
        }
    }

    /// 从应答帧解析
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let payload = frame.payload_bytes();
        let Some(&first) = payload.first() else {
            return Err(ProtocolError::EmptyReply {
                opcode: frame.opcode_byte(),
            });
        };
        let code = ResponseCode::try_from(first).map_err(|_| ProtocolError::InvalidValue {
            field: "response_code".to_string(),
            value: first,
        })?;
        Ok(Self {
            opcode: frame.opcode_byte(),
            code,
            data: payload.slice(1..),
        })
    }

    /// 构造应答帧（设备侧/模拟器使用）
    pub fn to_frame(&self, device_id: u8) -> Result<Frame, ProtocolError> {
        let mut payload = Vec::with_capacity(1 + self.data.len());
        payload.push(u8::from(self.code));
        payload.extend_from_slice(&self.data);
        Frame::new(device_id, self.opcode, payload)
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    pub fn opcode_byte(&self) -> u8 {
        self.opcode
    }

    pub fn code(&self) -> ResponseCode {
        self.code
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    /// 应答码之后的数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn buffer_status(&self) -> Result<BufferStatus, ProtocolError> {
        BufferStatus::from_bytes(&self.data)
    }

    pub fn block_ack(&self) -> Result<BlockAck, ProtocolError> {
        BlockAck::from_bytes(&self.data)
    }

    pub fn continuous_info(&self) -> Result<ContinuousInfo, ProtocolError> {
        ContinuousInfo::from_bytes(&self.data)
    }

    pub fn actuator_reading(&self) -> Result<ActuatorReading, ProtocolError> {
        ActuatorReading::from_bytes(&self.data)
    }

    pub fn position_report(&self) -> Result<PositionReport, ProtocolError> {
        PositionReport::from_bytes(&self.data)
    }

    pub fn ping_reply(&self) -> Result<PingReply, ProtocolError> {
        PingReply::from_bytes(&self.data)
    }
}

fn flag(field: &str, byte: u8) -> Result<bool, ProtocolError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProtocolError::InvalidValue {
            field: field.to_string(),
            value: byte,
        }),
    }
}

/// 运动缓冲区状态（0x46 应答）
///
/// # 示例
///
/// ```rust
/// use rig_protocol::BufferStatus;
///
/// let status = BufferStatus::from_bytes(&[0x05, 0x01, 0x00, 0x1B]).unwrap();
/// assert_eq!(status.used, 5);
/// assert!(status.running);
/// assert!(!status.paused);
/// assert_eq!(status.available, 27);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferStatus {
    /// 缓冲区中待执行的块数
    pub used: u8,
    pub running: bool,
    pub paused: bool,
    /// 剩余空位
    pub available: u8,
}

impl BufferStatus {
    pub const LEN: usize = 4;

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(Self::LEN, data.len())?;
        Ok(Self {
            used: data[0],
            running: flag("running", data[1])?,
            paused: flag("paused", data[2])?,
            available: data[3],
        })
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [
            self.used,
            self.running as u8,
            self.paused as u8,
            self.available,
        ]
    }

    /// 缓冲区已空且未运行（执行完毕）
    pub fn is_drained(&self) -> bool {
        self.used == 0 && !self.running
    }
}

/// 添加运动块的确认（0x40/0x50 应答）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAck {
    /// 剩余空位（旧固件不返回）
    pub available: Option<u8>,
}

impl BlockAck {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        match data {
            [] => Ok(Self { available: None }),
            [available] => Ok(Self {
                available: Some(*available),
            }),
            _ => Err(ProtocolError::InvalidLength {
                expected: 1,
                actual: data.len(),
            }),
        }
    }
}

/// 连续旋转舵机信息（0x54 应答）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContinuousInfo {
    pub current_speed: i8,
    pub target_speed: i8,
    pub enabled: bool,
    pub moving: bool,
}

impl ContinuousInfo {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(4, data.len())?;
        Ok(Self {
            current_speed: data[0] as i8,
            target_speed: data[1] as i8,
            enabled: flag("enabled", data[2])?,
            moving: flag("moving", data[3])?,
        })
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [
            self.current_speed as u8,
            self.target_speed as u8,
            self.enabled as u8,
            self.moving as u8,
        ]
    }
}

/// 单轴状态（0x10 应答，角度大端）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorReading {
    pub actuator_id: u8,
    pub angle: f32,
    pub enabled: bool,
}

impl ActuatorReading {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(4, data.len())?;
        let mut r = Reader::new(data);
        Ok(Self {
            actuator_id: r.u8()?,
            angle: unsigned_angle_from_raw(r.u16_be()?),
            enabled: flag("enabled", r.u8()?)?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = vec![self.actuator_id];
        out.extend_from_slice(&unsigned_angle_to_raw("angle", self.angle)?.to_be_bytes());
        out.push(self.enabled as u8);
        Ok(out)
    }
}

/// 全轴位置（0x11 应答，每轴 3 字节：id + 角度大端）
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionReport {
    pub positions: Vec<(u8, f32)>,
}

impl PositionReport {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() % 3 != 0 {
            return Err(ProtocolError::InvalidLength {
                expected: data.len() / 3 * 3,
                actual: data.len(),
            });
        }
        let positions = data
            .chunks_exact(3)
            .map(|c| (c[0], unsigned_angle_from_raw(u16::from_be_bytes([c[1], c[2]]))))
            .collect();
        Ok(Self { positions })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(self.positions.len() * 3);
        for &(id, angle) in &self.positions {
            out.push(id);
            out.extend_from_slice(&unsigned_angle_to_raw("angle", angle)?.to_be_bytes());
        }
        Ok(out)
    }

    pub fn angle_of(&self, actuator_id: u8) -> Option<f32> {
        self.positions
            .iter()
            .find(|(id, _)| *id == actuator_id)
            .map(|(_, angle)| *angle)
    }
}

/// 心跳应答
///
/// 当前固件回复 `"PONG"`，早期固件回复版本号四元组。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingReply {
    Pong,
    Version {
        major: u8,
        minor: u8,
        patch: u8,
        state: u8,
    },
}

impl PingReply {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data == PONG {
            return Ok(PingReply::Pong);
        }
        match data {
            [major, minor, patch, state] => Ok(PingReply::Version {
                major: *major,
                minor: *minor,
                patch: *patch,
                state: *state,
            }),
            _ => Err(ProtocolError::InvalidLength {
                expected: PONG.len(),
                actual: data.len(),
            }),
        }
    }
}

impl std::fmt::Display for PingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PingReply::Pong => write!(f, "PONG"),
            PingReply::Version {
                major,
                minor,
                patch,
                state,
            } => write!(f, "v{}.{}.{} (state {})", major, minor, patch, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_status_decode() {
        let status = BufferStatus::from_bytes(&[0x05, 0x01, 0x00, 0x1B]).unwrap();
        assert_eq!(
            status,
            BufferStatus {
                used: 5,
                running: true,
                paused: false,
                available: 27
            }
        );
        assert!(!status.is_drained());
        assert_eq!(status.to_bytes(), [0x05, 0x01, 0x00, 0x1B]);
    }

    #[test]
    fn test_buffer_status_drained() {
        let status = BufferStatus::from_bytes(&[0, 0, 0, 32]).unwrap();
        assert!(status.is_drained());
    }

    #[test]
    fn test_buffer_status_bad_input() {
        assert!(BufferStatus::from_bytes(&[0x05, 0x01, 0x00]).is_err());
        assert_eq!(
            BufferStatus::from_bytes(&[0x05, 0x02, 0x00, 0x1B]),
            Err(ProtocolError::InvalidValue {
                field: "running".to_string(),
                value: 2
            })
        );
    }

    #[test]
    fn test_reply_from_frame() {
        let frame = Frame::new(0x00, Opcode::QueryBufferStatus, vec![0x00, 0x05, 0x01, 0x00, 0x1B])
            .unwrap();
        let reply = Reply::from_frame(&frame).unwrap();
        assert_eq!(reply.opcode(), Some(Opcode::QueryBufferStatus));
        assert!(reply.is_ok());
        assert_eq!(reply.buffer_status().unwrap().available, 27);
        assert_eq!(reply.to_frame(0x00).unwrap(), frame);
    }

    #[test]
    fn test_reply_error_codes() {
        let frame = Frame::new(0x00, Opcode::AddMotionBlock, vec![0x06]).unwrap();
        let reply = Reply::from_frame(&frame).unwrap();
        assert_eq!(reply.code(), ResponseCode::Busy);
        assert!(!reply.is_ok());
        assert!(reply.data().is_empty());

        let frame = Frame::new(0x00, Opcode::Ping, Vec::new()).unwrap();
        assert_eq!(
            Reply::from_frame(&frame),
            Err(ProtocolError::EmptyReply { opcode: 0xFE })
        );

        let frame = Frame::new(0x00, Opcode::Ping, vec![0x42]).unwrap();
        assert!(matches!(
            Reply::from_frame(&frame),
            Err(ProtocolError::InvalidValue { value: 0x42, .. })
        ));
    }

    #[test]
    fn test_ping_reply() {
        assert_eq!(PingReply::from_bytes(b"PONG").unwrap(), PingReply::Pong);
        assert_eq!(
            PingReply::from_bytes(&[1, 2, 3, 0]).unwrap(),
            PingReply::Version {
                major: 1,
                minor: 2,
                patch: 3,
                state: 0
            }
        );
        assert!(PingReply::from_bytes(&[]).is_err());
        assert_eq!(format!("{}", PingReply::Pong), "PONG");
    }

    #[test]
    fn test_block_ack() {
        assert_eq!(BlockAck::from_bytes(&[]).unwrap().available, None);
        assert_eq!(BlockAck::from_bytes(&[31]).unwrap().available, Some(31));
        assert!(BlockAck::from_bytes(&[1, 2]).is_err());
    }

    #[test]
    fn test_continuous_info() {
        let info = ContinuousInfo::from_bytes(&[0xCE, 0x32, 0x01, 0x01]).unwrap();
        assert_eq!(info.current_speed, -50);
        assert_eq!(info.target_speed, 50);
        assert!(info.enabled && info.moving);
        assert_eq!(info.to_bytes(), [0xCE, 0x32, 0x01, 0x01]);
    }

    #[test]
    fn test_actuator_reading() {
        let reading = ActuatorReading::from_bytes(&[0x02, 0x23, 0x28, 0x01]).unwrap();
        assert_eq!(reading.actuator_id, 2);
        assert!((reading.angle - 90.0).abs() < 0.01);
        assert!(reading.enabled);
        assert_eq!(reading.to_bytes().unwrap(), vec![0x02, 0x23, 0x28, 0x01]);
    }

    #[test]
    fn test_position_report() {
        let report = PositionReport::from_bytes(&[0x00, 0x23, 0x28, 0x01, 0x46, 0x50]).unwrap();
        assert_eq!(report.positions.len(), 2);
        assert_eq!(report.angle_of(1), Some(180.0));
        assert_eq!(report.angle_of(9), None);
        assert!(PositionReport::from_bytes(&[0x00, 0x23]).is_err());
    }
}
