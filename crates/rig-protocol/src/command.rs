//! 命令编码
//!
//! 每个操作对应 [`Command`] 的一个变体，载荷是固定结构体，编译期即可确定字段。
//! [`Command::parse`] 是 [`Command::encode_payload`] 的逆过程，
//! 用于帧日志、模拟设备和缩放系数的往返测试。

use crate::ProtocolError;
use crate::frame::Frame;
use crate::opcode::Opcode;
use crate::scale::{
    angle_from_raw, angle_to_raw, rate_from_raw, rate_to_raw, unsigned_angle_from_raw,
    unsigned_angle_to_raw,
};
use crate::wire::Reader;

/// 当前固件的舵机数量（全轴命令的默认 N）
pub const DEFAULT_ACTUATOR_COUNT: usize = 18;

/// "全部舵机" 的地址字节
pub const ALL_ACTUATORS: u8 = 0xFF;

/// 连续旋转速度的合法范围（百分比）
pub const SPEED_PERCENT_RANGE: std::ops::RangeInclusive<i8> = -100..=100;

/// 舵机选择：单个或全部（0xFF）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActuatorSelect {
    One(u8),
    All,
}

impl ActuatorSelect {
    pub fn to_byte(self) -> u8 {
        match self {
            ActuatorSelect::One(id) => id,
            ActuatorSelect::All => ALL_ACTUATORS,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        if byte == ALL_ACTUATORS {
            ActuatorSelect::All
        } else {
            ActuatorSelect::One(byte)
        }
    }
}

impl From<u8> for ActuatorSelect {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

/// 单轴定时运动（0x01，大端）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SingleMove {
    pub actuator_id: u8,
    /// 目标角度（度）
    pub angle: f32,
    pub duration_ms: u16,
}

impl SingleMove {
    pub const PAYLOAD_LEN: usize = 5;

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        out.push(self.actuator_id);
        out.extend_from_slice(&angle_to_raw("angle", self.angle)?.to_be_bytes());
        out.extend_from_slice(&self.duration_ms.to_be_bytes());
        Ok(())
    }

    fn read(payload: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(Self::PAYLOAD_LEN, payload.len())?;
        let mut r = Reader::new(payload);
        Ok(Self {
            actuator_id: r.u8()?,
            angle: angle_from_raw(r.i16_be()?),
            duration_ms: r.u16_be()?,
        })
    }
}

/// 全轴同步运动（0x03，大端）
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupMove {
    /// 按舵机编号排列的目标角度
    pub angles: Vec<f32>,
    pub duration_ms: u16,
}

impl GroupMove {
    fn write(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        for &angle in &self.angles {
            out.extend_from_slice(&angle_to_raw("angle", angle)?.to_be_bytes());
        }
        out.extend_from_slice(&self.duration_ms.to_be_bytes());
        Ok(())
    }

    fn read(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 2 || payload.len() % 2 != 0 {
            return Err(ProtocolError::InvalidLength {
                expected: payload.len().max(2) / 2 * 2,
                actual: payload.len(),
            });
        }
        let count = (payload.len() - 2) / 2;
        let mut r = Reader::new(payload);
        let mut angles = Vec::with_capacity(count);
        for _ in 0..count {
            angles.push(angle_from_raw(r.i16_be()?));
        }
        Ok(Self {
            angles,
            duration_ms: r.u16_be()?,
        })
    }
}

/// 带速度曲线的即时梯形运动（0x04，大端，9 字节）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrapezoidMove {
    pub actuator_id: u8,
    pub angle: f32,
    pub velocity: f32,
    pub acceleration: f32,
    /// 0 表示与加速度相同
    pub deceleration: f32,
}

impl TrapezoidMove {
    pub const PAYLOAD_LEN: usize = 9;

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        out.push(self.actuator_id);
        out.extend_from_slice(&angle_to_raw("angle", self.angle)?.to_be_bytes());
        out.extend_from_slice(&rate_to_raw("velocity", self.velocity)?.to_be_bytes());
        out.extend_from_slice(&rate_to_raw("acceleration", self.acceleration)?.to_be_bytes());
        out.extend_from_slice(&rate_to_raw("deceleration", self.deceleration)?.to_be_bytes());
        Ok(())
    }

    fn read(payload: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(Self::PAYLOAD_LEN, payload.len())?;
        let mut r = Reader::new(payload);
        Ok(Self {
            actuator_id: r.u8()?,
            angle: angle_from_raw(r.i16_be()?),
            velocity: rate_from_raw(r.u16_be()?),
            acceleration: rate_from_raw(r.u16_be()?),
            deceleration: rate_from_raw(r.u16_be()?),
        })
    }
}

/// 位置运动块（0x40，小端，13 字节）
///
/// 时间戳相对于 "t=0" 启动时刻，设备按时间戳自主执行，无需上位机介入。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionBlock {
    pub timestamp_ms: u32,
    pub actuator_id: u8,
    /// 目标角度（度）
    pub target: f32,
    /// 最大速度（度/秒）
    pub velocity: f32,
    /// 加速度（度/秒²）
    pub acceleration: f32,
    /// 减速度（度/秒²），0 表示与加速度相同
    pub deceleration: f32,
}

impl MotionBlock {
    pub const PAYLOAD_LEN: usize = 13;

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.push(self.actuator_id);
        out.extend_from_slice(&angle_to_raw("target", self.target)?.to_le_bytes());
        out.extend_from_slice(&rate_to_raw("velocity", self.velocity)?.to_le_bytes());
        out.extend_from_slice(&rate_to_raw("acceleration", self.acceleration)?.to_le_bytes());
        out.extend_from_slice(&rate_to_raw("deceleration", self.deceleration)?.to_le_bytes());
        Ok(())
    }

    fn read(payload: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(Self::PAYLOAD_LEN, payload.len())?;
        let mut r = Reader::new(payload);
        Ok(Self {
            timestamp_ms: r.u32_le()?,
            actuator_id: r.u8()?,
            target: angle_from_raw(r.i16_le()?),
            velocity: rate_from_raw(r.u16_le()?),
            acceleration: rate_from_raw(r.u16_le()?),
            deceleration: rate_from_raw(r.u16_le()?),
        })
    }
}

/// 连续旋转速度块（0x50，小端，10 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContinuousBlock {
    pub timestamp_ms: u32,
    pub actuator_id: u8,
    /// 目标速度，-100..=100（负值反转）
    pub speed_percent: i8,
    /// 加速率（%/s）
    pub accel_rate: u8,
    /// 减速率（%/s）
    pub decel_rate: u8,
    /// 持续时间，0 表示持续到下一个块
    pub duration_ms: u16,
}

impl ContinuousBlock {
    pub const PAYLOAD_LEN: usize = 10;

    fn write(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        check_speed(self.speed_percent)?;
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.push(self.actuator_id);
        out.push(self.speed_percent as u8);
        out.push(self.accel_rate);
        out.push(self.decel_rate);
        out.extend_from_slice(&self.duration_ms.to_le_bytes());
        Ok(())
    }

    fn read(payload: &[u8]) -> Result<Self, ProtocolError> {
        ProtocolError::check_len(Self::PAYLOAD_LEN, payload.len())?;
        let mut r = Reader::new(payload);
        Ok(Self {
            timestamp_ms: r.u32_le()?,
            actuator_id: r.u8()?,
            speed_percent: r.i8()?,
            accel_rate: r.u8()?,
            decel_rate: r.u8()?,
            duration_ms: r.u16_le()?,
        })
    }
}

fn check_speed(speed_percent: i8) -> Result<(), ProtocolError> {
    if SPEED_PERCENT_RANGE.contains(&speed_percent) {
        Ok(())
    } else {
        Err(ProtocolError::ValueOutOfRange {
            field: "speed_percent",
            value: speed_percent as f64,
        })
    }
}

/// 上位机 → 设备的命令
///
/// # 示例
///
/// ```rust
/// use rig_protocol::{ActuatorSelect, Command, Opcode};
///
/// let cmd = Command::Enable(ActuatorSelect::One(3));
/// assert_eq!(cmd.opcode(), Opcode::Enable);
/// assert_eq!(cmd.encode_payload().unwrap(), vec![3]);
///
/// let frame = cmd.to_frame(0x00).unwrap();
/// assert_eq!(Command::parse(&frame).unwrap(), cmd);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    // ===== 即时控制 =====
    MoveSingle(SingleMove),
    MoveAll(GroupMove),
    MoveTrapezoid(TrapezoidMove),
    Enable(ActuatorSelect),
    Disable(ActuatorSelect),
    EmergencyStop,
    Ping,

    // ===== 查询 =====
    QueryActuator { actuator_id: u8 },
    QueryAllPositions,

    // ===== 持久化 =====
    SaveConfig,
    LoadConfig,
    /// 上电起始角度（度），按舵机编号排列
    SetStartPositions(Vec<f32>),

    // ===== 缓冲运动规划 =====
    AddMotionBlock(MotionBlock),
    StartMotion,
    StopMotion,
    PauseMotion,
    ResumeMotion,
    ClearBuffer,
    QueryBufferStatus,

    // ===== 连续旋转 =====
    AddContinuousMotion(ContinuousBlock),
    SetContinuousSpeed { actuator_id: u8, speed_percent: i8 },
    SoftStop(ActuatorSelect),
    SetContinuousAccel {
        actuator_id: u8,
        accel_rate: u8,
        decel_rate: u8,
    },
    QueryContinuousInfo { actuator_id: u8 },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::MoveSingle(_) => Opcode::MoveSingle,
            Command::MoveAll(_) => Opcode::MoveAll,
            Command::MoveTrapezoid(_) => Opcode::MoveTrapezoid,
            Command::Enable(_) => Opcode::Enable,
            Command::Disable(_) => Opcode::Disable,
            Command::EmergencyStop => Opcode::EmergencyStop,
            Command::Ping => Opcode::Ping,
            Command::QueryActuator { .. } => Opcode::QueryActuator,
            Command::QueryAllPositions => Opcode::QueryAllPositions,
            Command::SaveConfig => Opcode::SaveConfig,
            Command::LoadConfig => Opcode::LoadConfig,
            Command::SetStartPositions(_) => Opcode::SetStartPositions,
            Command::AddMotionBlock(_) => Opcode::AddMotionBlock,
            Command::StartMotion => Opcode::StartMotion,
            Command::StopMotion => Opcode::StopMotion,
            Command::PauseMotion => Opcode::PauseMotion,
            Command::ResumeMotion => Opcode::ResumeMotion,
            Command::ClearBuffer => Opcode::ClearBuffer,
            Command::QueryBufferStatus => Opcode::QueryBufferStatus,
            Command::AddContinuousMotion(_) => Opcode::AddContinuousMotion,
            Command::SetContinuousSpeed { .. } => Opcode::SetContinuousSpeed,
            Command::SoftStop(_) => Opcode::SoftStop,
            Command::SetContinuousAccel { .. } => Opcode::SetContinuousAccel,
            Command::QueryContinuousInfo { .. } => Opcode::QueryContinuousInfo,
        }
    }

    /// 编码载荷
    ///
    /// 超出定点范围的数值返回 `ValueOutOfRange`，不会截断或回绕。
    pub fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        match self {
            Command::MoveSingle(m) => m.write(&mut out)?,
            Command::MoveAll(m) => m.write(&mut out)?,
            Command::MoveTrapezoid(m) => m.write(&mut out)?,
            Command::Enable(sel) | Command::Disable(sel) | Command::SoftStop(sel) => {
                out.push(sel.to_byte())
            },
            Command::QueryActuator { actuator_id }
            | Command::QueryContinuousInfo { actuator_id } => out.push(*actuator_id),
            Command::SetStartPositions(angles) => {
                for &angle in angles {
                    out.extend_from_slice(&unsigned_angle_to_raw("start_angle", angle)?.to_be_bytes());
                }
            },
            Command::AddMotionBlock(block) => block.write(&mut out)?,
            Command::AddContinuousMotion(block) => block.write(&mut out)?,
            Command::SetContinuousSpeed {
                actuator_id,
                speed_percent,
            } => {
                check_speed(*speed_percent)?;
                out.push(*actuator_id);
                out.push(*speed_percent as u8);
            },
            Command::SetContinuousAccel {
                actuator_id,
                accel_rate,
                decel_rate,
            } => out.extend_from_slice(&[*actuator_id, *accel_rate, *decel_rate]),
            Command::EmergencyStop
            | Command::Ping
            | Command::QueryAllPositions
            | Command::SaveConfig
            | Command::LoadConfig
            | Command::StartMotion
            | Command::StopMotion
            | Command::PauseMotion
            | Command::ResumeMotion
            | Command::ClearBuffer
            | Command::QueryBufferStatus => {},
        }
        Ok(out)
    }

    /// 构造完整帧
    pub fn to_frame(&self, device_id: u8) -> Result<Frame, ProtocolError> {
        Frame::new(device_id, self.opcode(), self.encode_payload()?)
    }

    /// 从请求帧还原命令
    pub fn parse(frame: &Frame) -> Result<Command, ProtocolError> {
        let opcode = frame.opcode().ok_or(ProtocolError::UnknownOpcode {
            opcode: frame.opcode_byte(),
        })?;
        let payload = frame.payload();

        let single_id = || -> Result<u8, ProtocolError> {
            ProtocolError::check_len(1, payload.len())?;
            Ok(payload[0])
        };
        let empty = |cmd: Command| -> Result<Command, ProtocolError> {
            ProtocolError::check_len(0, payload.len())?;
            Ok(cmd)
        };

        match opcode {
            Opcode::MoveSingle => SingleMove::read(payload).map(Command::MoveSingle),
            Opcode::MoveAll => GroupMove::read(payload).map(Command::MoveAll),
            Opcode::MoveTrapezoid => TrapezoidMove::read(payload).map(Command::MoveTrapezoid),
            Opcode::Enable => single_id().map(|id| Command::Enable(id.into())),
            Opcode::Disable => single_id().map(|id| Command::Disable(id.into())),
            Opcode::SoftStop => single_id().map(|id| Command::SoftStop(id.into())),
            Opcode::QueryActuator => {
                single_id().map(|actuator_id| Command::QueryActuator { actuator_id })
            },
            Opcode::QueryContinuousInfo => {
                single_id().map(|actuator_id| Command::QueryContinuousInfo { actuator_id })
            },
            Opcode::SetStartPositions => {
                if payload.len() % 2 != 0 {
                    return Err(ProtocolError::InvalidLength {
                        expected: payload.len() + 1,
                        actual: payload.len(),
                    });
                }
                let mut r = Reader::new(payload);
                let mut angles = Vec::with_capacity(payload.len() / 2);
                while r.remaining() > 0 {
                    angles.push(unsigned_angle_from_raw(r.u16_be()?));
                }
                r.finish()?;
                Ok(Command::SetStartPositions(angles))
            },
            Opcode::AddMotionBlock => MotionBlock::read(payload).map(Command::AddMotionBlock),
            Opcode::AddContinuousMotion => {
                ContinuousBlock::read(payload).map(Command::AddContinuousMotion)
            },
            Opcode::SetContinuousSpeed => {
                ProtocolError::check_len(2, payload.len())?;
                Ok(Command::SetContinuousSpeed {
                    actuator_id: payload[0],
                    speed_percent: payload[1] as i8,
                })
            },
            Opcode::SetContinuousAccel => {
                ProtocolError::check_len(3, payload.len())?;
                Ok(Command::SetContinuousAccel {
                    actuator_id: payload[0],
                    accel_rate: payload[1],
                    decel_rate: payload[2],
                })
            },
            Opcode::EmergencyStop => empty(Command::EmergencyStop),
            Opcode::Ping => empty(Command::Ping),
            Opcode::QueryAllPositions => empty(Command::QueryAllPositions),
            Opcode::SaveConfig => empty(Command::SaveConfig),
            Opcode::LoadConfig => empty(Command::LoadConfig),
            Opcode::StartMotion => empty(Command::StartMotion),
            Opcode::StopMotion => empty(Command::StopMotion),
            Opcode::PauseMotion => empty(Command::PauseMotion),
            Opcode::ResumeMotion => empty(Command::ResumeMotion),
            Opcode::ClearBuffer => empty(Command::ClearBuffer),
            Opcode::QueryBufferStatus => empty(Command::QueryBufferStatus),
        }
    }
}
