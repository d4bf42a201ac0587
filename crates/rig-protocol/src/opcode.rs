//! 操作码与响应码

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 操作码
///
/// 按功能族分组：
/// - 即时控制：单轴/全轴/梯形运动、使能、急停、心跳
/// - 查询：单轴状态、全轴位置
/// - 持久化：保存/加载配置、设置起始位置
/// - 缓冲运动规划：添加运动块、启动/停止/暂停/恢复、清空、状态查询
/// - 连续旋转：添加速度块、设速、软停止、设加减速、信息查询
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    MoveSingle = 0x01,
    MoveAll = 0x03,
    MoveTrapezoid = 0x04,
    QueryActuator = 0x10,
    QueryAllPositions = 0x11,
    Enable = 0x20,
    Disable = 0x21,
    SaveConfig = 0x30,
    LoadConfig = 0x31,
    SetStartPositions = 0x33,
    AddMotionBlock = 0x40,
    StartMotion = 0x41,
    StopMotion = 0x42,
    PauseMotion = 0x43,
    ResumeMotion = 0x44,
    ClearBuffer = 0x45,
    QueryBufferStatus = 0x46,
    AddContinuousMotion = 0x50,
    SetContinuousSpeed = 0x51,
    SoftStop = 0x52,
    SetContinuousAccel = 0x53,
    QueryContinuousInfo = 0x54,
    Ping = 0xFE,
    EmergencyStop = 0xFF,
}

impl Opcode {
    /// 日志用的短名称
    pub fn name(self) -> &'static str {
        match self {
            Opcode::MoveSingle => "move-single",
            Opcode::MoveAll => "move-all",
            Opcode::MoveTrapezoid => "move-trapezoid",
            Opcode::QueryActuator => "query-actuator",
            Opcode::QueryAllPositions => "query-all-positions",
            Opcode::Enable => "enable",
            Opcode::Disable => "disable",
            Opcode::SaveConfig => "save-config",
            Opcode::LoadConfig => "load-config",
            Opcode::SetStartPositions => "set-start-positions",
            Opcode::AddMotionBlock => "add-motion-block",
            Opcode::StartMotion => "start-motion",
            Opcode::StopMotion => "stop-motion",
            Opcode::PauseMotion => "pause-motion",
            Opcode::ResumeMotion => "resume-motion",
            Opcode::ClearBuffer => "clear-buffer",
            Opcode::QueryBufferStatus => "query-buffer-status",
            Opcode::AddContinuousMotion => "add-continuous-motion",
            Opcode::SetContinuousSpeed => "set-continuous-speed",
            Opcode::SoftStop => "soft-stop",
            Opcode::SetContinuousAccel => "set-continuous-accel",
            Opcode::QueryContinuousInfo => "query-continuous-info",
            Opcode::Ping => "ping",
            Opcode::EmergencyStop => "emergency-stop",
        }
    }

    /// 是否属于缓冲运动规划族（载荷使用小端）
    pub fn is_buffered(self) -> bool {
        matches!(
            self,
            Opcode::AddMotionBlock
                | Opcode::StartMotion
                | Opcode::StopMotion
                | Opcode::PauseMotion
                | Opcode::ResumeMotion
                | Opcode::ClearBuffer
                | Opcode::QueryBufferStatus
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), u8::from(*self))
    }
}

/// 应答码（应答载荷的第一个字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0x00,
    Error = 0x01,
    InvalidOpcode = 0x02,
    InvalidParam = 0x03,
    CrcError = 0x04,
    Timeout = 0x05,
    Busy = 0x06,
}

impl ResponseCode {
    pub fn is_ok(self) -> bool {
        self == ResponseCode::Ok
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResponseCode::Ok => "OK",
            ResponseCode::Error => "ERROR",
            ResponseCode::InvalidOpcode => "INVALID_OPCODE",
            ResponseCode::InvalidParam => "INVALID_PARAM",
            ResponseCode::CrcError => "CRC_ERROR",
            ResponseCode::Timeout => "TIMEOUT",
            ResponseCode::Busy => "BUSY",
        };
        f.write_str(name)
    }
}
