//! 即时命令门面
//!
//! 把每条即时命令包装成带类型的方法，应答解析为对应的视图。

use crate::requester::Requester;
use rig_driver::LinkError;
use rig_protocol::{
    ActuatorReading, ActuatorSelect, BufferStatus, Command, ContinuousInfo, GroupMove, PingReply,
    PositionReport, SingleMove, TrapezoidMove,
};
use tracing::info;

/// 即时命令门面
///
/// ```rust,no_run
/// use rig_client::Commander;
/// use rig_driver::LinkBuilder;
///
/// let link = LinkBuilder::new().port("/dev/ttyACM0").build().unwrap();
/// let commander = Commander::new(&link);
/// commander.ping().unwrap();
/// commander.enable(3.into()).unwrap();
/// commander.move_single(3, 90.0, 1000).unwrap();
/// ```
pub struct Commander<R> {
    requester: R,
}

impl<R: Requester> Commander<R> {
    pub fn new(requester: R) -> Self {
        Self { requester }
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    fn ack(&self, command: Command) -> Result<(), LinkError> {
        self.requester.request(&command).map(|_| ())
    }

    // ==================== 基础控制 ====================

    pub fn ping(&self) -> Result<PingReply, LinkError> {
        let reply = self.requester.request(&Command::Ping)?;
        Ok(reply.ping_reply()?)
    }

    /// 单轴定时运动（`duration_ms` 内到达目标角度）
    pub fn move_single(&self, actuator_id: u8, angle: f32, duration_ms: u16) -> Result<(), LinkError> {
        self.ack(Command::MoveSingle(SingleMove {
            actuator_id,
            angle,
            duration_ms,
        }))
    }

    /// 全部舵机同步运动
    pub fn move_all(&self, angles: Vec<f32>, duration_ms: u16) -> Result<(), LinkError> {
        self.ack(Command::MoveAll(GroupMove {
            angles,
            duration_ms,
        }))
    }

    pub fn move_trapezoid(&self, movement: TrapezoidMove) -> Result<(), LinkError> {
        self.ack(Command::MoveTrapezoid(movement))
    }

    pub fn enable(&self, select: ActuatorSelect) -> Result<(), LinkError> {
        self.ack(Command::Enable(select))
    }

    pub fn disable(&self, select: ActuatorSelect) -> Result<(), LinkError> {
        self.ack(Command::Disable(select))
    }

    /// 急停：立即失能全部舵机
    ///
    /// 不等待应答，设备忙或链路拥塞时也会尽快送出。
    pub fn emergency_stop(&self) -> Result<(), LinkError> {
        info!("Sending emergency stop");
        self.requester.send(&Command::EmergencyStop)
    }

    // ==================== 持久化 ====================

    pub fn save_config(&self) -> Result<(), LinkError> {
        self.ack(Command::SaveConfig)
    }

    pub fn load_config(&self) -> Result<(), LinkError> {
        self.ack(Command::LoadConfig)
    }

    pub fn set_start_positions(&self, angles: Vec<f32>) -> Result<(), LinkError> {
        self.ack(Command::SetStartPositions(angles))
    }

    // ==================== 查询 ====================

    pub fn query_actuator(&self, actuator_id: u8) -> Result<ActuatorReading, LinkError> {
        let reply = self.requester.request(&Command::QueryActuator { actuator_id })?;
        Ok(reply.actuator_reading()?)
    }

    pub fn query_all_positions(&self) -> Result<PositionReport, LinkError> {
        let reply = self.requester.request(&Command::QueryAllPositions)?;
        Ok(reply.position_report()?)
    }

    // ==================== 缓冲运动 ====================

    pub fn start(&self) -> Result<(), LinkError> {
        self.ack(Command::StartMotion)
    }

    pub fn stop(&self) -> Result<(), LinkError> {
        self.ack(Command::StopMotion)
    }

    pub fn pause(&self) -> Result<(), LinkError> {
        self.ack(Command::PauseMotion)
    }

    pub fn resume(&self) -> Result<(), LinkError> {
        self.ack(Command::ResumeMotion)
    }

    pub fn clear_buffer(&self) -> Result<(), LinkError> {
        self.ack(Command::ClearBuffer)
    }

    pub fn buffer_status(&self) -> Result<BufferStatus, LinkError> {
        let reply = self.requester.request(&Command::QueryBufferStatus)?;
        Ok(reply.buffer_status()?)
    }

    // ==================== 连续旋转 ====================

    pub fn set_continuous_speed(&self, actuator_id: u8, speed_percent: i8) -> Result<(), LinkError> {
        self.ack(Command::SetContinuousSpeed {
            actuator_id,
            speed_percent,
        })
    }

    pub fn set_continuous_accel(
        &self,
        actuator_id: u8,
        accel_rate: u8,
        decel_rate: u8,
    ) -> Result<(), LinkError> {
        self.ack(Command::SetContinuousAccel {
            actuator_id,
            accel_rate,
            decel_rate,
        })
    }

    /// 按减速率平滑停止
    pub fn soft_stop(&self, select: ActuatorSelect) -> Result<(), LinkError> {
        self.ack(Command::SoftStop(select))
    }

    pub fn continuous_info(&self, actuator_id: u8) -> Result<ContinuousInfo, LinkError> {
        let reply = self
            .requester
            .request(&Command::QueryContinuousInfo { actuator_id })?;
        Ok(reply.continuous_info()?)
    }
}
