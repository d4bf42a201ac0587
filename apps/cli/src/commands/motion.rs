//! 即时运动命令

use crate::connection::LinkArgs;
use anyhow::{Context, Result};
use clap::Args;
use rig_client::Commander;
use rig_protocol::{TrapezoidMove, angle_to_raw};

/// 定时运动参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 舵机编号
    #[arg(short, long, requires = "angle", conflicts_with = "angles")]
    pub id: Option<u8>,

    /// 目标角度（度）
    #[arg(short, long, allow_hyphen_values = true)]
    pub angle: Option<f32>,

    /// 全部舵机的目标角度，逗号分隔
    #[arg(long, allow_hyphen_values = true)]
    pub angles: Option<String>,

    /// 运动时长（毫秒）
    #[arg(short, long, default_value_t = 1000)]
    pub duration: u16,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl MoveCommand {
    pub fn execute(&self) -> Result<()> {
        let target = self.target()?;
        let (link, _) = self.link.open()?;
        let commander = Commander::new(&link);

        match target {
            Target::Single(id, angle) => {
                println!("⏳ 舵机 {} -> {:.2}° ({} ms)", id, angle, self.duration);
                commander.move_single(id, angle, self.duration)?;
            },
            Target::All(angles) => {
                println!("⏳ {} 个舵机同步运动 ({} ms)", angles.len(), self.duration);
                commander.move_all(angles, self.duration)?;
            },
        }
        println!("✅ 命令已确认");
        Ok(())
    }

    fn target(&self) -> Result<Target> {
        match (self.id, self.angle, &self.angles) {
            (Some(id), Some(angle), None) => {
                check_angle(angle)?;
                Ok(Target::Single(id, angle))
            },
            (None, None, Some(list)) => Ok(Target::All(parse_angles(list)?)),
            _ => anyhow::bail!("请指定 --id 和 --angle，或 --angles"),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Target {
    Single(u8, f32),
    All(Vec<f32>),
}

/// 梯形运动参数
#[derive(Args, Debug)]
pub struct TrapezoidCommand {
    #[arg(short, long)]
    pub id: u8,

    #[arg(short, long, allow_hyphen_values = true)]
    pub angle: f32,

    /// 最大速度（度/秒）
    #[arg(long, default_value_t = rig_client::timeline::DEFAULT_VELOCITY)]
    pub velocity: f32,

    /// 加速度（度/秒²）
    #[arg(long, default_value_t = rig_client::timeline::DEFAULT_ACCELERATION)]
    pub accel: f32,

    /// 减速度（度/秒²），0 表示与加速度相同
    #[arg(long, default_value_t = 0.0)]
    pub decel: f32,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl TrapezoidCommand {
    pub fn execute(&self) -> Result<()> {
        check_angle(self.angle)?;
        let (link, _) = self.link.open()?;
        let commander = Commander::new(&link);

        println!(
            "⏳ 舵机 {} -> {:.2}° (v={} a={} d={})",
            self.id, self.angle, self.velocity, self.accel, self.decel
        );
        commander.move_trapezoid(TrapezoidMove {
            actuator_id: self.id,
            angle: self.angle,
            velocity: self.velocity,
            acceleration: self.accel,
            deceleration: self.decel,
        })?;
        println!("✅ 命令已确认");
        Ok(())
    }
}

/// 在连接前检查角度能否编码
fn check_angle(angle: f32) -> Result<()> {
    angle_to_raw("angle", angle).with_context(|| format!("角度 {} 超出范围", angle))?;
    Ok(())
}

/// 解析逗号分隔的角度列表
fn parse_angles(list: &str) -> Result<Vec<f32>> {
    let angles: Vec<f32> = list
        .split(',')
        .map(|s| s.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .context("解析角度列表失败")?;

    if angles.is_empty() {
        anyhow::bail!("角度列表不能为空");
    }
    for &angle in &angles {
        check_angle(angle)?;
    }
    Ok(angles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn move_command(id: Option<u8>, angle: Option<f32>, angles: Option<&str>) -> MoveCommand {
        MoveCommand {
            id,
            angle,
            angles: angles.map(str::to_string),
            duration: 500,
            link: LinkArgs::default(),
        }
    }

    #[test]
    fn test_parse_angles() {
        assert_eq!(parse_angles("0, 90.5,-45").unwrap(), vec![0.0, 90.5, -45.0]);
        assert!(parse_angles("1,abc").is_err());
        assert!(parse_angles("").is_err());
        assert!(parse_angles("10,400").is_err());
    }

    #[test]
    fn test_target_selection() {
        assert_eq!(
            move_command(Some(2), Some(30.0), None).target().unwrap(),
            Target::Single(2, 30.0)
        );
        assert_eq!(
            move_command(None, None, Some("1,2")).target().unwrap(),
            Target::All(vec![1.0, 2.0])
        );
        assert!(move_command(None, None, None).target().is_err());
        assert!(move_command(Some(2), None, None).target().is_err());
    }

    #[test]
    fn test_check_angle() {
        assert!(check_angle(0.0).is_ok());
        assert!(check_angle(f32::NAN).is_err());
        assert!(check_angle(1000.0).is_err());
    }
}
