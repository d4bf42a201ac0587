//! 时间线模型
//!
//! 每条轨道对应一个舵机，轨道上的运动事件带有相对 t=0 的时间戳。
//! 执行前展开为按时间排序的 [`ScheduledBlock`] 列表，由设备自主调度。
//!
//! 启用 `serde` feature 后可以从 TOML 加载：
//!
//! ```toml
//! [[tracks]]
//! actuator_id = 1
//! name = "base"
//!
//! [[tracks.events]]
//! at_ms = 0
//! kind = "position"
//! target = 90.0
//! velocity = 45.0
//!
//! [[tracks.events]]
//! at_ms = 2000
//! kind = "continuous"
//! speed_percent = -50
//! accel_rate = 20
//! decel_rate = 20
//! ```

use rig_protocol::{Command, ContinuousBlock, MotionBlock};

/// 梯形运动默认最大速度（度/秒）
pub const DEFAULT_VELOCITY: f32 = 30.0;
/// 梯形运动默认加速度（度/秒²）
pub const DEFAULT_ACCELERATION: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timeline {
    #[cfg_attr(feature = "serde", serde(default))]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    pub actuator_id: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    /// 隐藏的轨道不参与执行
    #[cfg_attr(feature = "serde", serde(default = "default_visible"))]
    pub visible: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub events: Vec<MotionEvent>,
}

#[cfg(feature = "serde")]
fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionEvent {
    /// 相对时间线起点的时间（毫秒）
    pub at_ms: u32,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub motion: Motion,
}

/// 运动方式
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Motion {
    /// 梯形速度曲线运动到目标角度
    Position {
        target: f32,
        #[cfg_attr(feature = "serde", serde(default = "default_velocity"))]
        velocity: f32,
        #[cfg_attr(feature = "serde", serde(default = "default_acceleration"))]
        acceleration: f32,
        /// 0 表示与加速度相同
        #[cfg_attr(feature = "serde", serde(default))]
        deceleration: f32,
    },
    /// 连续旋转（360° 舵机）
    Continuous {
        speed_percent: i8,
        #[cfg_attr(feature = "serde", serde(default))]
        accel_rate: u8,
        #[cfg_attr(feature = "serde", serde(default))]
        decel_rate: u8,
        /// 0 表示持续到下一个块
        #[cfg_attr(feature = "serde", serde(default))]
        duration_ms: u16,
    },
}

#[cfg(feature = "serde")]
fn default_velocity() -> f32 {
    DEFAULT_VELOCITY
}

#[cfg(feature = "serde")]
fn default_acceleration() -> f32 {
    DEFAULT_ACCELERATION
}

impl Motion {
    /// 使用默认速度参数的位置运动
    pub fn position(target: f32) -> Self {
        Motion::Position {
            target,
            velocity: DEFAULT_VELOCITY,
            acceleration: DEFAULT_ACCELERATION,
            deceleration: 0.0,
        }
    }
}

impl MotionEvent {
    pub fn new(at_ms: u32, motion: Motion) -> Self {
        Self { at_ms, motion }
    }
}

impl Track {
    pub fn new(actuator_id: u8, name: impl Into<String>) -> Self {
        Self {
            actuator_id,
            name: name.into(),
            visible: true,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, at_ms: u32, motion: Motion) -> Self {
        self.events.push(MotionEvent::new(at_ms, motion));
        self
    }
}

/// 一个待上传的缓冲运动块
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduledBlock {
    Position(MotionBlock),
    Continuous(ContinuousBlock),
}

impl ScheduledBlock {
    pub fn from_event(actuator_id: u8, event: &MotionEvent) -> Self {
        match event.motion {
            Motion::Position {
                target,
                velocity,
                acceleration,
                deceleration,
            } => ScheduledBlock::Position(MotionBlock {
                timestamp_ms: event.at_ms,
                actuator_id,
                target,
                velocity,
                acceleration,
                deceleration,
            }),
            Motion::Continuous {
                speed_percent,
                accel_rate,
                decel_rate,
                duration_ms,
            } => ScheduledBlock::Continuous(ContinuousBlock {
                timestamp_ms: event.at_ms,
                actuator_id,
                speed_percent,
                accel_rate,
                decel_rate,
                duration_ms,
            }),
        }
    }

    pub fn timestamp_ms(&self) -> u32 {
        match self {
            ScheduledBlock::Position(block) => block.timestamp_ms,
            ScheduledBlock::Continuous(block) => block.timestamp_ms,
        }
    }

    pub fn actuator_id(&self) -> u8 {
        match self {
            ScheduledBlock::Position(block) => block.actuator_id,
            ScheduledBlock::Continuous(block) => block.actuator_id,
        }
    }

    /// 上传用的命令（add-motion-block 或 add-continuous-motion）
    pub fn to_command(&self) -> Command {
        match self {
            ScheduledBlock::Position(block) => Command::AddMotionBlock(*block),
            ScheduledBlock::Continuous(block) => Command::AddContinuousMotion(*block),
        }
    }
}

impl Timeline {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// 展开为按 (时间戳, 舵机编号) 稳定排序的运动块
    ///
    /// 隐藏轨道被跳过。同一舵机同一时刻的多个事件保持轨道内的原有顺序。
    pub fn flatten(&self) -> Vec<ScheduledBlock> {
        let mut blocks: Vec<ScheduledBlock> = self
            .tracks
            .iter()
            .filter(|track| track.visible)
            .flat_map(|track| {
                track
                    .events
                    .iter()
                    .map(|event| ScheduledBlock::from_event(track.actuator_id, event))
            })
            .collect();
        blocks.sort_by_key(|block| (block.timestamp_ms(), block.actuator_id()));
        blocks
    }

    /// 所有可见轨道上的事件总数
    pub fn event_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|track| track.visible)
            .map(|track| track.events.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_orders_by_timestamp() {
        let timeline = Timeline::new(vec![
            Track::new(1, "a").with_event(2000, Motion::position(10.0)),
            Track::new(2, "b").with_event(0, Motion::position(20.0)),
            Track::new(3, "c").with_event(1000, Motion::position(30.0)),
        ]);
        let order: Vec<u32> = timeline.flatten().iter().map(|b| b.timestamp_ms()).collect();
        assert_eq!(order, vec![0, 1000, 2000]);
    }

    #[test]
    fn test_ties_broken_by_actuator_id() {
        let timeline = Timeline::new(vec![
            Track::new(5, "e").with_event(500, Motion::position(1.0)),
            Track::new(2, "b").with_event(500, Motion::position(2.0)),
            Track::new(9, "i").with_event(0, Motion::position(3.0)),
        ]);
        let order: Vec<(u32, u8)> = timeline
            .flatten()
            .iter()
            .map(|b| (b.timestamp_ms(), b.actuator_id()))
            .collect();
        assert_eq!(order, vec![(0, 9), (500, 2), (500, 5)]);
    }

    #[test]
    fn test_sort_is_stable_within_track() {
        let timeline = Timeline::new(vec![
            Track::new(1, "a")
                .with_event(100, Motion::position(10.0))
                .with_event(100, Motion::position(20.0)),
        ]);
        let targets: Vec<f32> = timeline
            .flatten()
            .iter()
            .map(|b| match b {
                ScheduledBlock::Position(block) => block.target,
                ScheduledBlock::Continuous(_) => unreachable!(),
            })
            .collect();
        assert_eq!(targets, vec![10.0, 20.0]);
    }

    #[test]
    fn test_hidden_tracks_skipped() {
        let mut hidden = Track::new(4, "hidden").with_event(0, Motion::position(0.0));
        hidden.visible = false;
        let timeline = Timeline::new(vec![
            hidden,
            Track::new(1, "shown").with_event(0, Motion::position(0.0)),
        ]);
        let blocks = timeline.flatten();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].actuator_id(), 1);
        assert_eq!(timeline.event_count(), 1);
    }

    #[test]
    fn test_block_commands() {
        let position = ScheduledBlock::from_event(3, &MotionEvent::new(250, Motion::position(45.0)));
        match position.to_command() {
            Command::AddMotionBlock(block) => {
                assert_eq!(block.actuator_id, 3);
                assert_eq!(block.timestamp_ms, 250);
                assert_eq!(block.velocity, DEFAULT_VELOCITY);
                assert_eq!(block.acceleration, DEFAULT_ACCELERATION);
                assert_eq!(block.deceleration, 0.0);
            },
            other => panic!("unexpected command {:?}", other),
        }

        let continuous = ScheduledBlock::from_event(
            7,
            &MotionEvent::new(
                0,
                Motion::Continuous {
                    speed_percent: -40,
                    accel_rate: 10,
                    decel_rate: 5,
                    duration_ms: 0,
                },
            ),
        );
        assert!(matches!(
            continuous.to_command(),
            Command::AddContinuousMotion(ContinuousBlock {
                actuator_id: 7,
                speed_percent: -40,
                ..
            })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_load_from_toml() {
        let text = r#"
            [[tracks]]
            actuator_id = 1
            name = "base"

            [[tracks.events]]
            at_ms = 1000
            kind = "position"
            target = 90.0

            [[tracks.events]]
            at_ms = 0
            kind = "continuous"
            speed_percent = 50

            [[tracks]]
            actuator_id = 2
            visible = false
        "#;
        let timeline: Timeline = toml::from_str(text).unwrap();
        assert_eq!(timeline.tracks.len(), 2);
        assert!(timeline.tracks[0].visible);
        assert!(!timeline.tracks[1].visible);

        let blocks = timeline.flatten();
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], ScheduledBlock::Continuous(_)));
        match blocks[1] {
            ScheduledBlock::Position(block) => {
                assert_eq!(block.target, 90.0);
                assert_eq!(block.velocity, DEFAULT_VELOCITY);
                assert_eq!(block.acceleration, DEFAULT_ACCELERATION);
            },
            ScheduledBlock::Continuous(_) => panic!("expected position block"),
        }
    }
}
