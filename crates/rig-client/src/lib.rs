//! # Rig Client
//!
//! 面向应用的上层接口：
//! - [`Commander`]：带类型的即时命令
//! - [`Sequencer`]：时间线上传与执行监视
//! - [`Timeline`]：多轨运动时间线（启用 `serde` 后可从 TOML 加载）
//!
//! 两者都通过 [`Requester`] 访问链路，`rig_driver::Link` 是默认实现。
//!
//! ```rust,no_run
//! use rig_client::{CancelToken, Motion, Sequencer, SequencerConfig, Timeline, Track};
//! use rig_driver::LinkBuilder;
//!
//! let link = LinkBuilder::new().port("/dev/ttyACM0").build().unwrap();
//! let timeline = Timeline::new(vec![
//!     Track::new(1, "base")
//!         .with_event(0, Motion::position(0.0))
//!         .with_event(1500, Motion::position(90.0)),
//! ]);
//!
//! let sequencer = Sequencer::new(&link, SequencerConfig::default());
//! let report = sequencer.execute(&timeline, &CancelToken::new()).unwrap();
//! assert!(report.is_completed());
//! ```

mod commander;
mod error;
pub mod events;
mod requester;
mod sequencer;
mod session;
pub mod timeline;

#[cfg(test)]
mod testing;

pub use commander::Commander;
pub use error::{FailureReason, SequencerError};
pub use events::{SessionEvent, SessionSink, TracingSessionSink};
pub use requester::Requester;
pub use sequencer::{Sequencer, SequencerConfig};
pub use session::{CancelToken, SequencerSession, SequencerState, SessionReport};
pub use timeline::{Motion, MotionEvent, ScheduledBlock, Timeline, Track};
