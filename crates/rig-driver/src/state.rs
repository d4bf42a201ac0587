//! 链路状态
//!
//! `Link` 持有唯一的 [`AtomicLinkState`]，读线程在传输故障时把它置为
//! `Disconnected`，之后的发送立即返回 `NotConnected`。

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// 链路状态
///
/// ```text
/// Disconnected --connect()--> Connecting --> Connected --disconnect()--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LinkState {
    #[default]
    Disconnected = 0,
    /// 拆分传输、启动读线程、等待设备稳定
    Connecting = 1,
    Connected = 2,
}

impl LinkState {
    /// 从 u8 转换，无效值视为 Disconnected
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// 链路状态（原子版本，用于线程间共享）
#[derive(Debug, Default)]
pub struct AtomicLinkState {
    inner: AtomicU8,
}

impl AtomicLinkState {
    pub fn new(state: LinkState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> LinkState {
        LinkState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: LinkState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换，当前值等于 `current` 时设置为 `new` 并返回 true
    pub fn compare_exchange(
        &self,
        current: LinkState,
        new: LinkState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

/// 执行器使能镜像（位图，bit n = 执行器 n）
///
/// 只反映上位机已确认的使能/失能命令，不是设备真实状态。
#[derive(Debug, Default)]
pub struct EnableMask {
    bits: AtomicU64,
}

impl EnableMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, actuator_id: u8, enabled: bool) {
        let Some(bit) = bit_of(actuator_id) else {
            return;
        };
        if enabled {
            self.bits.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.bits.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// 全部执行器（`actuator_count` 个）
    pub fn set_all(&self, enabled: bool, actuator_count: usize) {
        let bits = if enabled {
            if actuator_count >= 64 {
                u64::MAX
            } else {
                (1u64 << actuator_count) - 1
            }
        } else {
            0
        };
        self.bits.store(bits, Ordering::Release);
    }

    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }

    pub fn is_enabled(&self, actuator_id: u8) -> bool {
        bit_of(actuator_id).is_some_and(|bit| self.bits.load(Ordering::Acquire) & bit != 0)
    }

    pub fn bits(&self) -> u64 {
        self.bits.load(Ordering::Acquire)
    }
}

fn bit_of(actuator_id: u8) -> Option<u64> {
    (actuator_id < 64).then(|| 1u64 << actuator_id)
}
