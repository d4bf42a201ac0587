//! 链路配置
//!
//! 纯数据（可序列化），运行时组件（sink 等）不放在这里。

use std::time::Duration;

/// 链路配置
///
/// 所有时间字段单位为毫秒。启用 `serde` feature 后可从 TOML 加载，缺省字段取默认值。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// 打开端口后等待设备稳定的时间（部分开发板打开串口时会复位）
    pub settle_delay_ms: u64,
    pub write_timeout_ms: u64,
    /// 读句柄超时，也决定读线程检查退出标志的频率
    pub read_timeout_ms: u64,
    /// 读超时后的空闲休眠
    pub idle_sleep_ms: u64,
    /// `request` 等待应答的默认时间
    pub reply_timeout_ms: u64,
    /// 断开时等待读线程退出的时间
    pub join_timeout_ms: u64,
    /// 多久没有收到字节视为设备无响应
    pub alive_timeout_ms: u64,
    pub read_chunk_size: usize,
    /// `subscribe()` 通道容量
    pub subscriber_capacity: usize,
    pub device_id: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            write_timeout_ms: 1000,
            read_timeout_ms: 50,
            idle_sleep_ms: 10,
            reply_timeout_ms: 1000,
            join_timeout_ms: 1000,
            alive_timeout_ms: 2000,
            read_chunk_size: 256,
            subscriber_capacity: 1024,
            device_id: 0,
        }
    }
}

impl LinkConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn alive_timeout(&self) -> Duration {
        Duration::from_millis(self.alive_timeout_ms)
    }

    /// 测试用：去掉稳定等待，缩短空闲休眠
    pub fn fast() -> Self {
        Self {
            settle_delay_ms: 0,
            idle_sleep_ms: 1,
            reply_timeout_ms: 200,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.write_timeout(), Duration::from_secs(1));
        assert_eq!(config.read_timeout(), Duration::from_millis(50));
        assert_eq!(config.idle_sleep(), Duration::from_millis(10));
        assert_eq!(config.reply_timeout(), Duration::from_secs(1));
        assert_eq!(config.join_timeout(), Duration::from_secs(1));
        assert_eq!(config.read_chunk_size, 256);
        assert_eq!(config.subscriber_capacity, 1024);
        assert_eq!(config.device_id, 0);
    }

    #[test]
    fn test_fast_profile() {
        let config = LinkConfig::fast();
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.write_timeout_ms, 1000);
    }
}
