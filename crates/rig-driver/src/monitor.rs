//! Connection Monitor - tracks the time since the device last sent anything
//!
//! Uses monotonic time anchored to the first access, so the value is safe to keep in
//! an `AtomicU64` and is unaffected by wall-clock adjustments.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Link health monitor
///
/// The reader thread calls [`register_rx`](Self::register_rx) for every chunk of bytes.
/// The device only talks when spoken to, so "alive" means "answered recently".
#[derive(Debug)]
pub struct ConnectionMonitor {
    last_rx: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// # Example
    /// ```
    /// # use rig_driver::ConnectionMonitor;
    /// # use std::time::Duration;
    /// let monitor = ConnectionMonitor::new(Duration::from_secs(2));
    /// assert!(monitor.is_alive());
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_rx: AtomicU64::new(monotonic_micros()),
            timeout,
        }
    }

    /// Bytes arrived within the timeout window
    pub fn is_alive(&self) -> bool {
        self.time_since_last_rx() < self.timeout
    }

    pub fn register_rx(&self) {
        self.last_rx.store(monotonic_micros(), Ordering::Relaxed);
    }

    /// Restart the window (on connect)
    pub fn reset(&self) {
        self.register_rx();
    }

    pub fn time_since_last_rx(&self) -> Duration {
        let last_us = self.last_rx.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_time_increases() {
        let t1 = monotonic_micros();
        thread::sleep(Duration::from_millis(5));
        assert!(monotonic_micros() > t1);
    }

    #[test]
    fn test_initially_alive() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(monitor.is_alive());
        assert_eq!(monitor.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_times_out_without_rx() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(30));
        thread::sleep(Duration::from_millis(60));
        assert!(!monitor.is_alive());
        assert!(monitor.time_since_last_rx() >= Duration::from_millis(30));
    }

    #[test]
    fn test_rx_resets_timer() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(80));
        thread::sleep(Duration::from_millis(50));
        monitor.register_rx();
        thread::sleep(Duration::from_millis(50));
        assert!(monitor.is_alive());
    }
}
