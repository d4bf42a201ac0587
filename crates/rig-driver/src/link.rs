//! 链路会话
//!
//! [`Link`] 拥有串口的两个半边：读半边交给后台线程，写半边由调用方线程
//! 在互斥锁下直接写入。应答通过内部的帧通道交回给 [`Link::request`]。

use crate::channel_sink::ChannelSink;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::event::LinkEvent;
use crate::metrics::{LinkMetrics, MetricsSnapshot};
use crate::monitor::ConnectionMonitor;
use crate::reader::{ReaderContext, reader_loop};
use crate::sink::{EventSink, SinkRegistry, TracingSink};
use crate::state::{AtomicLinkState, EnableMask, LinkState};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rig_protocol::{
    ActuatorSelect, BufferStatus, Command, DEFAULT_ACTUATOR_COUNT, Frame, Opcode, Reply,
};
use rig_serial::{SerialError, SerialWriter, SplittableTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 应答通道容量
const REPLY_CHANNEL_CAPACITY: usize = 64;

/// 线程 join 超时（不会因读线程卡死而让 `disconnect()` 无限阻塞）
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 读线程与调用方共享的状态
pub(crate) struct LinkShared {
    pub state: AtomicLinkState,
    pub metrics: LinkMetrics,
    pub monitor: ConnectionMonitor,
    /// 最近一次缓冲区状态应答
    pub buffer_status: ArcSwapOption<BufferStatus>,
    pub sinks: RwLock<SinkRegistry>,
}

impl LinkShared {
    /// 更新指标和缓存，然后分发给所有 sink
    pub(crate) fn publish(&self, event: LinkEvent) {
        match &event {
            LinkEvent::Frame(frame) => {
                self.metrics.rx_frames.fetch_add(1, Ordering::Relaxed);
                if frame.opcode() == Some(Opcode::QueryBufferStatus)
                    && let Ok(status) = Reply::from_frame(frame).and_then(|r| r.buffer_status())
                {
                    self.buffer_status.store(Some(Arc::new(status)));
                }
            },
            LinkEvent::Text(_) => {
                self.metrics.rx_text_lines.fetch_add(1, Ordering::Relaxed);
            },
            LinkEvent::CorruptFrame { .. } => {
                self.metrics.rx_corrupt_frames.fetch_add(1, Ordering::Relaxed);
            },
            LinkEvent::ReaderExited { .. } => {},
        }

        if let Ok(sinks) = self.sinks.read() {
            sinks.dispatch(&event);
        }
    }

    fn dispatch_sent(&self, frame: &Frame) {
        if let Ok(sinks) = self.sinks.read() {
            sinks.dispatch_sent(frame);
        }
    }
}

/// 一次连接持有的资源
struct Connection {
    writer: Box<dyn SerialWriter + Send>,
    reader_thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    description: String,
}

/// 串口链路会话
///
/// # 示例
///
/// ```rust
/// use rig_driver::{Link, LinkConfig, LinkState};
/// use rig_serial::MockTransport;
///
/// let (transport, _device) = MockTransport::pair();
/// let link = Link::new(LinkConfig::fast());
/// link.connect(transport).unwrap();
/// assert_eq!(link.state(), LinkState::Connected);
///
/// link.disconnect();
/// assert_eq!(link.state(), LinkState::Disconnected);
/// ```
pub struct Link {
    config: LinkConfig,
    shared: Arc<LinkShared>,
    connection: Mutex<Option<Connection>>,
    reply_rx: Receiver<LinkEvent>,
    /// 串行化请求/应答，避免并发请求互相取走应答
    request_lock: Mutex<()>,
    enabled: EnableMask,
}

impl Link {
    /// 使用默认 sink（[`TracingSink`]）
    pub fn new(config: LinkConfig) -> Self {
        Self::with_sinks(config, vec![Arc::new(TracingSink) as Arc<dyn EventSink>])
    }

    pub fn with_sinks(config: LinkConfig, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        let (reply_sink, reply_rx) = ChannelSink::frames_only(REPLY_CHANNEL_CAPACITY);

        let mut registry = SinkRegistry::new();
        registry.add(Arc::new(reply_sink));
        for sink in sinks {
            registry.add(sink);
        }

        let shared = Arc::new(LinkShared {
            state: AtomicLinkState::new(LinkState::Disconnected),
            metrics: LinkMetrics::new(),
            monitor: ConnectionMonitor::new(config.alive_timeout()),
            buffer_status: ArcSwapOption::empty(),
            sinks: RwLock::new(registry),
        });

        Self {
            config,
            shared,
            connection: Mutex::new(None),
            reply_rx,
            request_lock: Mutex::new(()),
            enabled: EnableMask::new(),
        }
    }

    /// 连接传输
    ///
    /// 拆分为读写半边，启动读线程，等待设备稳定后进入 `Connected`。
    pub fn connect<T: SplittableTransport>(&self, transport: T) -> Result<(), LinkError> {
        if !self.shared.state.compare_exchange(
            LinkState::Disconnected,
            LinkState::Connecting,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(LinkError::AlreadyConnected);
        }

        // 读线程因故障退出后留下的旧连接
        self.teardown();

        let description = transport.describe();
        info!("Connecting to {}", description);

        let (reader, writer) = match transport.split() {
            Ok(halves) => halves,
            Err(e) => {
                self.shared.state.set(LinkState::Disconnected, Ordering::Release);
                return Err(e.into());
            },
        };

        let running = Arc::new(AtomicBool::new(true));
        let ctx = ReaderContext {
            shared: self.shared.clone(),
            running: running.clone(),
            chunk_size: self.config.read_chunk_size,
            idle_sleep: self.config.idle_sleep(),
        };
        let reader_thread = match std::thread::Builder::new()
            .name("rig-link-rx".into())
            .spawn(move || reader_loop(reader, ctx))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.state.set(LinkState::Disconnected, Ordering::Release);
                return Err(LinkError::ReaderThread(e.to_string()));
            },
        };

        *lock(&self.connection) = Some(Connection {
            writer: Box::new(writer),
            reader_thread: Some(reader_thread),
            running,
            description: description.clone(),
        });

        self.enabled.clear();
        self.shared.monitor.reset();
        self.shared.buffer_status.store(None);

        // 部分开发板打开串口时复位，期间输出的启动日志照常进入 sink
        spin_sleep::sleep(self.config.settle_delay());
        self.drain_replies();

        if !self.shared.state.compare_exchange(
            LinkState::Connecting,
            LinkState::Connected,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            warn!("Link to {} lost while settling", description);
            self.teardown();
            return Err(LinkError::NotConnected);
        }

        info!("Link connected: {}", description);
        Ok(())
    }

    /// 断开连接（幂等）
    pub fn disconnect(&self) {
        self.shared.state.set(LinkState::Disconnected, Ordering::Release);
        self.teardown();
    }

    fn teardown(&self) {
        let Some(mut connection) = lock(&self.connection).take() else {
            return;
        };

        connection.running.store(false, Ordering::Release);
        let join_timeout = self.config.join_timeout();
        if let Some(handle) = connection.reader_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Reader thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
        drop(connection.writer);
        info!("Link disconnected: {}", connection.description);
    }

    /// 发送命令（不等待应答）
    pub fn send(&self, command: &Command) -> Result<(), LinkError> {
        let frame = command.to_frame(self.config.device_id)?;
        self.send_frame(&frame)
    }

    /// 发送任意操作码和载荷
    pub fn send_raw(&self, opcode: u8, payload: &[u8]) -> Result<(), LinkError> {
        let frame = Frame::new(self.config.device_id, opcode, payload.to_vec())?;
        self.send_frame(&frame)
    }

    pub fn send_frame(&self, frame: &Frame) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }

        let mut guard = lock(&self.connection);
        let connection = guard.as_mut().ok_or(LinkError::NotConnected)?;

        let bytes = frame.to_bytes();
        trace!("tx {}", hex::encode(&bytes));
        match connection.writer.write_all(&bytes) {
            Ok(()) => {
                self.shared.metrics.tx_frames.fetch_add(1, Ordering::Relaxed);
                // 急停不等应答，写出即视为全部失能
                if frame.opcode() == Some(Opcode::EmergencyStop) {
                    self.enabled.clear();
                }
                self.shared.dispatch_sent(frame);
                Ok(())
            },
            Err(SerialError::WriteTimeout) => {
                self.shared.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Write timeout sending {}", frame);
                Err(LinkError::WriteTimeout)
            },
            Err(e) => {
                self.shared.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Write failed sending {}: {}", frame, e);
                Err(LinkError::Serial(e))
            },
        }
    }

    /// 发送命令并等待同一操作码的应答
    ///
    /// 非 OK 应答码返回 `Rejected`；超时返回 `ReplyTimeout`
    /// （链路在等待期间断开时返回 `NotConnected`）。
    pub fn request(&self, command: &Command, timeout: Duration) -> Result<Reply, LinkError> {
        let _guard = lock(&self.request_lock);
        let opcode: u8 = command.opcode().into();

        self.drain_replies();
        self.send(command)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.reply_rx.recv_timeout(remaining) {
                Ok(LinkEvent::Frame(frame)) if frame.opcode_byte() == opcode => {
                    let reply = Reply::from_frame(&frame)?;
                    debug!("reply to {}: {}", command.opcode(), reply.code());
                    if !reply.is_ok() {
                        warn!("{} rejected by device: {}", command.opcode(), reply.code());
                        return Err(LinkError::Rejected {
                            opcode,
                            code: reply.code(),
                        });
                    }
                    self.record_ack(command);
                    return Ok(reply);
                },
                Ok(other) => {
                    debug!("ignoring unsolicited event while waiting: {:?}", other);
                },
                Err(RecvTimeoutError::Timeout) => {
                    if !self.is_connected() {
                        return Err(LinkError::NotConnected);
                    }
                    self.shared.metrics.reply_timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!("No reply to {} within {:?}", command.opcode(), timeout);
                    return Err(LinkError::ReplyTimeout { opcode });
                },
                Err(RecvTimeoutError::Disconnected) => return Err(LinkError::ChannelClosed),
            }
        }
    }

    /// 以配置的默认超时发送请求
    pub fn call(&self, command: &Command) -> Result<Reply, LinkError> {
        self.request(command, self.config.reply_timeout())
    }

    fn drain_replies(&self) {
        let stale = self.reply_rx.try_iter().count();
        if stale > 0 {
            debug!("discarded {} stale reply frames", stale);
        }
    }

    fn record_ack(&self, command: &Command) {
        match command {
            Command::Enable(ActuatorSelect::One(id)) => self.enabled.set(*id, true),
            Command::Enable(ActuatorSelect::All) => {
                self.enabled.set_all(true, DEFAULT_ACTUATOR_COUNT)
            },
            Command::Disable(ActuatorSelect::One(id)) => self.enabled.set(*id, false),
            Command::Disable(ActuatorSelect::All) => self.enabled.clear(),
            _ => {},
        }
    }

    /// 订阅全部链路事件
    ///
    /// 通道有界（`subscriber_capacity`），消费者跟不上时事件被丢弃并计入
    /// `MetricsSnapshot::subscriber_drops`。释放接收端即取消订阅。
    pub fn subscribe(&self) -> Receiver<LinkEvent> {
        let (sink, rx) = ChannelSink::new(self.config.subscriber_capacity);
        let sink = sink.with_dropped_counter(self.shared.metrics.subscriber_drops.clone());
        match self.shared.sinks.write() {
            Ok(mut sinks) => {
                sinks.prune();
                sinks.add(Arc::new(sink));
            },
            Err(poisoned) => poisoned.into_inner().add(Arc::new(sink)),
        }
        rx
    }

    pub fn state(&self) -> LinkState {
        self.shared.state.get(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// 当前连接的描述（端口名、波特率）
    pub fn description(&self) -> Option<String> {
        lock(&self.connection)
            .as_ref()
            .map(|connection| connection.description.clone())
    }

    /// 上位机记录的使能状态（已确认的使能/失能命令）
    pub fn is_enabled(&self, actuator_id: u8) -> bool {
        self.enabled.is_enabled(actuator_id)
    }

    pub fn enabled_mask(&self) -> u64 {
        self.enabled.bits()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn time_since_last_rx(&self) -> Duration {
        self.shared.monitor.time_since_last_rx()
    }

    /// 最近 `alive_timeout` 内收到过设备字节
    pub fn is_alive(&self) -> bool {
        self.is_connected() && self.shared.monitor.is_alive()
    }

    pub fn last_buffer_status(&self) -> Option<BufferStatus> {
        self.shared.buffer_status.load_full().map(|status| *status)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_protocol::{ResponseCode, decode};
    use rig_serial::{MockDevice, MockTransport};

    fn connected() -> (Link, MockDevice) {
        let (transport, device) = MockTransport::pair();
        let link = Link::new(LinkConfig::fast());
        link.connect(transport).unwrap();
        (link, device)
    }

    fn reply_bytes(opcode: Opcode, code: ResponseCode, data: &[u8]) -> Vec<u8> {
        Reply::new(opcode, code, data.to_vec())
            .to_frame(0)
            .unwrap()
            .to_bytes()
    }

    #[test]
    fn test_send_requires_connection() {
        let link = Link::new(LinkConfig::fast());
        assert!(matches!(
            link.send(&Command::Ping),
            Err(LinkError::NotConnected)
        ));
        assert!(matches!(
            link.send_raw(0xFE, &[]),
            Err(LinkError::NotConnected)
        ));
    }

    #[test]
    fn test_send_writes_exact_frame() {
        let (link, device) = connected();
        link.send(&Command::Enable(ActuatorSelect::One(0))).unwrap();
        let bytes = device.recv(Duration::from_millis(200)).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFE, 0x00, 0x20, 0x01, 0x00, 0x31, 0x37]);
        assert_eq!(link.metrics().tx_frames, 1);
    }

    #[test]
    fn test_connect_twice_fails() {
        let (link, _device) = connected();
        let (other, _other_device) = MockTransport::pair();
        assert!(matches!(
            link.connect(other),
            Err(LinkError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_write_timeout_surfaces() {
        let (link, device) = connected();
        device.set_write_timeout(true);
        assert!(matches!(
            link.send(&Command::Ping),
            Err(LinkError::WriteTimeout)
        ));
        assert_eq!(link.metrics().tx_errors, 1);
        // 链路仍然可用
        device.set_write_timeout(false);
        assert!(link.send(&Command::Ping).is_ok());
    }

    #[test]
    fn test_request_matches_opcode() {
        let (link, device) = connected();
        let handle = std::thread::spawn(move || {
            let request = device.recv(Duration::from_secs(1)).unwrap();
            assert_eq!(decode(&request).unwrap().opcode(), Some(Opcode::QueryBufferStatus));
            // 先发一个无关的应答
            device
                .inject(&reply_bytes(Opcode::Ping, ResponseCode::Ok, b"PONG"))
                .unwrap();
            device
                .inject(&reply_bytes(
                    Opcode::QueryBufferStatus,
                    ResponseCode::Ok,
                    &[5, 1, 0, 27],
                ))
                .unwrap();
            device
        });

        let reply = link
            .request(&Command::QueryBufferStatus, Duration::from_secs(1))
            .unwrap();
        let status = reply.buffer_status().unwrap();
        assert_eq!(status.used, 5);
        assert!(status.running);
        let _device = handle.join().unwrap();
        assert_eq!(link.last_buffer_status(), Some(status));
    }

    #[test]
    fn test_request_rejected() {
        let (link, device) = connected();
        // 请求之前到达的应答是陈旧的，会被丢弃
        device
            .inject(&reply_bytes(Opcode::Enable, ResponseCode::Ok, &[]))
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let handle = std::thread::spawn(move || {
            device.recv(Duration::from_secs(1)).unwrap();
            device
                .inject(&reply_bytes(Opcode::Enable, ResponseCode::InvalidParam, &[]))
                .unwrap();
            device
        });
        let err = link
            .request(&Command::Enable(ActuatorSelect::One(40)), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Rejected {
                opcode: 0x20,
                code: ResponseCode::InvalidParam
            }
        ));
        assert!(!link.is_enabled(40));
        let _device = handle.join().unwrap();
    }

    #[test]
    fn test_request_timeout() {
        let (link, _device) = connected();
        let err = link
            .request(&Command::Ping, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, LinkError::ReplyTimeout { opcode: 0xFE }));
        assert_eq!(link.metrics().reply_timeouts, 1);
    }

    #[test]
    fn test_enable_mask_follows_acks() {
        let (link, device) = connected();
        let handle = std::thread::spawn(move || {
            for opcode in [Opcode::Enable, Opcode::Enable, Opcode::EmergencyStop] {
                device.recv(Duration::from_secs(1)).unwrap();
                device
                    .inject(&reply_bytes(opcode, ResponseCode::Ok, &[]))
                    .unwrap();
            }
            device
        });

        link.request(&Command::Enable(ActuatorSelect::One(2)), Duration::from_secs(1))
            .unwrap();
        link.request(&Command::Enable(ActuatorSelect::One(4)), Duration::from_secs(1))
            .unwrap();
        assert_eq!(link.enabled_mask(), 0b10100);

        link.request(&Command::EmergencyStop, Duration::from_secs(1))
            .unwrap();
        assert_eq!(link.enabled_mask(), 0);
        let _device = handle.join().unwrap();
    }

    #[test]
    fn test_emergency_stop_clears_mask_without_reply() {
        let (link, device) = connected();
        let handle = std::thread::spawn(move || {
            device.recv(Duration::from_secs(1)).unwrap();
            device
                .inject(&reply_bytes(Opcode::Enable, ResponseCode::Ok, &[]))
                .unwrap();
            device
        });
        link.request(&Command::Enable(ActuatorSelect::One(3)), Duration::from_secs(1))
            .unwrap();
        assert_eq!(link.enabled_mask(), 0b1000);
        let device = handle.join().unwrap();

        // 设备不应答，写出后立即清空
        link.send(&Command::EmergencyStop).unwrap();
        assert_eq!(link.enabled_mask(), 0);
        assert!(device.recv(Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_reader_failure_disconnects() {
        let (link, device) = connected();
        let events = link.subscribe();
        device.fail_reads();

        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(event, LinkEvent::ReaderExited { .. }));
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(
            link.send(&Command::Ping),
            Err(LinkError::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (link, device) = connected();
        link.disconnect();
        link.disconnect();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.description().is_none());
        assert!(device.host_writer_closed());
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let (link, _device) = connected();
        link.disconnect();
        let (transport, device) = MockTransport::pair();
        link.connect(transport).unwrap();
        link.send(&Command::Ping).unwrap();
        assert!(device.recv(Duration::from_millis(200)).is_some());
    }
}
