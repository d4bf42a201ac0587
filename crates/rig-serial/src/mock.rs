//! 内存串口（测试用）
//!
//! [`MockTransport`] 是上位机一端，[`MockDevice`] 是设备一端。
//! 两端通过 crossbeam 通道传递字节块，可注入写超时、读故障和断线。
//!
//! ```rust
//! use rig_serial::{MockTransport, SerialReader, SerialWriter, SplittableTransport};
//! use std::time::Duration;
//!
//! let (transport, device) = MockTransport::pair();
//! let (mut rx, mut tx) = transport.split().unwrap();
//!
//! tx.write_all(b"hello").unwrap();
//! assert_eq!(device.recv(Duration::from_millis(100)).unwrap(), b"hello");
//!
//! device.inject(b"world").unwrap();
//! let mut buf = [0u8; 16];
//! let n = rx.read_chunk(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"world");
//! ```

use crate::{SerialError, SerialReader, SerialWriter, SplittableTransport};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct Faults {
    write_timeout: AtomicBool,
    read_error: AtomicBool,
}

/// 上位机一端
pub struct MockTransport {
    to_device: Sender<Vec<u8>>,
    from_device: Receiver<Vec<u8>>,
    faults: Arc<Faults>,
    read_timeout: Duration,
}

impl MockTransport {
    /// 创建一对相连的端点
    pub fn pair() -> (MockTransport, MockDevice) {
        let (host_tx, device_rx) = unbounded();
        let (device_tx, host_rx) = unbounded();
        let faults = Arc::new(Faults::default());
        (
            MockTransport {
                to_device: host_tx,
                from_device: host_rx,
                faults: faults.clone(),
                read_timeout: Duration::from_millis(5),
            },
            MockDevice {
                to_host: Some(device_tx),
                from_host: device_rx,
                faults,
            },
        )
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl SplittableTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn describe(&self) -> String {
        "mock".to_string()
    }

    fn split(self) -> Result<(MockReader, MockWriter), SerialError> {
        Ok((
            MockReader {
                rx: self.from_device,
                pending: Vec::new(),
                faults: self.faults.clone(),
                read_timeout: self.read_timeout,
            },
            MockWriter {
                tx: self.to_device,
                faults: self.faults,
            },
        ))
    }
}

/// 读半边
pub struct MockReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    faults: Arc<Faults>,
    read_timeout: Duration,
}

impl SerialReader for MockReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if self.faults.read_error.load(Ordering::Acquire) {
            return Err(SerialError::Io(io::Error::other("injected read failure")));
        }

        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending = chunk,
                Err(RecvTimeoutError::Timeout) => return Err(SerialError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(SerialError::Closed),
            }
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// 写半边
pub struct MockWriter {
    tx: Sender<Vec<u8>>,
    faults: Arc<Faults>,
}

impl SerialWriter for MockWriter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if self.faults.write_timeout.load(Ordering::Acquire) {
            return Err(SerialError::WriteTimeout);
        }
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| SerialError::Closed)
    }
}

/// 设备一端
pub struct MockDevice {
    to_host: Option<Sender<Vec<u8>>>,
    from_host: Receiver<Vec<u8>>,
    faults: Arc<Faults>,
}

impl MockDevice {
    /// 向上位机注入字节
    pub fn inject(&self, bytes: &[u8]) -> Result<(), SerialError> {
        let tx = self.to_host.as_ref().ok_or(SerialError::Closed)?;
        tx.send(bytes.to_vec()).map_err(|_| SerialError::Closed)
    }

    /// 等待上位机写入的下一块字节
    pub fn recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.from_host.recv_timeout(timeout).ok()
    }

    /// 取出当前已写入的全部字节
    pub fn drain(&self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match self.from_host.try_recv() {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// 上位机写端是否已释放（仍有未取出的字节时返回 false）
    pub fn host_writer_closed(&self) -> bool {
        self.from_host.is_empty()
            && matches!(self.from_host.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// 让后续写操作返回 `WriteTimeout`
    pub fn set_write_timeout(&self, enabled: bool) {
        self.faults.write_timeout.store(enabled, Ordering::Release);
    }

    /// 让后续读操作返回 IO 错误
    pub fn fail_reads(&self) {
        self.faults.read_error.store(true, Ordering::Release);
    }

    /// 模拟拔线：关闭设备 → 上位机方向
    pub fn unplug(&mut self) {
        self.to_host = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let (transport, device) = MockTransport::pair();
        let (mut rx, mut tx) = transport.split().unwrap();

        tx.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(device.recv(Duration::from_millis(100)), Some(vec![1, 2, 3]));

        device.inject(&[4, 5, 6, 7]).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(rx.read_chunk(&mut buf).unwrap(), 3);
        assert_eq!(buf, [4, 5, 6]);
        // 剩余字节在下一次读取时返回
        assert_eq!(rx.read_chunk(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_idle_read_times_out() {
        let (transport, _device) = MockTransport::pair();
        let (mut rx, _tx) = transport.split().unwrap();
        let mut buf = [0u8; 8];
        assert!(rx.read_chunk(&mut buf).unwrap_err().is_timeout());
    }

    #[test]
    fn test_injected_faults() {
        let (transport, device) = MockTransport::pair();
        let (mut rx, mut tx) = transport.split().unwrap();

        device.set_write_timeout(true);
        assert!(matches!(tx.write_all(&[0]), Err(SerialError::WriteTimeout)));
        device.set_write_timeout(false);
        assert!(tx.write_all(&[0]).is_ok());

        device.fail_reads();
        let mut buf = [0u8; 8];
        assert!(matches!(rx.read_chunk(&mut buf), Err(SerialError::Io(_))));
    }

    #[test]
    fn test_unplug_closes_reader() {
        let (transport, mut device) = MockTransport::pair();
        let (mut rx, _tx) = transport.split().unwrap();
        device.unplug();
        let mut buf = [0u8; 8];
        assert!(matches!(rx.read_chunk(&mut buf), Err(SerialError::Closed)));
        assert!(device.inject(&[1]).is_err());
    }

    #[test]
    fn test_drain_and_writer_closed() {
        let (transport, device) = MockTransport::pair();
        let (_rx, mut tx) = transport.split().unwrap();
        tx.write_all(&[1, 2]).unwrap();
        tx.write_all(&[3]).unwrap();
        assert_eq!(device.drain(), vec![1, 2, 3]);
        assert!(!device.host_writer_closed());
        drop(tx);
        assert!(device.host_writer_closed());
    }
}
