//! # Rig Serial Transport Layer
//!
//! 串口传输抽象层。上层只依赖读/写两个半边的 trait，
//! 读线程和写调用可以在同一个端口上并发工作，互不加锁。
//!
//! - `port`: 基于 `serialport` 的真实串口后端（feature `hardware`）
//! - `mock`: 内存管道，用于无硬件测试（feature `mock`）

use std::io;
use thiserror::Error;

#[cfg(feature = "hardware")]
pub mod port;

#[cfg(feature = "hardware")]
pub use port::{
    DEFAULT_BAUD_RATE, PortInfo, PortSettings, SerialPortReader, SerialPortTransport,
    SerialPortWriter, list_ports,
};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockDevice, MockReader, MockTransport, MockWriter};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Port Error: {0}")]
    Port(String),

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Transport closed")]
    Closed,
}

impl SerialError {
    /// 读超时（空闲链路上的正常现象）
    pub fn is_timeout(&self) -> bool {
        matches!(self, SerialError::Timeout)
    }

    /// 把读方向的 IO 错误归类
    pub fn from_read_error(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                SerialError::Timeout
            },
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => SerialError::Closed,
            _ => SerialError::Io(err),
        }
    }

    /// 把写方向的 IO 错误归类
    pub fn from_write_error(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SerialError::WriteTimeout,
            io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => SerialError::Closed,
            _ => SerialError::Io(err),
        }
    }
}

/// 读半边
///
/// `read_chunk` 在读超时时间内没有数据时返回 `SerialError::Timeout`，
/// 调用方应把它当作空闲而非故障。
pub trait SerialReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
}

/// 写半边
///
/// `write_all` 必须在有界时间内返回：写不进去时返回 `SerialError::WriteTimeout`。
pub trait SerialWriter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

impl<W: SerialWriter + ?Sized> SerialWriter for Box<W> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        (**self).flush()
    }
}

/// 可拆分为独立读写半边的传输
pub trait SplittableTransport {
    type Reader: SerialReader + Send + 'static;
    type Writer: SerialWriter + Send + 'static;

    /// 传输描述（端口名等），用于日志
    fn describe(&self) -> String;

    fn split(self) -> Result<(Self::Reader, Self::Writer), SerialError>;
}
