//! 基于 `serialport` 的串口后端
//!
//! 打开端口后通过 `try_clone()` 得到读、写两个独立句柄：
//! 读句柄使用短超时（空闲轮询），写句柄使用较长的写超时。

use crate::{SerialError, SerialReader, SerialWriter, SplittableTransport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 串口参数（8N1，无流控）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub path: String,
    pub baud_rate: u32,
    /// 读句柄超时（决定读线程多久检查一次退出标志）
    pub read_timeout: Duration,
    /// 写句柄超时
    pub write_timeout: Duration,
}

impl PortSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(50),
            write_timeout: Duration::from_secs(1),
        }
    }
}

impl From<serialport::Error> for SerialError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::Io(kind) => {
                SerialError::Io(std::io::Error::new(kind, err.description))
            },
            _ => SerialError::Port(err.to_string()),
        }
    }
}

/// 已打开的串口
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    settings: PortSettings,
}

impl SerialPortTransport {
    pub fn open(settings: PortSettings) -> Result<Self, SerialError> {
        debug!(
            "Opening serial port {} @ {} baud",
            settings.path, settings.baud_rate
        );
        let port = serialport::new(&settings.path, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()?;

        // 丢弃打开前残留在驱动缓冲区里的字节
        port.clear(ClearBuffer::All)?;

        info!("Serial port {} opened", settings.path);
        Ok(Self { port, settings })
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }
}

impl SplittableTransport for SerialPortTransport {
    type Reader = SerialPortReader;
    type Writer = SerialPortWriter;

    fn describe(&self) -> String {
        format!("{} @ {}", self.settings.path, self.settings.baud_rate)
    }

    fn split(self) -> Result<(SerialPortReader, SerialPortWriter), SerialError> {
        let mut writer = self.port.try_clone()?;
        writer.set_timeout(self.settings.write_timeout)?;
        Ok((
            SerialPortReader { port: self.port },
            SerialPortWriter { port: writer },
        ))
    }
}

/// 串口读半边
pub struct SerialPortReader {
    port: Box<dyn SerialPort>,
}

impl SerialReader for SerialPortReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        match self.port.read(buf) {
            Ok(0) => Err(SerialError::Timeout),
            Ok(n) => {
                trace!("serial rx {} bytes", n);
                Ok(n)
            },
            Err(e) => Err(SerialError::from_read_error(e)),
        }
    }
}

/// 串口写半边
pub struct SerialPortWriter {
    port: Box<dyn SerialPort>,
}

impl SerialWriter for SerialPortWriter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port
            .write_all(bytes)
            .map_err(SerialError::from_write_error)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        self.port.flush().map_err(SerialError::from_write_error)
    }
}

/// 可用串口信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// 枚举系统中的串口
pub fn list_ports() -> Result<Vec<PortInfo>, SerialError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            description: describe_port_type(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            format!("{} ({:04x}:{:04x})", product, usb.vid, usb.pid)
        },
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PortSettings::new("/dev/ttyACM0");
        assert_eq!(settings.path, "/dev/ttyACM0");
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.write_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let settings = PortSettings::new("/dev/this-port-does-not-exist");
        assert!(SerialPortTransport::open(settings).is_err());
    }

    #[test]
    fn test_describe_port_type() {
        assert_eq!(describe_port_type(&SerialPortType::PciPort), "PCI");
        assert_eq!(describe_port_type(&SerialPortType::Unknown), "Unknown");
    }
}
