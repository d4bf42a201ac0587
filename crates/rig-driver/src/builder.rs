//! Builder 模式实现
//!
//! 链式构造并连接 [`Link`]。

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::link::Link;
use crate::sink::{EventSink, TracingSink};
use rig_serial::SplittableTransport;
use std::sync::Arc;

#[cfg(feature = "hardware")]
use rig_serial::{DEFAULT_BAUD_RATE, PortSettings, SerialError, SerialPortTransport};

/// Link Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rig_driver::{LinkBuilder, LinkConfig};
///
/// let link = LinkBuilder::new()
///     .port("/dev/ttyACM0")
///     .baud_rate(115_200)
///     .config(LinkConfig::default())
///     .build()
///     .unwrap();
/// ```
pub struct LinkBuilder {
    /// 串口名称（如 `/dev/ttyACM0`、`COM3`）
    port: Option<String>,
    baud_rate: Option<u32>,
    config: LinkConfig,
    sinks: Vec<Arc<dyn EventSink>>,
    /// 是否自动添加 `TracingSink`
    tracing: bool,
}

impl LinkBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: None,
            config: LinkConfig::default(),
            sinks: Vec::new(),
            tracing: true,
        }
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// 添加事件 sink（读线程上调用，必须非阻塞）
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// 不添加默认的 `TracingSink`
    pub fn without_tracing(mut self) -> Self {
        self.tracing = false;
        self
    }

    fn into_link(self) -> Link {
        let mut sinks = self.sinks;
        if self.tracing {
            sinks.insert(0, Arc::new(TracingSink));
        }
        Link::with_sinks(self.config, sinks)
    }

    /// 在给定传输上建立连接（测试或自定义传输）
    pub fn connect<T: SplittableTransport>(self, transport: T) -> Result<Link, LinkError> {
        let link = self.into_link();
        link.connect(transport)?;
        Ok(link)
    }

    /// 打开串口并连接
    #[cfg(feature = "hardware")]
    pub fn build(self) -> Result<Link, LinkError> {
        let port = self
            .port
            .clone()
            .ok_or_else(|| SerialError::Port("no serial port specified".to_string()))?;

        let settings = PortSettings {
            path: port,
            baud_rate: self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            read_timeout: self.config.read_timeout(),
            write_timeout: self.config.write_timeout(),
        };
        let transport = SerialPortTransport::open(settings)?;
        self.connect(transport)
    }
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_sink::ChannelSink;
    use crate::event::LinkEvent;
    use rig_serial::MockTransport;
    use std::time::Duration;

    #[test]
    fn test_builder_connects_with_custom_sink() {
        let (sink, rx) = ChannelSink::new(16);
        let (transport, device) = MockTransport::pair();
        let link = LinkBuilder::new()
            .config(LinkConfig::fast())
            .without_tracing()
            .sink(Arc::new(sink))
            .connect(transport)
            .unwrap();
        assert!(link.is_connected());

        device.inject(b"hello from device\n").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event, LinkEvent::Text("hello from device".into()));
    }

    #[cfg(feature = "hardware")]
    #[test]
    fn test_build_without_port_fails() {
        let result = LinkBuilder::new().build();
        assert!(matches!(
            result,
            Err(LinkError::Serial(SerialError::Port(_)))
        ));
    }

    #[cfg(feature = "hardware")]
    #[test]
    fn test_build_missing_port_fails() {
        let result = LinkBuilder::new()
            .port("/dev/this-port-does-not-exist")
            .config(LinkConfig::fast())
            .build();
        assert!(result.is_err());
    }
}
