//! 请求接口
//!
//! 序列器和命令门面只依赖这个 trait，测试中可以用脚本化的假设备替代 `Link`。

use rig_driver::{Link, LinkError};
use rig_protocol::{Command, Reply};
use std::sync::Arc;

/// 发送命令并等待应答
pub trait Requester {
    /// 发送命令并等待同一操作码的 OK 应答
    ///
    /// 非 OK 应答返回 `LinkError::Rejected`，没有应答返回 `LinkError::ReplyTimeout`。
    fn request(&self, command: &Command) -> Result<Reply, LinkError>;

    /// 只发送，不等待应答
    fn send(&self, command: &Command) -> Result<(), LinkError>;
}

impl Requester for Link {
    fn request(&self, command: &Command) -> Result<Reply, LinkError> {
        self.call(command)
    }

    fn send(&self, command: &Command) -> Result<(), LinkError> {
        Link::send(self, command)
    }
}

impl<R: Requester + ?Sized> Requester for &R {
    fn request(&self, command: &Command) -> Result<Reply, LinkError> {
        (**self).request(command)
    }

    fn send(&self, command: &Command) -> Result<(), LinkError> {
        (**self).send(command)
    }
}

impl<R: Requester + ?Sized> Requester for Arc<R> {
    fn request(&self, command: &Command) -> Result<Reply, LinkError> {
        (**self).request(command)
    }

    fn send(&self, command: &Command) -> Result<(), LinkError> {
        (**self).send(command)
    }
}
