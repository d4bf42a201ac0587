//! 脚本化的假设备（单元测试用）

use crate::requester::Requester;
use rig_driver::LinkError;
use rig_protocol::{Command, Opcode, Reply, ResponseCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&Command) -> Result<Reply, LinkError> + Send + Sync>;

/// 按脚本应答的请求端
///
/// 先消耗脚本队列，队列为空时交给 responder；都没有时返回 `ReplyTimeout`。
#[derive(Default)]
pub(crate) struct ScriptedRequester {
    script: Mutex<VecDeque<Result<Reply, LinkError>>>,
    sent: Mutex<Vec<Command>>,
    requests: AtomicUsize,
    responder: Option<Responder>,
    /// 每次请求时调用（测试中用来在特定时刻触发取消）
    on_request: Option<Arc<dyn Fn(&Command) + Send + Sync>>,
}

impl ScriptedRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Command) -> Result<Reply, LinkError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Command) + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(hook));
        self
    }

    pub fn push(&self, response: Result<Reply, LinkError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn push_ok(&self, opcode: Opcode, data: &[u8]) {
        self.push(Ok(Reply::new(opcode, ResponseCode::Ok, data.to_vec())));
    }

    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn count(&self, opcode: Opcode) -> usize {
        self.sent()
            .iter()
            .filter(|command| command.opcode() == opcode)
            .count()
    }
}

/// 对任何命令都回复空的 OK
pub(crate) fn ok_reply(command: &Command) -> Result<Reply, LinkError> {
    Ok(Reply::new(command.opcode(), ResponseCode::Ok, Vec::new()))
}

/// 缓冲区状态应答
pub(crate) fn status_reply(used: u8, running: bool) -> Result<Reply, LinkError> {
    Ok(Reply::new(
        Opcode::QueryBufferStatus,
        ResponseCode::Ok,
        vec![used, running as u8, 0, 32 - used],
    ))
}

impl Requester for ScriptedRequester {
    fn request(&self, command: &Command) -> Result<Reply, LinkError> {
        self.sent.lock().unwrap().push(command.clone());
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_request {
            hook(command);
        }

        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return response;
        }
        match &self.responder {
            Some(responder) => responder(command),
            None => Err(LinkError::ReplyTimeout {
                opcode: command.opcode().into(),
            }),
        }
    }

    fn send(&self, command: &Command) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(command.clone());
        Ok(())
    }
}
