//! 运动序列器
//!
//! 把时间线上传到设备的运动缓冲区并监视执行，直到完成、取消或失败。
//!
//! # 执行流程
//!
//! 1. 清空缓冲区（失败即终止）
//! 2. 逐个使能涉及的舵机，按 (时间戳, 舵机) 顺序逐块上传；连续失败达到上限时终止
//! 3. 查询一次缓冲区状态，发送开始执行
//! 4. 周期轮询缓冲区状态，直到缓冲区清空且停止运行
//!
//! 链路断开在任何阶段都直接结束会话，不做重试。

use crate::error::{FailureReason, SequencerError};
use crate::events::{SessionEvent, SessionSink, TracingSessionSink};
use crate::requester::Requester;
use crate::session::{CancelToken, SequencerSession, SequencerState, SessionReport};
use crate::timeline::Timeline;
use rig_driver::LinkError;
use rig_protocol::{ActuatorSelect, BufferStatus, Command};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 轮询等待时检查取消标志的最大间隔
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// 序列器配置
///
/// 所有时间字段单位为毫秒。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SequencerConfig {
    /// 清空缓冲区后的等待
    pub clear_settle_ms: u64,
    /// 相邻两次使能之间的间隔
    pub enable_delay_ms: u64,
    /// 每上传一块后的间隔
    pub inter_send_delay_ms: u64,
    /// 连续上传失败上限
    pub max_consecutive_failures: u32,
    /// 上传结束到开始执行之间的等待
    pub start_settle_ms: u64,
    pub poll_interval_ms: u64,
    /// 超时判定：最后一块时间戳 + 余量
    pub timeout_margin_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            clear_settle_ms: 100,
            enable_delay_ms: 50,
            inter_send_delay_ms: 10,
            max_consecutive_failures: 3,
            start_settle_ms: 100,
            poll_interval_ms: 1000,
            timeout_margin_ms: 5000,
        }
    }
}

impl SequencerConfig {
    /// 无等待配置（测试和仿真用）
    pub fn fast() -> Self {
        Self {
            clear_settle_ms: 0,
            enable_delay_ms: 0,
            inter_send_delay_ms: 0,
            start_settle_ms: 0,
            poll_interval_ms: 1,
            ..Self::default()
        }
    }

    pub fn clear_settle(&self) -> Duration {
        Duration::from_millis(self.clear_settle_ms)
    }

    pub fn enable_delay(&self) -> Duration {
        Duration::from_millis(self.enable_delay_ms)
    }

    pub fn inter_send_delay(&self) -> Duration {
        Duration::from_millis(self.inter_send_delay_ms)
    }

    pub fn start_settle(&self) -> Duration {
        Duration::from_millis(self.start_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout_margin(&self) -> Duration {
        Duration::from_millis(self.timeout_margin_ms)
    }
}

/// 运动序列器
///
/// 同一时刻只允许一个会话；并发调用 [`execute`](Self::execute) 返回 `SequencerError::Busy`。
///
/// ```rust,no_run
/// use rig_client::{CancelToken, Sequencer, SequencerConfig, Timeline};
/// use rig_driver::LinkBuilder;
///
/// let link = LinkBuilder::new().port("/dev/ttyACM0").build().unwrap();
/// let timeline: Timeline = Timeline::new(Vec::new());
/// let sequencer = Sequencer::new(&link, SequencerConfig::default());
/// let report = sequencer.execute(&timeline, &CancelToken::new()).unwrap();
/// println!("{}", report.outcome);
/// ```
pub struct Sequencer<R> {
    requester: R,
    config: SequencerConfig,
    sink: Arc<dyn SessionSink>,
    busy: AtomicBool,
}

/// 会话结束时释放 busy 标志
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: Requester> Sequencer<R> {
    pub fn new(requester: R, config: SequencerConfig) -> Self {
        Self {
            requester,
            config,
            sink: Arc::new(TracingSessionSink),
            busy: AtomicBool::new(false),
        }
    }

    /// 替换默认的日志 sink
    pub fn with_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 执行一条时间线，阻塞到会话结束
    ///
    /// 会话失败体现在报告的 `outcome` 中（见 [`SessionReport::into_result`]），
    /// 只有序列器正忙时才返回错误。
    pub fn execute(
        &self,
        timeline: &Timeline,
        cancel: &CancelToken,
    ) -> Result<SessionReport, SequencerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SequencerError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let mut session = SequencerSession::new(timeline.flatten());
        info!(
            "starting motion session: {} blocks on {} actuators",
            session.blocks().len(),
            session.actuators().len()
        );

        let started = Instant::now();
        let outcome = self.drive(&mut session, cancel);
        self.transition(&mut session, outcome);

        let report = SessionReport {
            outcome,
            uploaded: session.uploaded(),
            failed: session.failed(),
            total: session.blocks().len(),
            elapsed: started.elapsed(),
        };
        self.sink
            .on_session_event(&SessionEvent::Finished(report.clone()));
        Ok(report)
    }

    /// 依次推进各阶段，返回终止状态
    fn drive(&self, session: &mut SequencerSession, cancel: &CancelToken) -> SequencerState {
        // ==================== 清空缓冲区 ====================
        self.transition(session, SequencerState::ClearingBuffer);
        if let Err(e) = self.requester.request(&Command::ClearBuffer) {
            warn!("clear buffer failed (link lost: {}): {}", e.is_link_lost(), e);
            return SequencerState::Failed(FailureReason::ClearFailed);
        }
        spin_sleep::sleep(self.config.clear_settle());

        // ==================== 上传 ====================
        self.transition(session, SequencerState::Uploading);
        if let Some(state) = self.enable_actuators(session) {
            return state;
        }
        if let Some(state) = self.upload(session, cancel) {
            return state;
        }
        if session.uploaded() == 0 {
            warn!("no motion block was accepted");
            return SequencerState::Failed(FailureReason::NothingUploaded);
        }

        // ==================== 启动 ====================
        self.transition(session, SequencerState::Starting);
        spin_sleep::sleep(self.config.start_settle());
        match self.query_status() {
            Ok(Some(status)) => self.sink.on_session_event(&SessionEvent::Status(status)),
            Ok(None) => {},
            // 仅用于日志，链路问题由随后的启动命令暴露
            Err(e) => warn!("status query before start failed: {}", e),
        }
        if cancel.is_cancelled() {
            return self.abandon_upload();
        }
        if let Err(e) = self.requester.request(&Command::StartMotion) {
            warn!("start motion failed (link lost: {}): {}", e.is_link_lost(), e);
            return SequencerState::Failed(FailureReason::StartFailed);
        }

        // ==================== 执行 ====================
        self.transition(session, SequencerState::Running);
        self.monitor(session, cancel)
    }

    /// 逐个使能涉及的舵机（从不使用“全部使能”）
    fn enable_actuators(&self, session: &SequencerSession) -> Option<SequencerState> {
        for &id in session.actuators() {
            match self.requester.request(&Command::Enable(ActuatorSelect::One(id))) {
                Ok(_) => debug!("actuator {} enabled", id),
                Err(e) if e.is_link_lost() => {
                    warn!("link lost while enabling actuator {}: {}", id, e);
                    return Some(SequencerState::Failed(FailureReason::LinkLost));
                },
                // 使能被拒绝不影响上传，运动块仍由设备校验
                Err(e) => warn!("enable actuator {} failed: {}", id, e),
            }
            spin_sleep::sleep(self.config.enable_delay());
        }
        None
    }

    fn upload(&self, session: &mut SequencerSession, cancel: &CancelToken) -> Option<SequencerState> {
        let total = session.blocks().len();
        let limit = self.config.max_consecutive_failures.max(1);
        let mut consecutive = 0u32;

        for index in 0..total {
            if cancel.is_cancelled() {
                info!("upload cancelled at block {}/{}", index + 1, total);
                return Some(self.abandon_upload());
            }

            let block = session.blocks()[index];
            match self.requester.request(&block.to_command()) {
                Ok(reply) => {
                    consecutive = 0;
                    session.uploaded += 1;
                    let available = reply.block_ack().ok().and_then(|ack| ack.available);
                    self.sink.on_session_event(&SessionEvent::BlockUploaded {
                        index,
                        total,
                        block,
                        available,
                    });
                },
                Err(e) if e.is_link_lost() => {
                    warn!("link lost during upload: {}", e);
                    return Some(SequencerState::Failed(FailureReason::LinkLost));
                },
                Err(e) => {
                    consecutive += 1;
                    session.failed += 1;
                    self.sink.on_session_event(&SessionEvent::BlockRejected {
                        index,
                        total,
                        block,
                        error: e.to_string(),
                        consecutive,
                    });
                    if consecutive >= limit {
                        warn!("{} consecutive upload failures, aborting", consecutive);
                        return Some(SequencerState::Failed(FailureReason::UploadAborted));
                    }
                },
            }
            spin_sleep::sleep(self.config.inter_send_delay());
        }
        None
    }

    /// 轮询直到缓冲区清空、取消或超时
    fn monitor(&self, session: &SequencerSession, cancel: &CancelToken) -> SequencerState {
        let started = Instant::now();
        let budget = session.span() + self.config.timeout_margin();
        let mut last_status: Option<BufferStatus> = None;

        loop {
            self.wait(self.config.poll_interval(), cancel);

            if cancel.is_cancelled() {
                info!("motion cancelled, stopping");
                if let Err(e) = self.requester.request(&Command::StopMotion) {
                    warn!("stop motion failed: {}", e);
                }
                return SequencerState::Cancelled;
            }

            match self.query_status() {
                Ok(Some(status)) => {
                    if last_status != Some(status) {
                        self.sink.on_session_event(&SessionEvent::Status(status));
                        last_status = Some(status);
                    }
                    if status.is_drained() {
                        return SequencerState::Completed;
                    }
                },
                Ok(None) => {},
                Err(_) => return SequencerState::Failed(FailureReason::LinkLost),
            }

            if started.elapsed() > budget {
                warn!(
                    "motion still running after {:.1}s, giving up",
                    started.elapsed().as_secs_f64()
                );
                return SequencerState::Failed(FailureReason::Timeout);
            }
        }
    }

    /// 查询缓冲区状态
    ///
    /// 只有链路断开才返回错误；超时、拒绝和格式错误记录日志后返回 `None`。
    fn query_status(&self) -> Result<Option<BufferStatus>, LinkError> {
        match self.requester.request(&Command::QueryBufferStatus) {
            Ok(reply) => match reply.buffer_status() {
                Ok(status) => Ok(Some(status)),
                Err(e) => {
                    warn!("malformed buffer status: {}", e);
                    Ok(None)
                },
            },
            Err(e) if e.is_link_lost() => {
                warn!("link lost while querying buffer status: {}", e);
                Err(e)
            },
            Err(e) => {
                debug!("buffer status query failed: {}", e);
                Ok(None)
            },
        }
    }

    /// 执行前取消：尽力清空已上传的块
    fn abandon_upload(&self) -> SequencerState {
        if let Err(e) = self.requester.request(&Command::ClearBuffer) {
            warn!("clear buffer after cancel failed: {}", e);
        }
        SequencerState::Cancelled
    }

    /// 分片休眠，取消后提前返回
    fn wait(&self, duration: Duration, cancel: &CancelToken) {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline || cancel.is_cancelled() {
                return;
            }
            spin_sleep::sleep((deadline - now).min(CANCEL_CHECK_SLICE));
        }
    }

    fn transition(&self, session: &mut SequencerSession, to: SequencerState) {
        let from = session.state;
        if from == to {
            return;
        }
        session.state = to;
        self.sink
            .on_session_event(&SessionEvent::StateChanged { from, to });
    }
}
