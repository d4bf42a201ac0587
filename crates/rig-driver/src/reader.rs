//! 后台读线程
//!
//! 读线程独占传输的读半边和解帧器：循环读取字节块，解出事件并分发。
//! 分发只经过 sink（非阻塞），因此读线程不会被任何消费者拖慢。

use crate::deframer::StreamDeframer;
use crate::event::LinkEvent;
use crate::link::LinkShared;
use crate::state::LinkState;
use rig_serial::SerialReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace};

/// 读线程参数
pub(crate) struct ReaderContext {
    pub shared: Arc<LinkShared>,
    /// 本次连接的运行标志，`disconnect()` 清除后读线程在下一次读超时内退出
    pub running: Arc<AtomicBool>,
    pub chunk_size: usize,
    pub idle_sleep: Duration,
}

/// 读循环
///
/// 传输返回致命错误时：输出残留文本行，把链路置为 `Disconnected`，
/// 发布 `ReaderExited` 后退出。
pub(crate) fn reader_loop<R: SerialReader>(mut reader: R, ctx: ReaderContext) {
    let ReaderContext {
        shared,
        running,
        chunk_size,
        idle_sleep,
    } = ctx;

    let mut deframer = StreamDeframer::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    while running.load(Ordering::Acquire) {
        match reader.read_chunk(&mut buf) {
            Ok(0) => spin_sleep::sleep(idle_sleep),
            Ok(n) => {
                let chunk = &buf[..n];
                trace!("rx {}", hex::encode(chunk));
                shared.metrics.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
                shared.monitor.register_rx();

                deframer.feed(chunk);
                while let Some(event) = deframer.next_event() {
                    shared.publish(event);
                }
            },
            Err(e) if e.is_timeout() => {
                shared.metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                spin_sleep::sleep(idle_sleep);
            },
            Err(e) => {
                if !running.load(Ordering::Acquire) {
                    // 正在断开，读半边随端口一起关闭
                    break;
                }
                error!("Serial read failed, closing link: {}", e);
                for event in deframer.flush() {
                    shared.publish(event);
                }
                shared.state.set(LinkState::Disconnected, Ordering::Release);
                shared.publish(LinkEvent::ReaderExited {
                    error: e.to_string(),
                });
                return;
            },
        }
    }

    for event in deframer.flush() {
        shared.publish(event);
    }
    debug!("Reader thread exiting");
}
