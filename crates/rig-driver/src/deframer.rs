//! 字节流解帧器
//!
//! 设备在同一串口上交替输出二进制应答帧和启动/调试文本，
//! 解帧器把两者分开：帧交给协议层，文本按行输出。
//!
//! # 算法
//!
//! 每收到一块字节就追加到内部缓冲区，然后循环：
//!
//! 1. 查找帧头 `FF FE`。找不到时全部按文本处理（末尾单独的 `0xFF`
//!    可能是被拆开的帧头，保留到下一块）。
//! 2. 帧头前面的字节按文本处理并移出缓冲区。
//! 3. 不足 5 字节时无法读取长度字段，等待。
//! 4. 帧长 `7 + length`，不足时等待。
//! 5. 解码：成功输出帧；校验失败输出 `CorruptFrame`，坏帧声明长度内、
//!    下一个帧头之前的字节一并丢弃（不会作为文本输出），然后从该帧头继续扫描。
//!    嵌在坏帧里的真实帧仍能找回，单个坏帧不会让整个流失步。
//!
//! 文本在遇到 `\n` 或帧头时结束一行，因此无论字节流怎样分块，
//! 输出的事件序列都相同。

use crate::event::LinkEvent;
use bytes::{Buf, Bytes, BytesMut};
use rig_protocol::{MARKER, decode, frame_len};
use std::collections::VecDeque;
use tracing::{trace, warn};

/// 单行文本的最大长度，超过后强制断行
pub const MAX_LINE_LEN: usize = 1024;

/// 流式解帧器
///
/// 独占自己的缓冲区，不与其他线程共享。
///
/// # 示例
///
/// ```rust
/// use rig_driver::{LinkEvent, StreamDeframer};
///
/// let mut deframer = StreamDeframer::new();
/// deframer.feed(b"boot ok\n\xFF\xFE\x00\xFE\x05\x00PONG");
/// deframer.feed(&[0x3D, 0x68]);
///
/// let events: Vec<LinkEvent> = deframer.events().collect();
/// assert_eq!(events[0], LinkEvent::Text("boot ok".to_string()));
/// assert!(events[1].as_frame().is_some());
/// ```
#[derive(Debug, Default)]
pub struct StreamDeframer {
    buf: BytesMut,
    line: Vec<u8>,
    ready: VecDeque<LinkEvent>,
}

impl StreamDeframer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加新到达的字节
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// 缓冲区中尚未处理的字节数（不含未结束的文本行）
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// 惰性事件迭代器
    ///
    /// 迭代器耗尽表示需要更多输入；未取出的事件保留在解帧器中，
    /// 之后可以继续迭代。
    pub fn events(&mut self) -> impl Iterator<Item = LinkEvent> + '_ {
        std::iter::from_fn(move || self.next_event())
    }

    /// 取出下一个事件，数据不足时返回 `None`
    pub fn next_event(&mut self) -> Option<LinkEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if !self.step() {
                return None;
            }
        }
    }

    /// 流结束：输出未结束的文本行，丢弃不完整的帧
    pub fn flush(&mut self) -> Vec<LinkEvent> {
        if !self.buf.is_empty() {
            trace!("discarding {} buffered bytes at end of stream", self.buf.len());
            self.buf.clear();
        }
        self.finish_line();
        self.ready.drain(..).collect()
    }

    /// 推进一步，返回是否有进展
    fn step(&mut self) -> bool {
        if self.buf.is_empty() {
            return false;
        }

        match find_marker(&self.buf) {
            None => {
                let keep = usize::from(self.buf.last() == Some(&MARKER[0]));
                let take = self.buf.len() - keep;
                if take == 0 {
                    return false;
                }
                let text = self.buf.split_to(take);
                self.push_text(&text);
                true
            },
            Some(offset) if offset > 0 => {
                let text = self.buf.split_to(offset);
                self.push_text(&text);
                self.finish_line();
                true
            },
            Some(_) => {
                // 帧头即结束当前文本行
                let had_line = !self.line.is_empty();
                self.finish_line();

                let Some(len) = frame_len(&self.buf) else {
                    return had_line;
                };
                if self.buf.len() < len {
                    return had_line;
                }

                match decode(&self.buf[..len]) {
                    Ok(frame) => {
                        trace!("frame decoded: {}", frame);
                        self.buf.advance(len);
                        self.ready.push_back(LinkEvent::Frame(frame));
                    },
                    Err(error) => {
                        let Some(skip) = corrupt_span(&self.buf, len) else {
                            return had_line;
                        };
                        let raw = Bytes::copy_from_slice(&self.buf[..len]);
                        warn!("corrupt frame ({}), resynchronizing", error);
                        self.buf.advance(skip);
                        self.ready.push_back(LinkEvent::CorruptFrame { raw, error });
                    },
                }
                true
            },
        }
    }

    fn push_text(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.finish_line();
            } else {
                self.line.push(byte);
                if self.line.len() >= MAX_LINE_LEN {
                    self.finish_line();
                }
            }
        }
    }

    fn finish_line(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.line)
            .trim_matches(|c: char| c.is_whitespace() || c.is_control())
            .to_string();
        self.line.clear();
        if !text.is_empty() {
            self.ready.push_back(LinkEvent::Text(text));
        }
    }
}

fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(MARKER.len()).position(|w| w == MARKER)
}

/// 坏帧要丢弃的字节数，`None` 表示需要再等一个字节
///
/// 至少丢弃帧头；声明长度内若还有帧头则停在那里。
/// 末尾的 `0xFF` 后面紧跟 `0xFE` 时是跨出声明长度的帧头，保留。
fn corrupt_span(buf: &[u8], len: usize) -> Option<usize> {
    if let Some(offset) = find_marker(&buf[MARKER.len()..len]) {
        return Some(MARKER.len() + offset);
    }
    if buf[len - 1] != MARKER[0] {
        return Some(len);
    }
    match buf.get(len) {
        None => None,
        Some(&next) if next == MARKER[1] => Some(len - 1),
        Some(_) => Some(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_protocol::{Opcode, encode};

    fn collect(deframer: &mut StreamDeframer) -> Vec<LinkEvent> {
        deframer.events().collect()
    }

    #[test]
    fn test_single_frame() {
        let mut deframer = StreamDeframer::new();
        deframer.feed(&encode(0, Opcode::Ping, b"\x00PONG").unwrap());
        let events = collect(&mut deframer);
        assert_eq!(events.len(), 1);
        let frame = events[0].as_frame().unwrap();
        assert_eq!(frame.opcode(), Some(Opcode::Ping));
        assert_eq!(frame.payload(), b"\x00PONG");
        assert_eq!(deframer.buffered(), 0);
    }

    #[test]
    fn test_text_then_frame() {
        let mut deframer = StreamDeframer::new();
        let mut stream = b"[INIT] servo driver ready\r\n[INIT] usb ok\n".to_vec();
        stream.extend(encode(0, Opcode::Enable, &[0x00]).unwrap());
        deframer.feed(&stream);

        let events = collect(&mut deframer);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].as_text(), Some("[INIT] servo driver ready"));
        assert_eq!(events[1].as_text(), Some("[INIT] usb ok"));
        assert!(events[2].as_frame().is_some());
    }

    #[test]
    fn test_marker_terminates_partial_line() {
        let mut deframer = StreamDeframer::new();
        let mut stream = b"no newline".to_vec();
        stream.extend(encode(0, Opcode::Ping, &[]).unwrap());
        deframer.feed(&stream);

        let events = collect(&mut deframer);
        assert_eq!(events[0].as_text(), Some("no newline"));
        assert!(events[1].as_frame().is_some());
    }

    #[test]
    fn test_partial_frame_waits() {
        let bytes = encode(0, Opcode::QueryBufferStatus, &[0, 5, 1, 0, 27]).unwrap();
        let mut deframer = StreamDeframer::new();

        // 不足 5 字节
        deframer.feed(&bytes[..3]);
        assert!(collect(&mut deframer).is_empty());
        assert_eq!(deframer.buffered(), 3);

        // 能读出长度但不完整
        deframer.feed(&bytes[3..8]);
        assert!(collect(&mut deframer).is_empty());

        deframer.feed(&bytes[8..]);
        let events = collect(&mut deframer);
        assert_eq!(events.len(), 1);
        assert!(events[0].as_frame().is_some());
    }

    #[test]
    fn test_split_marker_is_held() {
        let bytes = encode(0, Opcode::Ping, &[]).unwrap();
        let mut deframer = StreamDeframer::new();
        deframer.feed(b"log\n\xFF");
        let events = collect(&mut deframer);
        assert_eq!(events, vec![LinkEvent::Text("log".to_string())]);
        assert_eq!(deframer.buffered(), 1);

        deframer.feed(&bytes[1..]);
        let events = collect(&mut deframer);
        assert_eq!(events.len(), 1);
        assert!(events[0].as_frame().is_some());
    }

    #[test]
    fn test_corrupt_frame_resync() {
        let mut bad = encode(0, Opcode::Enable, &[0x00]).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = encode(0, Opcode::Disable, &[0x01]).unwrap();

        let mut stream = bad.clone();
        stream.extend(&good);

        let mut deframer = StreamDeframer::new();
        deframer.feed(&stream);
        let events = collect(&mut deframer);

        assert_eq!(events.len(), 2);
        let corrupt: Vec<_> = events.iter().filter(|e| e.is_corrupt()).collect();
        let frames: Vec<_> = events.iter().filter_map(|e| e.as_frame()).collect();
        assert_eq!(corrupt.len(), 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode(), Some(Opcode::Disable));

        match corrupt[0] {
            LinkEvent::CorruptFrame { raw, .. } => assert_eq!(raw.as_ref(), bad.as_slice()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_frame_inside_garbage_length() {
        // 伪帧头声明了很长的载荷，真实帧嵌在其中，校验失败后应重新找到它
        let good = encode(0, Opcode::Ping, &[]).unwrap();
        let mut stream = vec![0xFF, 0xFE, 0x00, 0x01, 0x02];
        stream.extend(&good);
        stream.extend(&[0x00, 0x00]);

        let mut deframer = StreamDeframer::new();
        deframer.feed(&stream);
        let events = collect(&mut deframer);
        assert_eq!(events.len(), 2);
        assert!(events[0].is_corrupt());
        assert_eq!(events[1].as_frame().unwrap().opcode(), Some(Opcode::Ping));
    }

    #[test]
    fn test_corrupt_body_is_not_text() {
        // 坏帧的 id、操作码、长度、载荷和 CRC 都属于坏帧，不能变成一行文本
        let mut bad = encode(0, Opcode::Ping, b"\x00PONG").unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0x10;
        let mut stream = b"ready\n".to_vec();
        stream.extend(&bad);
        stream.extend(encode(0, Opcode::StartMotion, &[0x00]).unwrap());

        let mut deframer = StreamDeframer::new();
        for byte in &stream {
            deframer.feed(&[*byte]);
        }
        let events = collect(&mut deframer);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].as_text(), Some("ready"));
        assert!(events[1].is_corrupt());
        assert_eq!(
            events[2].as_frame().unwrap().opcode(),
            Some(Opcode::StartMotion)
        );
        assert_eq!(deframer.buffered(), 0);
    }

    #[test]
    fn test_corrupt_span_keeps_straddling_marker() {
        let plain: [u8; 8] = [0xFF, 0xFE, 0, 1, 0, 7, 8, 9];
        assert_eq!(corrupt_span(&plain, 8), Some(8));
        let inner: [u8; 8] = [0xFF, 0xFE, 0, 1, 0xFF, 0xFE, 8, 9];
        assert_eq!(corrupt_span(&inner, 8), Some(4));

        let mut trailing: Vec<u8> = vec![0xFF, 0xFE, 0, 1, 0, 7, 8, 0xFF];
        assert_eq!(corrupt_span(&trailing, 8), None);
        trailing.push(0xFE);
        assert_eq!(corrupt_span(&trailing, 8), Some(7));
        trailing[8] = b'x';
        assert_eq!(corrupt_span(&trailing, 8), Some(8));
    }

    #[test]
    fn test_flush_emits_pending_line() {
        let mut deframer = StreamDeframer::new();
        deframer.feed(b"partial");
        assert!(collect(&mut deframer).is_empty());
        assert_eq!(
            deframer.flush(),
            vec![LinkEvent::Text("partial".to_string())]
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut deframer = StreamDeframer::new();
        deframer.feed(b"\r\n\n  \nhello\n");
        assert_eq!(
            collect(&mut deframer),
            vec![LinkEvent::Text("hello".to_string())]
        );
    }

    #[test]
    fn test_long_line_is_split() {
        let mut deframer = StreamDeframer::new();
        deframer.feed(&vec![b'a'; MAX_LINE_LEN + 10]);
        let events = collect(&mut deframer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_text().map(str::len), Some(MAX_LINE_LEN));
    }

    #[test]
    fn test_restartable_iteration() {
        let mut deframer = StreamDeframer::new();
        let mut stream = encode(0, Opcode::Ping, &[]).unwrap();
        stream.extend(encode(0, Opcode::StartMotion, &[0]).unwrap());
        deframer.feed(&stream);

        let first = deframer.next_event().unwrap();
        assert_eq!(first.as_frame().unwrap().opcode(), Some(Opcode::Ping));
        // 剩余事件留在解帧器中
        let rest = collect(&mut deframer);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].as_frame().unwrap().opcode(), Some(Opcode::StartMotion));
    }
}
