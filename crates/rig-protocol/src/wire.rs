//! 载荷读取游标（crate 内部使用）

use crate::ProtocolError;

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.pos + N;
        let slice = self.buf.get(self.pos..end).ok_or(ProtocolError::InvalidLength {
            expected: end,
            actual: self.buf.len(),
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.take::<1>().map(|b| b[0])
    }

    pub(crate) fn i8(&mut self) -> Result<i8, ProtocolError> {
        self.u8().map(|b| b as i8)
    }

    pub(crate) fn u16_le(&mut self) -> Result<u16, ProtocolError> {
        self.take().map(u16::from_le_bytes)
    }

    pub(crate) fn u16_be(&mut self) -> Result<u16, ProtocolError> {
        self.take().map(u16::from_be_bytes)
    }

    pub(crate) fn i16_le(&mut self) -> Result<i16, ProtocolError> {
        self.take().map(i16::from_le_bytes)
    }

    pub(crate) fn i16_be(&mut self) -> Result<i16, ProtocolError> {
        self.take().map(i16::from_be_bytes)
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32, ProtocolError> {
        self.take().map(u32::from_le_bytes)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// 确认已读完全部载荷
    pub(crate) fn finish(self) -> Result<(), ProtocolError> {
        ProtocolError::check_len(self.pos, self.buf.len())
    }
}
