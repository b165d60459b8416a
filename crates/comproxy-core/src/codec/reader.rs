use super::{CodecError, ABSENT, PRESENT};
use bytes::Buf;

/// Cursor over an encoded message.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.len() < needed {
            return Err(CodecError::UnexpectedEof {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_raw(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn get_blob(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.get_u32()? as usize;
        self.get_raw(len)
    }

    /// Length-prefixed UTF-16 text of at most `max_units` code units.
    pub fn get_text(&mut self, max_units: usize) -> Result<String, CodecError> {
        let len = self.get_u32()? as usize;
        if len > max_units {
            return Err(CodecError::TextTooLong {
                len,
                max: max_units,
            });
        }
        let raw = self.get_raw(len * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| CodecError::InvalidUtf16)
    }

    pub fn get_optional<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<Option<T>, CodecError> {
        match self.get_u8()? {
            ABSENT => Ok(None),
            PRESENT => f(self).map(Some),
            other => Err(CodecError::InvalidPresence(other)),
        }
    }

    /// Fail if any bytes are left over.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}
