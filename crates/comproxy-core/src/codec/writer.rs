use super::{CodecError, ABSENT, PRESENT};
use bytes::{BufMut, BytesMut};

/// Append-only encoder over a growable buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    /// Raw bytes with no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Length-prefixed bytes.
    pub fn put_blob(&mut self, bytes: &[u8]) {
        self.buf.put_u32_le(bytes.len() as u32);
        self.buf.put_slice(bytes);
    }

    /// Length-prefixed UTF-16 text of at most `max_units` code units.
    pub fn put_text(&mut self, text: &str, max_units: usize) -> Result<(), CodecError> {
        let units: Vec<u16> = text.encode_utf16().collect();
        if units.len() > max_units {
            return Err(CodecError::TextTooLong {
                len: units.len(),
                max: max_units,
            });
        }
        self.buf.reserve(4 + units.len() * 2);
        self.buf.put_u32_le(units.len() as u32);
        for unit in units {
            self.buf.put_u16_le(unit);
        }
        Ok(())
    }

    /// A presence byte followed by the value when there is one.
    pub fn put_optional<T>(
        &mut self,
        value: &Option<T>,
        f: impl FnOnce(&mut Self, &T) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        match value {
            Some(v) => {
                self.buf.put_u8(PRESENT);
                f(self, v)
            }
            None => {
                self.buf.put_u8(ABSENT);
                Ok(())
            }
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}
