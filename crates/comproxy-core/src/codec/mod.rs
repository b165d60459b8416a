//! Binary wire codec for snapshots and forwarded calls.
//!
//! The format is deliberately small:
//! - integers are little-endian
//! - every optional field is preceded by a presence byte (`0` absent, `1` present)
//! - text is UTF-16, prefixed by its length in code units and bounded by the
//!   field's declared maximum width
//!
//! ```text
//! optional<T>: [u8 presence][T if presence == 1]
//! text:        [u32 LE: units][units * u16 LE]
//! blob:        [u32 LE: len][len bytes]
//! ```
//!
//! Decoding an absent field yields `None`. Anything else that does not fit the
//! layout (bad presence byte, oversized length, truncated input, trailing
//! bytes) fails the whole decode.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

/// Presence marker for an absent optional field.
pub const ABSENT: u8 = 0;
/// Presence marker for a present optional field.
pub const PRESENT: u8 = 1;

/// Errors produced while encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("invalid presence marker {0:#04x}")]
    InvalidPresence(u8),

    #[error("text length {len} exceeds maximum {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("invalid UTF-16 text")]
    InvalidUtf16,

    #[error("invalid value {value:#x} for {field}")]
    InvalidValue { field: &'static str, value: u64 },

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// A value with a wire representation.
pub trait Encode {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError>;
}

/// A value that can be read back from its wire representation.
pub trait Decode: Sized {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError>;
}

/// Encode a value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::new();
    value.encode(&mut w)?;
    Ok(w.into_vec())
}

/// Decode a value that must occupy the whole buffer.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut r = Reader::new(bytes);
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

impl Encode for u64 {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.put_u64(*self);
        Ok(())
    }
}

impl Decode for u64 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.get_u64()
    }
}
