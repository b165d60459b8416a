//! Shared channel protocol types and framing.
//!
//! Stream transports carry one message per frame: a 4-byte big-endian length
//! prefix followed by the payload.
//!
//! ```text
//! [u32 BE: len][payload bytes of len]
//! ```
//!
//! Payloads are request and reply envelopes encoded with [`crate::codec`]:
//!
//! ```text
//! request: [u64 id][u16 interface][owner: optional u64][u8 operation][blob payload]
//! reply:   [u64 id][u8 status] ok:  [blob payload]
//!                              err: [i32 tresult][u8 failure kind][text message]
//! ```

use crate::abi::TResult;
use crate::codec::{CodecError, Decode, Encode, Reader, Writer};
use crate::config::ChannelConfig;
use crate::interface::InterfaceTag;
use crate::registry::OwnerKey;
use crate::{ProxyError, Result};
use std::io::{Read, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// ========================================
// Envelopes
// ========================================

/// What a request asks the far side to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Capture a snapshot so a proxy can be instantiated.
    Snapshot,
    /// Invoke a forwarded method.
    Call,
}

impl Operation {
    fn to_u8(self) -> u8 {
        match self {
            Operation::Snapshot => 0,
            Operation::Call => 1,
        }
    }

    fn from_u8(v: u8) -> std::result::Result<Self, CodecError> {
        match v {
            0 => Ok(Operation::Snapshot),
            1 => Ok(Operation::Call),
            _ => Err(CodecError::InvalidValue {
                field: "operation",
                value: v as u64,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub id: u64,
    pub interface: InterfaceTag,
    pub owner: OwnerKey,
    pub operation: Operation,
    pub payload: Vec<u8>,
}

impl Encode for RequestEnvelope {
    fn encode(&self, w: &mut Writer) -> std::result::Result<(), CodecError> {
        w.put_u64(self.id);
        w.put_u16(self.interface.0);
        self.owner.encode(w)?;
        w.put_u8(self.operation.to_u8());
        w.put_blob(&self.payload);
        Ok(())
    }
}

impl Decode for RequestEnvelope {
    fn decode(r: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            id: r.get_u64()?,
            interface: InterfaceTag(r.get_u16()?),
            owner: OwnerKey::decode(r)?,
            operation: Operation::from_u8(r.get_u8()?)?,
            payload: r.get_blob()?.to_vec(),
        })
    }
}

impl RequestEnvelope {
    /// Read just the request id, so even a malformed request gets a reply the
    /// caller can match.
    pub fn peek_id(bytes: &[u8]) -> Option<u64> {
        Reader::new(bytes).get_u64().ok()
    }
}

/// Why the far side could not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call was attempted and failed.
    Failed,
    /// No genuine context was ever observed for the owner.
    NoContext,
    /// The owner has already been torn down.
    Destroyed,
}

impl FailureKind {
    fn to_u8(self) -> u8 {
        match self {
            FailureKind::Failed => 0,
            FailureKind::NoContext => 1,
            FailureKind::Destroyed => 2,
        }
    }

    fn from_u8(v: u8) -> std::result::Result<Self, CodecError> {
        match v {
            0 => Ok(FailureKind::Failed),
            1 => Ok(FailureKind::NoContext),
            2 => Ok(FailureKind::Destroyed),
            _ => Err(CodecError::InvalidValue {
                field: "failure kind",
                value: v as u64,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok(Vec<u8>),
    Err {
        code: TResult,
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub id: u64,
    pub status: ReplyStatus,
}

impl ReplyEnvelope {
    pub fn success(id: u64, payload: Vec<u8>) -> Self {
        Self {
            id,
            status: ReplyStatus::Ok(payload),
        }
    }

    /// Build a failure reply from an error raised on the far side.
    pub fn failure(id: u64, err: &ProxyError) -> Self {
        let kind = match err {
            ProxyError::NoContext { .. } => FailureKind::NoContext,
            ProxyError::ContextDestroyed { .. } => FailureKind::Destroyed,
            _ => FailureKind::Failed,
        };
        let message: String = err
            .to_string()
            .chars()
            .take(ChannelConfig::MAX_ERROR_MESSAGE_UNITS / 2)
            .collect();
        Self {
            id,
            status: ReplyStatus::Err {
                code: err.to_tresult(),
                kind,
                message,
            },
        }
    }

    /// Turn this reply into the payload or the error it carries.
    pub fn into_result(self, owner: OwnerKey) -> Result<Vec<u8>> {
        match self.status {
            ReplyStatus::Ok(payload) => Ok(payload),
            ReplyStatus::Err { kind, code, message } => Err(match kind {
                FailureKind::NoContext => ProxyError::NoContext { owner },
                FailureKind::Destroyed => ProxyError::ContextDestroyed { owner },
                FailureKind::Failed => ProxyError::Remote { code, message },
            }),
        }
    }
}

impl Encode for ReplyEnvelope {
    fn encode(&self, w: &mut Writer) -> std::result::Result<(), CodecError> {
        w.put_u64(self.id);
        match &self.status {
            ReplyStatus::Ok(payload) => {
                w.put_u8(0);
                w.put_blob(payload);
            }
            ReplyStatus::Err {
                code,
                kind,
                message,
            } => {
                w.put_u8(1);
                w.put_i32(code.0);
                w.put_u8(kind.to_u8());
                w.put_text(message, ChannelConfig::MAX_ERROR_MESSAGE_UNITS)?;
            }
        }
        Ok(())
    }
}

impl Decode for ReplyEnvelope {
    fn decode(r: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        let id = r.get_u64()?;
        let status = match r.get_u8()? {
            0 => ReplyStatus::Ok(r.get_blob()?.to_vec()),
            1 => ReplyStatus::Err {
                code: TResult(r.get_i32()?),
                kind: FailureKind::from_u8(r.get_u8()?)?,
                message: r.get_text(ChannelConfig::MAX_ERROR_MESSAGE_UNITS)?,
            },
            other => {
                return Err(CodecError::InvalidValue {
                    field: "reply status",
                    value: other as u64,
                })
            }
        };
        Ok(Self { id, status })
    }
}

// ========================================
// Framing
// ========================================

fn check_frame_len(len: usize) -> Result<()> {
    if len > ChannelConfig::MAX_MESSAGE_SIZE {
        return Err(ProxyError::MessageTooLarge {
            size: len,
            max: ChannelConfig::MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// Read a length-prefixed frame from a blocking reader.
///
/// Returns `None` on clean EOF (peer closed connection).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    check_frame_len(len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Write a length-prefixed frame to a blocking writer.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_len(payload.len())?;
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Async counterpart of [`read_frame`].
pub async fn read_frame_async<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    check_frame_len(len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Async counterpart of [`write_frame`].
pub async fn write_frame_async<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_len(payload.len())?;
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes, to_bytes};

    #[test]
    fn test_request_envelope_roundtrip() {
        let request = RequestEnvelope {
            id: 9,
            interface: InterfaceTag(0x0101),
            owner: OwnerKey::Instance(42),
            operation: Operation::Call,
            payload: vec![1, 2, 3],
        };
        let bytes = to_bytes(&request).unwrap();
        assert_eq!(RequestEnvelope::peek_id(&bytes), Some(9));
        assert_eq!(from_bytes::<RequestEnvelope>(&bytes).unwrap(), request);
    }

    #[test]
    fn test_failure_reply_keeps_context_kinds() {
        let owner = OwnerKey::Instance(5);
        let reply = ReplyEnvelope::failure(3, &ProxyError::NoContext { owner });
        let decoded: ReplyEnvelope = from_bytes(&to_bytes(&reply).unwrap()).unwrap();
        assert!(matches!(
            decoded.into_result(owner),
            Err(ProxyError::NoContext { .. })
        ));

        let reply = ReplyEnvelope::failure(4, &ProxyError::Other("boom".into()));
        match reply.into_result(owner) {
            Err(ProxyError::Remote { code, message }) => {
                assert_eq!(code, TResult::INTERNAL_ERROR);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Remote, got: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_operation_fails_decode() {
        let mut request = to_bytes(&RequestEnvelope {
            id: 1,
            interface: InterfaceTag(1),
            owner: OwnerKey::Global,
            operation: Operation::Snapshot,
            payload: Vec::new(),
        })
        .unwrap();
        // id (8) + tag (2) + absent owner (1) puts the operation at offset 11
        request[11] = 9;
        assert!(from_bytes::<RequestEnvelope>(&request).is_err());
    }

    #[test]
    fn test_frame_read_write_roundtrip() {
        let payload = b"hello world";
        let mut buf = Vec::new();
        write_frame(&mut buf, payload).unwrap();
        assert_eq!(&buf[..4], &(payload.len() as u32).to_be_bytes());

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Some(payload.to_vec()));
    }

    #[test]
    fn test_frame_read_empty_stream_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_frame_read_oversized_returns_error() {
        let huge_len = (ChannelConfig::MAX_MESSAGE_SIZE + 1) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&huge_len.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProxyError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_frame_is_channel_closed() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&8_u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 3]);

        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProxyError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_async_frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame_async(&mut buf, b"ping").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = read_frame_async(&mut cursor).await.unwrap();
        assert_eq!(read_back, Some(b"ping".to_vec()));
    }
}
