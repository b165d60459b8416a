//! Error types for comproxy.
//!
//! Every failure surfaced by the proxy layer is a [`ProxyError`]. Callers that
//! sit behind an ABI boundary cannot see Rust errors, so each variant also maps
//! to the interface's standard result code through [`ProxyError::to_tresult`].

use crate::abi::TResult;
use crate::codec::CodecError;
use crate::registry::OwnerKey;
use thiserror::Error;

/// Main error type for the proxy layer.
#[derive(Debug, Error)]
pub enum ProxyError {
    // Transport errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Channel closed by peer")]
    ChannelClosed,

    #[error("Reply id {actual} does not match request id {expected}")]
    ReplyMismatch { expected: u64, actual: u64 },

    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    // Wire format errors
    #[error("Malformed message: {0}")]
    Codec(#[from] CodecError),

    #[error("Unknown interface tag {0:#06x}")]
    UnknownInterface(u16),

    #[error("Unexpected reply for {request}")]
    UnexpectedReply { request: &'static str },

    // Context lifecycle errors
    #[error("No context available for {owner}")]
    NoContext { owner: OwnerKey },

    #[error("Context for {owner} has been destroyed")]
    ContextDestroyed { owner: OwnerKey },

    #[error("Context for {owner} is already active")]
    AlreadyActive { owner: OwnerKey },

    #[error("Proxy for {owner} has been released")]
    Released { owner: OwnerKey },

    // Failures reported by the far side
    #[error("Remote call failed ({code}): {message}")]
    Remote { code: TResult, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return ProxyError::ChannelClosed;
        }
        ProxyError::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ProxyError {
    /// Create a transport error with context.
    pub fn transport(message: impl Into<String>, err: std::io::Error) -> Self {
        ProxyError::Transport {
            message: format!("{}: {}", message.into(), err),
            source: Some(err),
        }
    }

    /// Convert to the result code an ABI caller observes.
    ///
    /// - transport and wire failures: `kInternalError`
    /// - missing, destroyed or released contexts: `kNotInitialized`
    /// - unknown interfaces: `kNoInterface`
    /// - remote failures: the code the far side reported
    pub fn to_tresult(&self) -> TResult {
        match self {
            ProxyError::Transport { .. }
            | ProxyError::ChannelClosed
            | ProxyError::ReplyMismatch { .. }
            | ProxyError::MessageTooLarge { .. }
            | ProxyError::Codec(_)
            | ProxyError::UnexpectedReply { .. } => TResult::INTERNAL_ERROR,

            ProxyError::NoContext { .. }
            | ProxyError::ContextDestroyed { .. }
            | ProxyError::Released { .. } => TResult::NOT_INITIALIZED,

            ProxyError::UnknownInterface(_) => TResult::NO_INTERFACE,

            ProxyError::AlreadyActive { .. } => TResult::INVALID_ARGUMENT,

            ProxyError::Remote { code, .. } => *code,

            ProxyError::Other(_) => TResult::INTERNAL_ERROR,
        }
    }

    /// Whether this error means "no context" rather than "call failed".
    pub fn is_absent_context(&self) -> bool {
        matches!(
            self,
            ProxyError::NoContext { .. } | ProxyError::ContextDestroyed { .. }
        )
    }
}
