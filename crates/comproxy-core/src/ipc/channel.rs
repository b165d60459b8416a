//! The synchronous request/reply channel shared by all proxies.

use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A synchronous request/reply transport.
///
/// `send` blocks until the reply to this exact request has been read.
/// Implementations must hold the underlying transport exclusively for the
/// whole round trip, so concurrent callers never see each other's replies.
pub trait Channel: Send + Sync {
    fn send(&self, request: &[u8]) -> Result<Vec<u8>>;
}

/// Far-side handler that turns one encoded request into one encoded reply.
///
/// Failures are encoded into the reply rather than returned, so every request
/// gets an answer.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, request: &[u8]) -> Vec<u8>;
}

/// In-process channel that hands requests straight to a dispatcher.
pub struct LoopbackChannel<D> {
    dispatch: Arc<D>,
    exclusive: Mutex<()>,
    sends: AtomicU64,
}

impl<D: Dispatch> LoopbackChannel<D> {
    pub fn new(dispatch: Arc<D>) -> Self {
        Self {
            dispatch,
            exclusive: Mutex::new(()),
            sends: AtomicU64::new(0),
        }
    }

    /// Number of round trips completed so far.
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatch
    }
}

impl<D: Dispatch> Channel for LoopbackChannel<D> {
    fn send(&self, request: &[u8]) -> Result<Vec<u8>> {
        let _exclusive = self.exclusive.lock().unwrap_or_else(PoisonError::into_inner);
        let reply = self.dispatch.dispatch(request);
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(reply)
    }
}
