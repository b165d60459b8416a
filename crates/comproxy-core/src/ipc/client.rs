//! Blocking TCP channel to a far-side channel server.
//!
//! Proxies forward calls from whatever thread the plugin happens to call them
//! on, so this client is synchronous. A `Mutex` around the connection makes
//! every round trip exclusive: the request is fully written and its reply fully
//! read before another caller may use the connection.
//!
//! A round trip that fails partway (a timeout, a short write, a dropped peer)
//! leaves the stream in an unknown position, possibly with that call's reply
//! still on the way. Such a connection is never reused. It is closed, the
//! failing call gets the error, and the next call opens a fresh connection.

use super::channel::Channel;
use super::protocol::{read_frame, write_frame};
use crate::config::ChannelConfig;
use crate::{ProxyError, Result};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// [`Channel`] over a TCP connection that is reopened after a failed round trip.
#[derive(Debug)]
pub struct TcpChannel {
    addr: SocketAddr,
    io_timeout: Duration,
    /// `None` after a failed round trip until the next call reconnects.
    stream: Mutex<Option<TcpStream>>,
}

impl TcpChannel {
    /// Connect to a channel server, using the configured connection and I/O
    /// timeouts.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with_timeout(addr, ChannelConfig::IO_TIMEOUT)
    }

    /// Connect with a specific per-read/per-write timeout.
    pub fn connect_with_timeout(addr: SocketAddr, io_timeout: Duration) -> Result<Self> {
        let stream = Self::open(addr, io_timeout)?;
        debug!("Channel connected to {}", addr);

        Ok(Self {
            addr,
            io_timeout,
            stream: Mutex::new(Some(stream)),
        })
    }

    fn open(addr: SocketAddr, io_timeout: Duration) -> Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, ChannelConfig::CONNECT_TIMEOUT)
            .map_err(|e| ProxyError::transport(format!("Failed to connect to {}", addr), e))?;
        stream
            .set_nodelay(true)
            .and_then(|()| stream.set_read_timeout(Some(io_timeout)))
            .and_then(|()| stream.set_write_timeout(Some(io_timeout)))
            .map_err(|e| ProxyError::transport("Failed to configure channel socket", e))?;
        Ok(stream)
    }

    /// Get the address of the connected server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether a connection is currently open. False between a failed round
    /// trip and the next call.
    pub fn is_connected(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<TcpStream>> {
        match self.stream.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panic while the lock was held may have left a frame half written
                let mut guard = poisoned.into_inner();
                *guard = None;
                self.stream.clear_poison();
                guard
            }
        }
    }
}

fn exchange(stream: &mut TcpStream, request: &[u8]) -> Result<Vec<u8>> {
    write_frame(stream, request)?;
    read_frame(stream)?.ok_or(ProxyError::ChannelClosed)
}

impl Channel for TcpChannel {
    fn send(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut slot = self.slot();

        let mut stream = match slot.take() {
            Some(stream) => stream,
            None => {
                debug!("Reopening channel to {}", self.addr);
                Self::open(self.addr, self.io_timeout)?
            }
        };

        match exchange(&mut stream, request) {
            Ok(reply) => {
                *slot = Some(stream);
                Ok(reply)
            }
            Err(e) => {
                // Dropping the stream closes it, so a late reply is never read
                // as the answer to a later request
                warn!("Channel round trip to {} failed, closing connection: {}", self.addr, e);
                Err(e)
            }
        }
    }
}
