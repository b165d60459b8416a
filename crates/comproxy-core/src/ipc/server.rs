//! Far-side end of a [`TcpChannel`](super::TcpChannel).
//!
//! Every near-side process holds one connection, and all of its proxies share
//! it. Each connection gets its own task that reads one request envelope,
//! hands it to the [`Dispatch`] implementation and writes the reply before it
//! reads the next one, so replies leave in request order. Dispatch ends in a
//! call on a genuine host object that may block for as long as the host
//! likes, so it runs on the blocking pool and never stalls other connections.

use super::channel::Dispatch;
use super::protocol::{read_frame_async, write_frame_async};
use crate::config::ChannelConfig;
use crate::{ProxyError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A running channel server. Dropping it stops the server and closes every
/// open connection.
pub struct ChannelServerHandle {
    addr: SocketAddr,
    stop_accepting: Option<oneshot::Sender<()>>,
    close_connections: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl ChannelServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The bound port, as announced to the near side.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting proxies and close the connections already open.
    ///
    /// A round trip in flight on a closed connection fails on the near side
    /// with a transport error.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.stop_accepting.take() {
            let _ = tx.send(());
        }
        let _ = self.close_connections.send(true);
    }
}

impl Drop for ChannelServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// Counts a connection against [`ChannelConfig::MAX_CONNECTIONS`] until dropped.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn claim(open: &Arc<AtomicUsize>) -> Option<Self> {
        open.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            (n < ChannelConfig::MAX_CONNECTIONS).then_some(n + 1)
        })
        .ok()
        .map(|_| Self(open.clone()))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Serves request envelopes from near-side [`TcpChannel`](super::TcpChannel)s.
pub struct ChannelServer;

impl ChannelServer {
    /// Serve on an OS-assigned loopback port.
    pub async fn start<D: Dispatch>(dispatch: Arc<D>) -> Result<ChannelServerHandle> {
        Self::bind(dispatch, SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    /// Serve on `addr`. The server runs in background tasks until the
    /// returned handle is shut down or dropped.
    pub async fn bind<D: Dispatch>(dispatch: Arc<D>, addr: SocketAddr) -> Result<ChannelServerHandle> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::transport(format!("Failed to bind {}", addr), e))?;
        let addr = listener.local_addr()?;
        info!("Channel server listening on {}", addr);

        let (stop_accepting, stopped) = oneshot::channel();
        let (close_connections, closing) = watch::channel(false);
        let accept_task = tokio::spawn(Self::accept_loop(listener, dispatch, stopped, closing));

        Ok(ChannelServerHandle {
            addr,
            stop_accepting: Some(stop_accepting),
            close_connections,
            accept_task: Some(accept_task),
        })
    }

    async fn accept_loop<D: Dispatch>(
        listener: TcpListener,
        dispatch: Arc<D>,
        mut stopped: oneshot::Receiver<()>,
        closing: watch::Receiver<bool>,
    ) {
        let open = Arc::new(AtomicUsize::new(0));

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut stopped => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept a channel connection: {}", e);
                        continue;
                    }
                },
            };

            // Dropping the stream refuses the proxy; its first call fails
            let Some(slot) = ConnectionSlot::claim(&open) else {
                warn!(
                    "Refusing channel from {}: {} connections already open",
                    peer,
                    ChannelConfig::MAX_CONNECTIONS
                );
                continue;
            };

            let dispatch = dispatch.clone();
            let mut closing = closing.clone();
            tokio::spawn(async move {
                let _slot = slot;
                debug!("Proxies connected from {}", peer);
                match Self::serve_connection(stream, dispatch, &mut closing).await {
                    Ok(served) => debug!("Channel from {} closed after {} requests", peer, served),
                    Err(e) => debug!("Channel from {} dropped: {}", peer, e),
                }
            });
        }

        info!("Channel server stopped accepting connections");
    }

    /// Answer requests on one connection until the peer hangs up or the
    /// server closes. Returns the number of requests answered.
    async fn serve_connection<D: Dispatch>(
        mut stream: TcpStream,
        dispatch: Arc<D>,
        closing: &mut watch::Receiver<bool>,
    ) -> Result<u64> {
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.split();
        let mut served = 0;

        loop {
            let request = tokio::select! {
                read = read_frame_async(&mut reader) => match read? {
                    Some(request) => request,
                    None => return Ok(served),
                },
                _ = closing.changed() => return Ok(served),
            };

            let dispatch = dispatch.clone();
            let reply = tokio::task::spawn_blocking(move || dispatch.dispatch(&request))
                .await
                .map_err(|e| ProxyError::Other(format!("Dispatch task failed: {}", e)))?;

            write_frame_async(&mut writer, &reply).await?;
            served += 1;
        }
    }
}
