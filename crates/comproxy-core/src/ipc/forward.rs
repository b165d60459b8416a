//! Near-side call forwarding.
//!
//! [`ContextClient`] owns the channel and hands every proxy a [`Forwarder`]:
//! a non-owning handle that encodes one request envelope, blocks on the
//! channel until the matching reply arrives and decodes the result.

use super::channel::Channel;
use super::protocol::{Operation, ReplyEnvelope, RequestEnvelope};
use crate::codec::{from_bytes, to_bytes};
use crate::interface::{ProxiedInterface, Proxy, Snapshot};
use crate::registry::{ContextRegistry, OwnerKey};
use crate::{ProxyError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// A proxy's borrowed handle to the shared channel.
///
/// The forwarder never keeps the channel alive. Once the owning
/// [`ContextClient`] and every other strong reference are gone, forwarding
/// fails with [`ProxyError::ChannelClosed`].
#[derive(Clone)]
pub struct Forwarder {
    channel: Weak<dyn Channel>,
    next_id: Arc<AtomicU64>,
    owner: OwnerKey,
}

impl Forwarder {
    pub fn owner(&self) -> OwnerKey {
        self.owner
    }

    /// Forward one call and wait for its reply.
    pub fn call<I: ProxiedInterface>(&self, request: &I::Request) -> Result<I::Reply> {
        trace!("{} for {}: forwarding {:?}", I::NAME, self.owner, request);
        let payload = to_bytes(request)?;
        let reply = self.round_trip::<I>(Operation::Call, payload)?;
        Ok(from_bytes(&reply)?)
    }

    /// Ask the far side for a fresh snapshot of the owner's context.
    pub fn fetch_snapshot<I: ProxiedInterface>(&self) -> Result<I::Snapshot> {
        let reply = self.round_trip::<I>(Operation::Snapshot, Vec::new())?;
        Ok(from_bytes(&reply)?)
    }

    fn round_trip<I: ProxiedInterface>(&self, operation: Operation, payload: Vec<u8>) -> Result<Vec<u8>> {
        let channel = self.channel.upgrade().ok_or(ProxyError::ChannelClosed)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RequestEnvelope {
            id,
            interface: I::TAG,
            owner: self.owner,
            operation,
            payload,
        };

        let reply_bytes = channel.send(&to_bytes(&request)?)?;
        let reply: ReplyEnvelope = from_bytes(&reply_bytes)?;
        if reply.id != id {
            return Err(ProxyError::ReplyMismatch {
                expected: id,
                actual: reply.id,
            });
        }
        reply.into_result(self.owner)
    }
}

/// Near-side entry point: owns the channel and instantiates proxies.
pub struct ContextClient {
    channel: Arc<dyn Channel>,
    next_id: Arc<AtomicU64>,
}

impl ContextClient {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn forwarder(&self, owner: OwnerKey) -> Forwarder {
        Forwarder {
            channel: Arc::downgrade(&self.channel),
            next_id: self.next_id.clone(),
            owner,
        }
    }

    /// Instantiate and register a proxy from a snapshot that arrived as part
    /// of its owner's initialization.
    pub fn instantiate<P: Proxy>(
        &self,
        registry: &ContextRegistry<P>,
        snapshot: <P::Interface as ProxiedInterface>::Snapshot,
    ) -> Result<Arc<P>> {
        let owner = snapshot.owner();
        let proxy = P::from_snapshot(snapshot, self.forwarder(owner));
        let proxy = registry.activate(owner, proxy)?;
        debug!("Instantiated {} proxy for {}", <P::Interface as ProxiedInterface>::NAME, owner);
        Ok(proxy)
    }

    /// Fetch the owner's snapshot from the far side and instantiate a proxy.
    ///
    /// Returns `Ok(None)` when the far side never observed a genuine context
    /// for this owner; no proxy is built in that case.
    pub fn attach<P: Proxy>(&self, registry: &ContextRegistry<P>, owner: OwnerKey) -> Result<Option<Arc<P>>> {
        if let Some(existing) = registry.lookup(owner) {
            return Ok(Some(existing));
        }

        match self.forwarder(owner).fetch_snapshot::<P::Interface>() {
            Ok(snapshot) => {
                if snapshot.owner() != owner {
                    return Err(ProxyError::Other(format!(
                        "Snapshot for {} arrived tagged with {}",
                        owner,
                        snapshot.owner()
                    )));
                }
                match self.instantiate(registry, snapshot) {
                    Ok(proxy) => Ok(Some(proxy)),
                    // Another thread attached the same owner first
                    Err(ProxyError::AlreadyActive { .. }) => registry.require(owner).map(Some),
                    Err(e) => Err(e),
                }
            }
            Err(ProxyError::NoContext { .. }) => {
                debug!("No {} context available for {}", <P::Interface as ProxiedInterface>::NAME, owner);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
