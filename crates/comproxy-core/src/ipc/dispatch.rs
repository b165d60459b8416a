//! Far-side request routing.
//!
//! Routes incoming request envelopes to the adapter registry for the
//! envelope's interface tag. Each registry looks up the owner's adapter,
//! decodes the arguments, calls the real method and encodes the result.

use super::channel::Dispatch;
use super::protocol::{Operation, ReplyEnvelope, RequestEnvelope};
use crate::codec::{from_bytes, to_bytes};
use crate::interface::{Adapter, InterfaceTag, ProxiedInterface};
use crate::registry::{ContextRegistry, OwnerKey};
use crate::{ProxyError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Type-erased service for one interface tag.
pub trait InterfaceService: Send + Sync {
    fn snapshot(&self, owner: OwnerKey) -> Result<Vec<u8>>;
    fn call(&self, owner: OwnerKey, payload: &[u8]) -> Result<Vec<u8>>;
}

impl<A: Adapter> InterfaceService for ContextRegistry<A> {
    fn snapshot(&self, owner: OwnerKey) -> Result<Vec<u8>> {
        let adapter = self.require(owner)?;
        Ok(to_bytes(&adapter.snapshot()?)?)
    }

    fn call(&self, owner: OwnerKey, payload: &[u8]) -> Result<Vec<u8>> {
        // Checked before decoding so an owner that is gone is reported as
        // such even when the payload is garbage.
        let adapter = self.require(owner)?;
        let request: <A::Interface as ProxiedInterface>::Request = from_bytes(payload)?;
        let reply = adapter.handle(request)?;
        Ok(to_bytes(&reply)?)
    }
}

/// Far-side dispatcher serving every registered adapter registry.
#[derive(Default)]
pub struct AdapterHost {
    services: HashMap<InterfaceTag, Arc<dyn InterfaceService>>,
}

impl AdapterHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve requests for `A`'s interface from `registry`.
    pub fn register<A: Adapter>(&mut self, registry: Arc<ContextRegistry<A>>) -> &mut Self {
        let tag = <A::Interface as ProxiedInterface>::TAG;
        if self.services.insert(tag, registry).is_some() {
            warn!(
                "Replaced the adapter registry for {} ({})",
                <A::Interface as ProxiedInterface>::NAME,
                tag
            );
        }
        self
    }

    fn handle(&self, request: RequestEnvelope) -> Result<Vec<u8>> {
        let service = self
            .services
            .get(&request.interface)
            .ok_or(ProxyError::UnknownInterface(request.interface.0))?;

        match request.operation {
            Operation::Snapshot => service.snapshot(request.owner),
            Operation::Call => service.call(request.owner, &request.payload),
        }
    }
}

impl Dispatch for AdapterHost {
    fn dispatch(&self, request: &[u8]) -> Vec<u8> {
        let id = RequestEnvelope::peek_id(request).unwrap_or(0);
        let reply = match from_bytes::<RequestEnvelope>(request) {
            Ok(envelope) => {
                debug!(
                    "Request {}: {:?} on interface {} for {}",
                    envelope.id, envelope.operation, envelope.interface, envelope.owner
                );
                match self.handle(envelope) {
                    Ok(payload) => ReplyEnvelope::success(id, payload),
                    Err(e) => {
                        if e.is_absent_context() {
                            debug!("Request {}: {}", id, e);
                        } else {
                            warn!("Request {} failed: {}", id, e);
                        }
                        ReplyEnvelope::failure(id, &e)
                    }
                }
            }
            Err(e) => {
                warn!("Malformed request {}: {}", id, e);
                ReplyEnvelope::failure(id, &ProxyError::Codec(e))
            }
        };

        match to_bytes(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Failure messages are already cut to the wire limit, so this
                // only happens for a reply that is itself unencodable.
                warn!("Failed to encode reply {}: {}", id, e);
                let fallback = ReplyEnvelope::failure(id, &ProxyError::Codec(e));
                to_bytes(&fallback).unwrap_or_default()
            }
        }
    }
}
