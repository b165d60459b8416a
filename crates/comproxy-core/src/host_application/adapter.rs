//! Far-side wrapper around a genuine host context.

use super::{HostApplicationInterface, HostApplicationReply, HostApplicationRequest, HostApplicationSnapshot};
use crate::abi::{HostApplication, TResult};
use crate::interface::Adapter;
use crate::registry::{ContextEntry, ContextRegistry, OwnerKey};
use crate::{ProxyError, Result};
use std::sync::Arc;
use tracing::{debug, trace};

/// Holds one reference on a genuine `IHostApplication` for as long as it
/// lives, and services the calls its proxy forwards.
pub struct HostApplicationAdapter {
    context: Arc<dyn HostApplication>,
    owner: OwnerKey,
}

impl HostApplicationAdapter {
    /// Wrap a genuine context.
    ///
    /// Fails with [`ProxyError::NoContext`] when there is no pointer to wrap.
    pub fn new(context: Option<Arc<dyn HostApplication>>, owner: OwnerKey) -> Result<Self> {
        let context = context.ok_or(ProxyError::NoContext { owner })?;
        context.add_ref();
        Ok(Self { context, owner })
    }

    /// Record the context pointer an owner's initialization received.
    ///
    /// A missing pointer leaves the owner uninitialized and returns `Ok(None)`.
    pub fn observe(
        registry: &ContextRegistry<Self>,
        owner: OwnerKey,
        context: Option<Arc<dyn HostApplication>>,
    ) -> Result<Option<Arc<Self>>> {
        match Self::new(context, owner) {
            Ok(adapter) => {
                debug!("Observed host context for {}", owner);
                registry.activate(owner, adapter).map(Some)
            }
            Err(ProxyError::NoContext { .. }) => {
                debug!("Initialization of {} received no host context", owner);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn owner(&self) -> OwnerKey {
        self.owner
    }

    pub fn context(&self) -> &Arc<dyn HostApplication> {
        &self.context
    }
}

impl Drop for HostApplicationAdapter {
    fn drop(&mut self) {
        self.context.release();
    }
}

impl ContextEntry for HostApplicationAdapter {}

impl Adapter for HostApplicationAdapter {
    type Interface = HostApplicationInterface;

    fn snapshot(&self) -> Result<HostApplicationSnapshot> {
        Ok(HostApplicationSnapshot::capture(
            self.context.as_ref(),
            self.owner.instance_id(),
        ))
    }

    fn handle(&self, request: HostApplicationRequest) -> Result<HostApplicationReply> {
        trace!("{}: {}", self.owner, request.method());
        let reply = match request {
            HostApplicationRequest::CreateInstance { cid, iid } => {
                let mut instance = None;
                let result = self.context.create_instance(&cid, &iid, &mut instance);
                HostApplicationReply::CreateInstance { result, instance }
            }
            HostApplicationRequest::IsPlugInterfaceSupported { iid } => {
                let result = match self.context.plug_interface_support() {
                    Some(support) => support.is_plug_interface_supported(&iid),
                    None => TResult::NOT_IMPLEMENTED,
                };
                HostApplicationReply::IsPlugInterfaceSupported { result }
            }
        };
        Ok(reply)
    }
}
