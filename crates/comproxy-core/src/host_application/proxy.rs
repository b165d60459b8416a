//! Near-side stand-in for a host context.

use super::{HostApplicationInterface, HostApplicationReply, HostApplicationRequest, HostApplicationSnapshot};
use crate::abi::{
    write_string128, FUnknown, HostApplication, InterfaceSet, ObjectHandle, PlugInterfaceSupport, RefCount,
    String128, TResult, Tuid,
};
use crate::interface::{Proxy, Snapshot};
use crate::ipc::Forwarder;
use crate::registry::{ContextEntry, OwnerKey};
use crate::{ProxyError, Result};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, error};

/// Proxy for `IHostApplication` (and `IPlugInterfaceSupport` when the
/// genuine object implements it).
///
/// Identity methods and `get_name` are answered from the snapshot. The other
/// methods are forwarded over the channel and return exactly what the genuine
/// method returned.
pub struct HostApplicationProxy {
    snapshot: HostApplicationSnapshot,
    owner: OwnerKey,
    forwarder: RwLock<Option<Forwarder>>,
    refs: RefCount,
}

impl HostApplicationProxy {
    pub fn snapshot(&self) -> &HostApplicationSnapshot {
        &self.snapshot
    }

    pub fn owner(&self) -> OwnerKey {
        self.owner
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.get()
    }

    /// Whether this proxy still forwards calls.
    pub fn is_connected(&self) -> bool {
        self.forwarder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn forward(&self, request: HostApplicationRequest) -> Result<HostApplicationReply> {
        // Cloned so the lock is not held across the round trip
        let forwarder = self
            .forwarder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ProxyError::Released { owner: self.owner })?;
        forwarder.call::<HostApplicationInterface>(&request)
    }

    fn detach(&self) {
        let previous = self
            .forwarder
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            debug!("Host context proxy for {} destroyed", self.owner);
        }
    }
}

impl Proxy for HostApplicationProxy {
    type Interface = HostApplicationInterface;

    fn from_snapshot(snapshot: HostApplicationSnapshot, forwarder: Forwarder) -> Self {
        Self {
            owner: snapshot.owner(),
            snapshot,
            forwarder: RwLock::new(Some(forwarder)),
            refs: RefCount::new(),
        }
    }
}

impl ContextEntry for HostApplicationProxy {
    /// The owner's teardown drops the reference the owner was handed.
    fn retire(&self) {
        self.release();
    }
}

impl FUnknown for HostApplicationProxy {
    fn query_interface(&self, iid: &Tuid) -> std::result::Result<InterfaceSet, TResult> {
        let capability = self.snapshot.interfaces.resolve(iid)?;
        self.add_ref();
        Ok(capability)
    }

    fn add_ref(&self) -> u32 {
        self.refs.acquire()
    }

    fn release(&self) -> u32 {
        match self.refs.release() {
            Some(0) => {
                self.detach();
                0
            }
            Some(remaining) => remaining,
            None => 0,
        }
    }
}

impl HostApplication for HostApplicationProxy {
    fn get_name(&self, name: &mut String128) -> TResult {
        match &self.snapshot.name {
            Some(value) => {
                let units: Vec<u16> = value.encode_utf16().collect();
                write_string128(name, &units);
                TResult::OK
            }
            None => TResult::NOT_IMPLEMENTED,
        }
    }

    fn create_instance(&self, cid: &Tuid, iid: &Tuid, obj: &mut Option<ObjectHandle>) -> TResult {
        let request = HostApplicationRequest::CreateInstance { cid: *cid, iid: *iid };
        match self.forward(request) {
            Ok(HostApplicationReply::CreateInstance { result, instance }) => {
                *obj = instance;
                result
            }
            Ok(other) => {
                error!("create_instance() for {} got mismatched reply {:?}", self.owner, other);
                *obj = None;
                ProxyError::UnexpectedReply {
                    request: "create_instance",
                }
                .to_tresult()
            }
            Err(e) => {
                error!("create_instance() for {} failed: {}", self.owner, e);
                *obj = None;
                e.to_tresult()
            }
        }
    }

    fn plug_interface_support(&self) -> Option<&dyn PlugInterfaceSupport> {
        if self
            .snapshot
            .interfaces
            .contains(InterfaceSet::PLUG_INTERFACE_SUPPORT)
        {
            Some(self)
        } else {
            None
        }
    }
}

impl PlugInterfaceSupport for HostApplicationProxy {
    fn is_plug_interface_supported(&self, iid: &Tuid) -> TResult {
        let request = HostApplicationRequest::IsPlugInterfaceSupported { iid: *iid };
        match self.forward(request) {
            Ok(HostApplicationReply::IsPlugInterfaceSupported { result }) => result,
            Ok(other) => {
                error!(
                    "is_plug_interface_supported() for {} got mismatched reply {:?}",
                    self.owner, other
                );
                ProxyError::UnexpectedReply {
                    request: "is_plug_interface_supported",
                }
                .to_tresult()
            }
            Err(e) => {
                error!("is_plug_interface_supported() for {} failed: {}", self.owner, e);
                e.to_tresult()
            }
        }
    }
}
