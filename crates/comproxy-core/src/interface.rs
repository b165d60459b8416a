//! The contract every proxied interface instantiates.
//!
//! A proxied interface is described by three wire types: the snapshot that
//! seeds a proxy, the requests a proxy forwards and the replies it gets back.
//! The near side implements [`Proxy`] and the far side implements [`Adapter`];
//! everything in between (envelopes, routing, registries) is generic.

use crate::codec::{Decode, Encode};
use crate::ipc::Forwarder;
use crate::registry::{ContextEntry, OwnerKey};
use crate::Result;
use std::fmt;

/// Wire tag identifying an interface in request envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceTag(pub u16);

impl fmt::Display for InterfaceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Immutable capture of an interface's locally answerable state.
pub trait Snapshot: Encode + Decode + Clone + Send + Sync + 'static {
    /// The owner this snapshot was captured for.
    fn owner(&self) -> OwnerKey;
}

/// Static description of one proxied interface.
pub trait ProxiedInterface: Send + Sync + 'static {
    const TAG: InterfaceTag;
    const NAME: &'static str;

    type Snapshot: Snapshot;
    type Request: Encode + Decode + fmt::Debug + Send;
    type Reply: Encode + Decode + fmt::Debug + Send;
}

/// Near-side stand-in built from a snapshot.
pub trait Proxy: ContextEntry + Sized {
    type Interface: ProxiedInterface;

    fn from_snapshot(
        snapshot: <Self::Interface as ProxiedInterface>::Snapshot,
        forwarder: Forwarder,
    ) -> Self;
}

/// Far-side wrapper around a genuine interface pointer.
pub trait Adapter: ContextEntry {
    type Interface: ProxiedInterface;

    /// Capture a snapshot for a proxy that is about to be instantiated.
    fn snapshot(&self) -> Result<<Self::Interface as ProxiedInterface>::Snapshot>;

    /// Invoke the real method a proxy forwarded.
    fn handle(
        &self,
        request: <Self::Interface as ProxiedInterface>::Request,
    ) -> Result<<Self::Interface as ProxiedInterface>::Reply>;
}
