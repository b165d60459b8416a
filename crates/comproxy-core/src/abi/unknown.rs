//! Identity and lifetime: `FUnknown`, reference counts and capability sets.
//!
//! A proxy does not inherit from every interface it implements. Instead it
//! declares an [`InterfaceSet`] and resolves `query_interface` through the
//! [`INTERFACE_TABLE`], which maps interface identifiers to capabilities.

use super::tresult::TResult;
use super::tuid::{Tuid, FUNKNOWN_IID, IHOST_APPLICATION_IID, IPLUG_INTERFACE_SUPPORT_IID};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

bitflags! {
    /// Set of interface contracts an object answers `query_interface` for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct InterfaceSet: u32 {
        const UNKNOWN = 1 << 0;
        const HOST_APPLICATION = 1 << 1;
        const PLUG_INTERFACE_SUPPORT = 1 << 2;
    }
}

impl Default for InterfaceSet {
    fn default() -> Self {
        InterfaceSet::empty()
    }
}

/// One row of the interface dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceEntry {
    pub iid: Tuid,
    pub capability: InterfaceSet,
    pub name: &'static str,
}

/// Every interface contract known to this crate.
pub const INTERFACE_TABLE: &[InterfaceEntry] = &[
    InterfaceEntry {
        iid: FUNKNOWN_IID,
        capability: InterfaceSet::UNKNOWN,
        name: "FUnknown",
    },
    InterfaceEntry {
        iid: IHOST_APPLICATION_IID,
        capability: InterfaceSet::HOST_APPLICATION,
        name: "IHostApplication",
    },
    InterfaceEntry {
        iid: IPLUG_INTERFACE_SUPPORT_IID,
        capability: InterfaceSet::PLUG_INTERFACE_SUPPORT,
        name: "IPlugInterfaceSupport",
    },
];

impl InterfaceSet {
    /// Look up the table entry for an interface identifier.
    pub fn entry_for(iid: &Tuid) -> Option<&'static InterfaceEntry> {
        INTERFACE_TABLE.iter().find(|entry| entry.iid == *iid)
    }

    /// Resolve a `query_interface` request against this set.
    ///
    /// Returns the matched capability, or `kNoInterface` when the identifier
    /// is unknown or not part of the set.
    pub fn resolve(self, iid: &Tuid) -> Result<InterfaceSet, TResult> {
        match Self::entry_for(iid) {
            Some(entry) if self.contains(entry.capability) => Ok(entry.capability),
            _ => Err(TResult::NO_INTERFACE),
        }
    }

    /// Interface names in this set, in table order.
    pub fn names(self) -> Vec<&'static str> {
        INTERFACE_TABLE
            .iter()
            .filter(|entry| self.contains(entry.capability))
            .map(|entry| entry.name)
            .collect()
    }
}

/// The reference-counted base contract of every interface.
pub trait FUnknown: Send + Sync {
    /// Ask for another interface on the same object.
    ///
    /// On success the object has been acquired once more on behalf of the
    /// caller, who must balance it with [`FUnknown::release`].
    fn query_interface(&self, iid: &Tuid) -> Result<InterfaceSet, TResult>;

    /// Acquire a reference. Returns the new count.
    fn add_ref(&self) -> u32;

    /// Release a reference. Returns the new count; the object is destroyed
    /// when this reaches zero.
    fn release(&self) -> u32;
}

/// Atomic reference counter with explicit release-at-zero.
///
/// Counters start at one, the reference held by whoever created the object.
#[derive(Debug)]
pub struct RefCount(AtomicU32);

impl RefCount {
    pub fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub fn acquire(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the counter.
    ///
    /// Returns `Some(remaining)`; exactly one caller observes `Some(0)`.
    /// Releasing an object whose count is already zero returns `None`.
    pub fn release(&self) -> Option<u32> {
        match self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            }) {
            Ok(previous) => Some(previous - 1),
            Err(_) => {
                warn!("release() called on an object with no outstanding references");
                None
            }
        }
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}
