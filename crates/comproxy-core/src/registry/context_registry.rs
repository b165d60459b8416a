//! Owner-keyed registry of active context entries.

use crate::codec::{CodecError, Decode, Encode, Reader, Writer};
use crate::config::RegistryConfig;
use crate::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

/// Identity of the object a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OwnerKey {
    /// The ownerless context, e.g. the one passed to a plugin factory.
    Global,
    /// The context passed to the object instance with this id.
    Instance(u64),
}

impl OwnerKey {
    pub fn from_instance_id(id: Option<u64>) -> Self {
        match id {
            Some(id) => OwnerKey::Instance(id),
            None => OwnerKey::Global,
        }
    }

    pub fn instance_id(self) -> Option<u64> {
        match self {
            OwnerKey::Global => None,
            OwnerKey::Instance(id) => Some(id),
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Global => write!(f, "the global context"),
            OwnerKey::Instance(id) => write!(f, "instance {}", id),
        }
    }
}

impl Encode for OwnerKey {
    fn encode(&self, w: &mut Writer) -> std::result::Result<(), CodecError> {
        w.put_optional(&self.instance_id(), |w, id| id.encode(w))
    }
}

impl Decode for OwnerKey {
    fn decode(r: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(OwnerKey::from_instance_id(r.get_optional(u64::decode)?))
    }
}

/// Lifecycle state of one owner key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    /// No genuine context has been observed for this owner.
    Uninitialized,
    /// A context entry exists and may be used.
    Active,
    /// The owner had a context and has been torn down. Terminal while the
    /// registry still remembers the owner.
    Destroyed,
}

/// Something that can live in a [`ContextRegistry`].
pub trait ContextEntry: Send + Sync + 'static {
    /// Called exactly once when the owner's teardown prunes this entry.
    fn retire(&self) {}
}

/// Owners that have been torn down, oldest first, capped at `limit`.
struct Tombstones {
    order: VecDeque<OwnerKey>,
    members: HashSet<OwnerKey>,
    limit: usize,
}

impl Tombstones {
    fn new(limit: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            limit,
        }
    }

    fn contains(&self, owner: &OwnerKey) -> bool {
        self.members.contains(owner)
    }

    /// Record `owner`, returning the tombstone evicted to stay under the limit.
    fn insert(&mut self, owner: OwnerKey) -> Option<OwnerKey> {
        if self.limit == 0 || !self.members.insert(owner) {
            return None;
        }
        self.order.push_back(owner);
        if self.order.len() > self.limit {
            let evicted = self.order.pop_front()?;
            self.members.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

struct RegistryInner<T> {
    active: HashMap<OwnerKey, Arc<T>>,
    destroyed: Tombstones,
}

/// Maps owner identities to at most one active entry each.
///
/// One registry exists per interface type, so an entry is effectively keyed by
/// (interface type, owner). Entries have no teardown protocol of their own:
/// they are pruned when the owner is torn down, either explicitly through
/// [`ContextRegistry::teardown`] or by dropping the owner's [`OwnerBinding`].
///
/// Torn-down owners are remembered so that late requests for them are told
/// the context was destroyed rather than never there. Only owners that were
/// actually active leave a tombstone, and at most
/// [`RegistryConfig::MAX_TOMBSTONES`] are kept. Instance ids are handed out
/// once and never reused, so a forgotten tombstone only changes which error a
/// stale request gets.
pub struct ContextRegistry<T> {
    label: &'static str,
    inner: Mutex<RegistryInner<T>>,
}

impl<T: ContextEntry> ContextRegistry<T> {
    pub fn new(label: &'static str) -> Self {
        Self::with_tombstone_limit(label, RegistryConfig::MAX_TOMBSTONES)
    }

    /// Registry that remembers at most `limit` torn-down owners.
    pub fn with_tombstone_limit(label: &'static str, limit: usize) -> Self {
        Self {
            label,
            inner: Mutex::new(RegistryInner {
                active: HashMap::new(),
                destroyed: Tombstones::new(limit),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner<T>> {
        // Entries are only inserted or removed under the lock, a panic
        // elsewhere cannot leave the maps half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================
    // Lifecycle transitions
    // ========================================

    /// `Uninitialized → Active`.
    pub fn activate(&self, owner: OwnerKey, entry: T) -> Result<Arc<T>> {
        let mut inner = self.lock();
        if inner.destroyed.contains(&owner) {
            warn!("{}: refusing to activate {} after teardown", self.label, owner);
            return Err(ProxyError::ContextDestroyed { owner });
        }
        if inner.active.contains_key(&owner) {
            return Err(ProxyError::AlreadyActive { owner });
        }

        let entry = Arc::new(entry);
        inner.active.insert(owner, entry.clone());
        debug!("{}: activated context for {}", self.label, owner);
        Ok(entry)
    }

    /// `Active → Destroyed`.
    ///
    /// Runs as part of the owner's own teardown. Returns the pruned entry. An
    /// owner that never had an entry stays `Uninitialized`.
    pub fn teardown(&self, owner: OwnerKey) -> Option<Arc<T>> {
        let (removed, evicted) = {
            let mut inner = self.lock();
            match inner.active.remove(&owner) {
                Some(entry) => {
                    let evicted = inner.destroyed.insert(owner);
                    (Some(entry), evicted)
                }
                None => (None, None),
            }
        };

        match &removed {
            Some(entry) => {
                entry.retire();
                debug!("{}: tore down context for {}", self.label, owner);
            }
            None => debug!("{}: nothing to tear down for {}", self.label, owner),
        }
        if let Some(evicted) = evicted {
            debug!("{}: forgot the tombstone for {}", self.label, evicted);
        }
        removed
    }

    /// Tie the entry for `owner` to the lifetime of the returned binding.
    pub fn bind(self: &Arc<Self>, owner: OwnerKey) -> OwnerBinding<T> {
        OwnerBinding {
            registry: Arc::downgrade(self),
            owner,
        }
    }

    // ========================================
    // Lookups
    // ========================================

    /// The active entry for `owner`. `None` means no context is available.
    pub fn lookup(&self, owner: OwnerKey) -> Option<Arc<T>> {
        self.lock().active.get(&owner).cloned()
    }

    /// The active entry for `owner`, or the reason there is none.
    pub fn require(&self, owner: OwnerKey) -> Result<Arc<T>> {
        let inner = self.lock();
        if let Some(entry) = inner.active.get(&owner) {
            return Ok(entry.clone());
        }
        if inner.destroyed.contains(&owner) {
            Err(ProxyError::ContextDestroyed { owner })
        } else {
            Err(ProxyError::NoContext { owner })
        }
    }

    pub fn state(&self, owner: OwnerKey) -> ContextState {
        let inner = self.lock();
        if inner.active.contains_key(&owner) {
            ContextState::Active
        } else if inner.destroyed.contains(&owner) {
            ContextState::Destroyed
        } else {
            ContextState::Uninitialized
        }
    }

    pub fn active_owners(&self) -> Vec<OwnerKey> {
        let mut owners: Vec<OwnerKey> = self.lock().active.keys().copied().collect();
        owners.sort();
        owners
    }

    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of torn-down owners currently remembered.
    pub fn tombstones(&self) -> usize {
        self.lock().destroyed.len()
    }
}

/// Non-owning back-reference from an owner to its context entry.
///
/// Owners keep this next to their own state. Dropping it runs the registry
/// teardown for the owner, so the context entry goes away exactly when the
/// owner does.
#[must_use = "dropping the binding immediately tears the context down"]
pub struct OwnerBinding<T: ContextEntry> {
    registry: Weak<ContextRegistry<T>>,
    owner: OwnerKey,
}

impl<T: ContextEntry> OwnerBinding<T> {
    pub fn owner(&self) -> OwnerKey {
        self.owner
    }
}

impl<T: ContextEntry> Drop for OwnerBinding<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.teardown(self.owner);
        }
    }
}
