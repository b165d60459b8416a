//! Identity and lifetime registry for proxied contexts.
//!
//! A host context has no construct or destruct message of its own. It is
//! created when a genuine context pointer is first passed into an owner's
//! initialization, and it is destroyed as part of that owner's teardown. This
//! module tracks that relationship per owner:
//!
//! ```text
//! Uninitialized ──activate──▶ Active ──teardown──▶ Destroyed
//! ```
//!
//! An owner that never receives a genuine context stays `Uninitialized` and
//! never gets an entry, even after its own teardown.

pub mod context_registry;

pub use context_registry::{ContextEntry, ContextRegistry, ContextState, OwnerBinding, OwnerKey};
