//! Comproxy Core - snapshot-backed proxies for COM-style interfaces.
//!
//! A plugin bridge hands plugins objects that really live in another
//! process. For each such interface this crate provides a proxy that answers
//! pure queries from a snapshot captured when the object was handed over,
//! forwards every other call over a synchronous channel, and an adapter on
//! the far side that services those calls against the genuine object.
//!
//! Proxies and adapters are tracked per owner in a [`registry::ContextRegistry`],
//! so a context lives exactly as long as the plugin instance it was given to.
//!
//! # Example
//!
//! ```rust,ignore
//! use comproxy_core::host_application::{
//!     BasicHostApplication, HostApplicationAdapter, HostApplicationProxy,
//! };
//! use comproxy_core::ipc::{AdapterHost, ContextClient, LoopbackChannel};
//! use comproxy_core::registry::{ContextRegistry, OwnerKey};
//! use std::sync::Arc;
//!
//! let adapters = Arc::new(ContextRegistry::new("host context adapters"));
//! HostApplicationAdapter::observe(
//!     &adapters,
//!     OwnerKey::Instance(42),
//!     Some(Arc::new(BasicHostApplication::new("MyHost"))),
//! )?;
//!
//! let mut host = AdapterHost::new();
//! host.register(adapters);
//! let client = ContextClient::new(Arc::new(LoopbackChannel::new(Arc::new(host))));
//!
//! let proxies = ContextRegistry::<HostApplicationProxy>::new("host context proxies");
//! let proxy = client.attach(&proxies, OwnerKey::Instance(42))?;
//! ```

pub mod abi;
pub mod codec;
pub mod config;
pub mod error;
pub mod host_application;
pub mod interface;
pub mod ipc;
pub mod registry;

// Re-export commonly used types
pub use abi::{FUnknown, HostApplication, InterfaceSet, ObjectHandle, PlugInterfaceSupport, TResult, Tuid};
pub use codec::CodecError;
pub use config::{ChannelConfig, HostConfig, RegistryConfig};
pub use error::{ProxyError, Result};
pub use host_application::{
    BasicHostApplication, HostApplicationAdapter, HostApplicationProxy, HostApplicationSnapshot,
};
pub use interface::{Adapter, InterfaceTag, ProxiedInterface, Proxy, Snapshot};
pub use ipc::{AdapterHost, Channel, ContextClient, Forwarder, LoopbackChannel, TcpChannel};
pub use registry::{ContextRegistry, ContextState, OwnerBinding, OwnerKey};
