//! `IHostApplication`, the host context every plugin receives on
//! initialization.
//!
//! The near side gets a [`HostApplicationProxy`] built from a
//! [`HostApplicationSnapshot`]. It answers `get_name` and `query_interface`
//! locally and forwards `create_instance` and `is_plug_interface_supported`
//! to the [`HostApplicationAdapter`] wrapping the genuine context.

mod adapter;
mod basic;
mod messages;
mod proxy;
mod snapshot;

pub use adapter::HostApplicationAdapter;
pub use basic::BasicHostApplication;
pub use messages::{HostApplicationReply, HostApplicationRequest};
pub use proxy::HostApplicationProxy;
pub use snapshot::HostApplicationSnapshot;

use crate::interface::{InterfaceTag, ProxiedInterface};

/// Wire description of the host context interface.
pub struct HostApplicationInterface;

impl ProxiedInterface for HostApplicationInterface {
    const TAG: InterfaceTag = InterfaceTag(0x0100);
    const NAME: &'static str = "IHostApplication";

    type Snapshot = HostApplicationSnapshot;
    type Request = HostApplicationRequest;
    type Reply = HostApplicationReply;
}
