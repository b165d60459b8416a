//! Host context interfaces.

use super::string128::String128;
use super::tresult::TResult;
use super::tuid::Tuid;
use super::unknown::FUnknown;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an object created by the real host.
///
/// The object itself stays in the host's process; only this identifier
/// crosses the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// `IHostApplication`: the host context handed to plugins on initialization.
pub trait HostApplication: FUnknown {
    /// Write the host's name into a caller-supplied buffer.
    fn get_name(&self, name: &mut String128) -> TResult;

    /// Create a host object of class `cid`, returned as interface `iid`.
    fn create_instance(&self, cid: &Tuid, iid: &Tuid, obj: &mut Option<ObjectHandle>) -> TResult;

    /// The `IPlugInterfaceSupport` view of this object, if it implements one.
    fn plug_interface_support(&self) -> Option<&dyn PlugInterfaceSupport> {
        None
    }
}

/// `IPlugInterfaceSupport`: lets a plugin ask which of its interfaces the host uses.
pub trait PlugInterfaceSupport: FUnknown {
    fn is_plug_interface_supported(&self, iid: &Tuid) -> TResult;
}
