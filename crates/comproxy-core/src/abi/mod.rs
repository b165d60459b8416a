//! The externally fixed interface ABI that proxies must reproduce.
//!
//! These are the types a plugin sees when it talks to a host context: COM
//! compatible result codes, 16-byte interface identifiers, fixed-size UTF-16
//! string buffers and the reference-counted `FUnknown` base contract.
//!
//! - [`TResult`]: result codes (`kResultOk`, `kNoInterface`, ...)
//! - [`Tuid`]: interface and class identifiers
//! - [`String128`]: the fixed 128 unit output buffer used by name getters
//! - [`FUnknown`], [`RefCount`], [`InterfaceSet`]: identity and lifetime

pub mod interfaces;
pub mod string128;
pub mod tresult;
pub mod tuid;
pub mod unknown;

pub use interfaces::{HostApplication, ObjectHandle, PlugInterfaceSupport};
pub use string128::{read_string128, write_string128, String128, STRING128_LEN};
pub use tresult::TResult;
pub use tuid::{
    Tuid, FUNKNOWN_IID, IATTRIBUTE_LIST_IID, IHOST_APPLICATION_IID, IMESSAGE_IID,
    IPLUG_INTERFACE_SUPPORT_IID,
};
pub use unknown::{FUnknown, InterfaceEntry, InterfaceSet, RefCount, INTERFACE_TABLE};
