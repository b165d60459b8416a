//! Construction snapshot of a host context.

use crate::abi::{
    read_string128, HostApplication, InterfaceSet, String128, TResult, IPLUG_INTERFACE_SUPPORT_IID,
    STRING128_LEN,
};
use crate::codec::{CodecError, Decode, Encode, Reader, Writer};
use crate::interface::Snapshot;
use crate::registry::OwnerKey;
use serde::Serialize;
use tracing::debug;

/// Everything a host context proxy can answer without a round trip.
///
/// The default value means "nothing captured yet" and has an empty
/// interface set; a snapshot captured from a genuine object always lists
/// `FUnknown` and `IHostApplication`, even when its name is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostApplicationSnapshot {
    /// The plugin instance this context was handed to, or `None` for the
    /// global context.
    pub owner_instance_id: Option<u64>,
    /// Result of `get_name`, if the genuine object answered it.
    pub name: Option<String>,
    pub interfaces: InterfaceSet,
}

impl HostApplicationSnapshot {
    /// Capture a snapshot from a genuine host context.
    ///
    /// Only pure getters are called: `get_name`, and `query_interface` for
    /// each optional interface followed by the matching `release`.
    pub fn capture(context: &dyn HostApplication, owner_instance_id: Option<u64>) -> Self {
        let mut buffer: String128 = [0; STRING128_LEN];
        let result = context.get_name(&mut buffer);
        let name = if result == TResult::OK {
            Some(read_string128(&buffer))
        } else {
            debug!("get_name() returned {}, capturing no name", result);
            None
        };

        let mut interfaces = InterfaceSet::UNKNOWN | InterfaceSet::HOST_APPLICATION;
        if context.query_interface(&IPLUG_INTERFACE_SUPPORT_IID).is_ok() {
            interfaces |= InterfaceSet::PLUG_INTERFACE_SUPPORT;
            context.release();
        }

        Self {
            owner_instance_id,
            name,
            interfaces,
        }
    }

    /// Whether this snapshot was captured from a genuine object.
    pub fn is_captured(&self) -> bool {
        self.interfaces.contains(InterfaceSet::UNKNOWN)
    }
}

impl Snapshot for HostApplicationSnapshot {
    fn owner(&self) -> OwnerKey {
        OwnerKey::from_instance_id(self.owner_instance_id)
    }
}

impl Encode for HostApplicationSnapshot {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.put_optional(&self.owner_instance_id, |w, id| id.encode(w))?;
        w.put_optional(&self.name, |w, name| w.put_text(name, STRING128_LEN))?;
        w.put_u32(self.interfaces.bits());
        Ok(())
    }
}

impl Decode for HostApplicationSnapshot {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let owner_instance_id = r.get_optional(u64::decode)?;
        let name = r.get_optional(|r| r.get_text(STRING128_LEN))?;
        let bits = r.get_u32()?;
        let interfaces = InterfaceSet::from_bits(bits).ok_or(CodecError::InvalidValue {
            field: "interfaces",
            value: bits as u64,
        })?;

        Ok(Self {
            owner_instance_id,
            name,
            interfaces,
        })
    }
}
