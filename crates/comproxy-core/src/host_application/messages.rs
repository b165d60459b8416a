//! Forwarded calls of the host context and their replies.

use crate::abi::{ObjectHandle, TResult, Tuid};
use crate::codec::{CodecError, Decode, Encode, Reader, Writer};

const CREATE_INSTANCE: u8 = 0;
const IS_PLUG_INTERFACE_SUPPORTED: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostApplicationRequest {
    CreateInstance { cid: Tuid, iid: Tuid },
    IsPlugInterfaceSupported { iid: Tuid },
}

impl HostApplicationRequest {
    pub fn method(&self) -> &'static str {
        match self {
            HostApplicationRequest::CreateInstance { .. } => "create_instance",
            HostApplicationRequest::IsPlugInterfaceSupported { .. } => "is_plug_interface_supported",
        }
    }
}

/// Result code plus out-parameters, exactly as the genuine method produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostApplicationReply {
    CreateInstance {
        result: TResult,
        instance: Option<ObjectHandle>,
    },
    IsPlugInterfaceSupported {
        result: TResult,
    },
}

impl Encode for HostApplicationRequest {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        match self {
            HostApplicationRequest::CreateInstance { cid, iid } => {
                w.put_u8(CREATE_INSTANCE);
                cid.encode(w)?;
                iid.encode(w)
            }
            HostApplicationRequest::IsPlugInterfaceSupported { iid } => {
                w.put_u8(IS_PLUG_INTERFACE_SUPPORTED);
                iid.encode(w)
            }
        }
    }
}

impl Decode for HostApplicationRequest {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.get_u8()? {
            CREATE_INSTANCE => Ok(HostApplicationRequest::CreateInstance {
                cid: Tuid::decode(r)?,
                iid: Tuid::decode(r)?,
            }),
            IS_PLUG_INTERFACE_SUPPORTED => Ok(HostApplicationRequest::IsPlugInterfaceSupported {
                iid: Tuid::decode(r)?,
            }),
            other => Err(CodecError::InvalidValue {
                field: "request",
                value: other as u64,
            }),
        }
    }
}

impl Encode for HostApplicationReply {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        match self {
            HostApplicationReply::CreateInstance { result, instance } => {
                w.put_u8(CREATE_INSTANCE);
                w.put_i32(result.0);
                w.put_optional(instance, |w, handle| handle.0.encode(w))
            }
            HostApplicationReply::IsPlugInterfaceSupported { result } => {
                w.put_u8(IS_PLUG_INTERFACE_SUPPORTED);
                w.put_i32(result.0);
                Ok(())
            }
        }
    }
}

impl Decode for HostApplicationReply {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.get_u8()? {
            CREATE_INSTANCE => Ok(HostApplicationReply::CreateInstance {
                result: TResult(r.get_i32()?),
                instance: r.get_optional(|r| r.get_u64().map(ObjectHandle))?,
            }),
            IS_PLUG_INTERFACE_SUPPORTED => Ok(HostApplicationReply::IsPlugInterfaceSupported {
                result: TResult(r.get_i32()?),
            }),
            other => Err(CodecError::InvalidValue {
                field: "reply",
                value: other as u64,
            }),
        }
    }
}
