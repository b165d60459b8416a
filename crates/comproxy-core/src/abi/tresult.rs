//! COM compatible result codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `tresult` as returned by every interface method.
///
/// Values follow the COM compatible layout used on Windows, which is the side
/// of the bridge where proxies are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TResult(pub i32);

impl TResult {
    pub const OK: TResult = TResult(0);
    pub const TRUE: TResult = TResult::OK;
    pub const FALSE: TResult = TResult(1);
    pub const NO_INTERFACE: TResult = TResult(0x8000_4002_u32 as i32);
    pub const INVALID_ARGUMENT: TResult = TResult(0x8007_0057_u32 as i32);
    pub const NOT_IMPLEMENTED: TResult = TResult(0x8000_4001_u32 as i32);
    pub const INTERNAL_ERROR: TResult = TResult(0x8000_4005_u32 as i32);
    pub const NOT_INITIALIZED: TResult = TResult(0x8000_FFFF_u32 as i32);
    pub const OUT_OF_MEMORY: TResult = TResult(0x8007_000E_u32 as i32);

    pub fn is_ok(self) -> bool {
        self == TResult::OK
    }

    /// Symbolic name for known codes.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            TResult::OK => "kResultOk",
            TResult::FALSE => "kResultFalse",
            TResult::NO_INTERFACE => "kNoInterface",
            TResult::INVALID_ARGUMENT => "kInvalidArgument",
            TResult::NOT_IMPLEMENTED => "kNotImplemented",
            TResult::INTERNAL_ERROR => "kInternalError",
            TResult::NOT_INITIALIZED => "kNotInitialized",
            TResult::OUT_OF_MEMORY => "kOutOfMemory",
            _ => return None,
        })
    }
}

impl fmt::Display for TResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#010x}", self.0 as u32),
        }
    }
}
