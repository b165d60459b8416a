//! 16-byte interface and class identifiers.

use crate::codec::{CodecError, Decode, Encode, Reader, Writer};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An interface or class identifier (`TUID`).
///
/// Identifiers are declared as four 32-bit words. The in-memory byte order is
/// the COM compatible GUID layout: the first word and the two halves of the
/// second word are little-endian, the last two words are big-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Tuid(pub [u8; 16]);

pub const FUNKNOWN_IID: Tuid = Tuid::from_parts(0x0000_0000, 0x0000_0000, 0xC000_0000, 0x0000_0046);
pub const IHOST_APPLICATION_IID: Tuid =
    Tuid::from_parts(0x58E5_95CC, 0xDB2D_4969, 0x8B6A_AF8C, 0x36A6_64E5);
pub const IPLUG_INTERFACE_SUPPORT_IID: Tuid =
    Tuid::from_parts(0x4FB5_8B9E, 0x9EAA_4E0F, 0xAB36_1C1C, 0xCCB5_6FEA);
pub const IMESSAGE_IID: Tuid = Tuid::from_parts(0x936F_033B, 0xC6C0_47DB, 0xBB08_82F8, 0x13C1_E613);
pub const IATTRIBUTE_LIST_IID: Tuid =
    Tuid::from_parts(0x1E5F_0AEB, 0xCC7F_4533, 0xA254_4011, 0x38AD_5EE4);

impl Tuid {
    pub const fn from_parts(l1: u32, l2: u32, l3: u32, l4: u32) -> Self {
        let a = l1.to_le_bytes();
        let c = l3.to_be_bytes();
        let d = l4.to_be_bytes();
        Tuid([
            a[0],
            a[1],
            a[2],
            a[3],
            (l2 >> 16) as u8,
            (l2 >> 24) as u8,
            l2 as u8,
            (l2 >> 8) as u8,
            c[0],
            c[1],
            c[2],
            c[3],
            d[0],
            d[1],
            d[2],
            d[3],
        ])
    }

    pub fn to_parts(&self) -> (u32, u32, u32, u32) {
        let b = &self.0;
        let l1 = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let l2 = (b[4] as u32) << 16 | (b[5] as u32) << 24 | b[6] as u32 | (b[7] as u32) << 8;
        let l3 = u32::from_be_bytes([b[8], b[9], b[10], b[11]]);
        let l4 = u32::from_be_bytes([b[12], b[13], b[14], b[15]]);
        (l1, l2, l3, l4)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (l1, l2, l3, l4) = self.to_parts();
        write!(f, "{:08X}-{:08X}-{:08X}-{:08X}", l1, l2, l3, l4)
    }
}

impl fmt::Debug for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuid({})", self)
    }
}

/// Error returned when parsing a [`Tuid`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid interface identifier '{0}': expected 32 hex digits")]
pub struct ParseTuidError(pub String);

impl FromStr for Tuid {
    type Err = ParseTuidError;

    /// Accepts 32 hex digits in declaration order, with or without dashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != '-').collect();
        if digits.len() != 32 {
            return Err(ParseTuidError(s.to_string()));
        }
        let bytes = hex::decode(&digits).map_err(|_| ParseTuidError(s.to_string()))?;
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Ok(Tuid::from_parts(word(0), word(4), word(8), word(12)))
    }
}

impl Serialize for Tuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Encode for Tuid {
    fn encode(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.put_raw(&self.0);
        Ok(())
    }
}

impl Decode for Tuid {
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(r.get_raw(16)?);
        Ok(Tuid(bytes))
    }
}
