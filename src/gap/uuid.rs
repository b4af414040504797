#![allow(clippy::use_self)]

use std::fmt::{Debug, Display, Formatter};

use structbuf::Unpack;

const SHIFT: u32 = u128::BITS - u32::BITS;
const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;
const MASK_16: u128 = !((u16::MAX as u128) << SHIFT);

/// Attribute type identifier in 16-bit short form or 128-bit long form
/// ([Vol 3] Part B, Section 2.5.1). The two forms are never normalized into
/// each other; a long UUID that happens to lie on the Bluetooth base UUID
/// remains long.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub enum Uuid {
    /// Assigned 16-bit Bluetooth SIG UUID.
    Short(u16),
    /// Full 128-bit UUID.
    Long(u128),
}

impl Uuid {
    /// Creates a long UUID from little-endian bytes, as carried in ATT PDUs.
    #[inline]
    #[must_use]
    pub const fn from_le_bytes(b: [u8; 16]) -> Self {
        Self::Long(u128::from_le_bytes(b))
    }

    /// Returns whether the UUID uses the long form.
    #[inline]
    #[must_use]
    pub const fn is_long(self) -> bool {
        matches!(self, Self::Long(_))
    }

    /// Returns the 16-bit alias of the UUID. For short UUIDs this is the UUID
    /// itself. For long UUIDs it is the 16 bits at the position that the
    /// Bluetooth base UUID reserves for the alias.
    #[inline]
    #[must_use]
    pub const fn short(self) -> u16 {
        match self {
            Self::Short(v) => v,
            #[allow(clippy::cast_possible_truncation)]
            Self::Long(v) => (v >> SHIFT) as u16,
        }
    }

    /// Returns the 16-bit SIG UUID if `self` is short or a long UUID derived
    /// from the Bluetooth base UUID.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> Option<u16> {
        match self {
            Self::Short(v) => Some(v),
            Self::Long(v) if v & MASK_16 == BASE => Some(self.short()),
            Self::Long(_) => None,
        }
    }

    /// Returns the full 128-bit representation.
    #[inline]
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        match self {
            Self::Short(v) => (v as u128) << SHIFT | BASE,
            Self::Long(v) => v,
        }
    }

    /// Returns the long form as little-endian bytes or `None` for short UUIDs.
    #[inline]
    #[must_use]
    pub const fn long_bytes(self) -> Option<[u8; 16]> {
        match self {
            Self::Short(_) => None,
            Self::Long(v) => Some(v.to_le_bytes()),
        }
    }
}

impl Default for Uuid {
    /// Returns the short UUID 0, used by characteristics that have not been
    /// discovered yet.
    #[inline]
    fn default() -> Self {
        Self::Short(0)
    }
}

impl From<u16> for Uuid {
    #[inline]
    fn from(v: u16) -> Self {
        Self::Short(v)
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = ();

    #[inline]
    fn try_from(v: &[u8]) -> Result<Self, Self::Error> {
        match v.len() {
            2 => Ok(Self::Short(v.unpack().u16())),
            16 => Ok(Self::Long(v.unpack().u128())),
            _ => Err(()),
        }
    }
}

impl Debug for Uuid {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Short(v) => write!(f, "{v:#06X}"),
            Self::Long(v) => write!(
                f,
                "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
                (v >> 96) as u32,
                (v >> 80) as u16,
                (v >> 64) as u16,
                (v >> 48) as u16,
                (v & ((1 << 48) - 1)) as u64
            ),
        }
    }
}

impl Display for Uuid {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}
