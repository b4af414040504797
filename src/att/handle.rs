use std::fmt::{Debug, Formatter};

use crate::util::name_of;

/// Attribute handle ([Vol 3] Part F, Section 3.2.2). Handle `0x0000` is
/// reserved and used as the "unassigned" sentinel.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Handle(u16);

impl Handle {
    /// Reserved handle that never identifies an attribute.
    pub const INVALID: Self = Self(0x0000);
    /// Lowest valid handle.
    pub const MIN: Self = Self(0x0001);
    /// Highest valid handle.
    pub const MAX: Self = Self(0xFFFF);

    /// Wraps a raw handle.
    #[inline(always)]
    #[must_use]
    pub const fn new(h: u16) -> Self {
        Self(h)
    }

    /// Returns whether the handle is assigned.
    #[inline(always)]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl Debug for Handle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", name_of!(Handle), self.0)
    }
}

crate::util::impl_display_via_debug! { Handle }

impl From<Handle> for u16 {
    #[inline]
    fn from(h: Handle) -> Self {
        h.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle() {
        assert_eq!(std::mem::size_of::<Handle>(), 2);
        assert_eq!(Handle::default(), Handle::INVALID);
        assert!(!Handle::INVALID.is_valid());
        assert!(Handle::MIN.is_valid() && Handle::MAX.is_valid());
        assert_eq!(u16::from(Handle::new(0x2A)), 0x2A);
        assert_eq!(format!("{}", Handle::new(0x2A)), "Handle(0x002A)");
    }
}
