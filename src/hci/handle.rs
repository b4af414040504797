use std::fmt::{Debug, Formatter};
use std::num::NonZeroU16;

use crate::util::name_of;

/// Connection handle ([Vol 4] Part E, Section 5.4.2). The controller assigns
/// it in the LE Connection Complete event. The HCI transport passes it to
/// [`crate::gatt::ProcGate::connect`] and tags every later ATT PDU and
/// transmit report for that link with it.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConnHandle(NonZeroU16);

impl ConnHandle {
    /// Number of meaningful bits.
    pub const BITS: u16 = 12;
    /// Maximum valid connection handle.
    pub const MAX: u16 = 0xEFF;

    /// Wraps a raw connection handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub fn new(mut v: u16) -> Option<Self> {
        v &= (1 << Self::BITS) - 1;
        // SAFETY: v can't be 0xFFFF, so !v is never 0
        (v <= Self::MAX).then_some(Self(unsafe { NonZeroU16::new_unchecked(!v) }))
    }
}

impl From<ConnHandle> for u16 {
    #[inline]
    fn from(cn: ConnHandle) -> Self {
        !cn.0.get()
    }
}

impl Debug for ConnHandle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#05X})", name_of!(ConnHandle), u16::from(*self))
    }
}

crate::util::impl_display_via_debug! { ConnHandle }
