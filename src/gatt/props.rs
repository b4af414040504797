use std::fmt::{Debug, Formatter};

use crate::util::name_of;

bitflags::bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    struct Prop: u8 {
        /// Permits broadcasts of the Characteristic Value using Server
        /// Characteristic Configuration Descriptor.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permits writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
    }
}

/// Properties of a discovered characteristic. Set once from the declaration
/// and only queried afterwards; there is no conversion back into an integer.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
#[must_use]
#[repr(transparent)]
pub struct Props(Prop);

impl Props {
    /// Creates the property set from the raw declaration byte. The extended
    /// properties bit and any undefined bits are ignored.
    #[inline]
    pub const fn from_raw(v: u8) -> Self {
        Self(Prop::from_bits_truncate(v))
    }

    #[inline]
    #[must_use]
    pub const fn broadcast(self) -> bool {
        self.0.contains(Prop::BROADCAST)
    }

    #[inline]
    #[must_use]
    pub const fn read(self) -> bool {
        self.0.contains(Prop::READ)
    }

    #[inline]
    #[must_use]
    pub const fn write_wo_rsp(self) -> bool {
        self.0.contains(Prop::WRITE_WITHOUT_RESPONSE)
    }

    #[inline]
    #[must_use]
    pub const fn write(self) -> bool {
        self.0.contains(Prop::WRITE)
    }

    #[inline]
    #[must_use]
    pub const fn notify(self) -> bool {
        self.0.contains(Prop::NOTIFY)
    }

    #[inline]
    #[must_use]
    pub const fn indicate(self) -> bool {
        self.0.contains(Prop::INDICATE)
    }

    #[inline]
    #[must_use]
    pub const fn auth_signed_write(self) -> bool {
        self.0.contains(Prop::AUTHENTICATED_SIGNED_WRITES)
    }
}

impl Debug for Props {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", name_of!(Props))?;
        for (i, (name, _)) in self.0.iter_names().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props() {
        let all = |p: Props| {
            [
                p.broadcast(),
                p.read(),
                p.write_wo_rsp(),
                p.write(),
                p.notify(),
                p.indicate(),
                p.auth_signed_write(),
            ]
        };
        assert_eq!(all(Props::default()), [false; 7]);
        assert_eq!(all(Props::from_raw(0xFF)), [true; 7]);
        for bit in 0..7 {
            let v = all(Props::from_raw(1 << bit));
            assert!(v.iter().enumerate().all(|(i, &set)| set == (i == bit)));
        }
        assert_eq!(Props::from_raw(0x80), Props::default());
    }

    #[test]
    fn props_debug() {
        assert_eq!(format!("{:?}", Props::default()), "Props()");
        assert_eq!(format!("{:?}", Props::from_raw(0x0A)), "Props(READ | WRITE)");
    }
}
