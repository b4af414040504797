use std::sync::{Arc, Weak};

use structbuf::Unpacker;

use crate::att::Handle;
use crate::gap::Uuid;
use crate::hci::ConnHandle;

use super::*;

/// Declaration and value handles of a characteristic.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CharHandles {
    pub decl: Handle,
    pub val: Handle,
}

/// Characteristic declaration ([Vol 3] Part G, Section 3.3.1).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CharDecl {
    pub hdls: CharHandles,
    pub props: Props,
    pub uuid: Uuid,
}

impl CharDecl {
    /// Decodes the value of the characteristic declaration attribute `hdl`,
    /// as returned by `ATT_READ_BY_TYPE_RSP` during discovery. Returns `None`
    /// if the value is malformed or the value handle does not follow the
    /// declaration.
    #[must_use]
    pub fn parse(hdl: Handle, v: &[u8]) -> Option<Self> {
        if !hdl.is_valid() || !matches!(v.len(), 5 | 19) {
            return None;
        }
        let mut p = Unpacker::new(v);
        let props = Props::from_raw(p.u8());
        let val = Handle::new(p.u16());
        if val <= hdl {
            return None;
        }
        Some(Self {
            hdls: CharHandles { decl: hdl, val },
            props,
            uuid: Uuid::try_from(&v[3..]).ok()?,
        })
    }
}

/// Characteristic discovered on a peer.
///
/// The default value is unbound: short UUID 0, invalid handles, no properties,
/// and no connection. Every procedure on it fails the same way without side
/// effects. A bound characteristic keeps a weak reference to its gateway, so
/// it becomes unusable once the gateway is dropped.
#[derive(Clone, Debug, Default)]
pub struct DiscoveredChar {
    gate: Option<Weak<dyn Gateway>>,
    conn: Option<ConnHandle>,
    decl: CharDecl,
}

impl DiscoveredChar {
    /// Creates a characteristic discovered on connection `conn`.
    pub fn new<G: Gateway + 'static>(gate: &Arc<G>, conn: ConnHandle, decl: CharDecl) -> Self {
        let gate: Weak<G> = Arc::downgrade(gate);
        Self {
            gate: Some(gate),
            conn: Some(conn),
            decl,
        }
    }

    /// Upgrades the identity to a 128-bit UUID. This is allowed once, for
    /// discovery procedures that learn the long UUID after the declaration.
    pub fn set_long_uuid(&mut self, b: [u8; 16]) -> Result<()> {
        if self.decl.uuid.is_long() {
            return Err(Error::InvalidState);
        }
        self.decl.uuid = Uuid::from_le_bytes(b);
        Ok(())
    }

    /// Initiates a read of the characteristic value starting at `off`
    /// ([Vol 3] Part G, Sections 4.8.1 and 4.8.3). The value arrives in a
    /// [`ReadEvent`]. Values longer than `ATT_MTU - 1` require another call
    /// with the offset advanced by the length of the part received.
    pub fn read(&self, off: u16) -> Result<()> {
        if !self.decl.props.read() {
            return Err(Error::OperationNotPermitted);
        }
        let (gate, cn) = self.bound()?;
        gate.initiate_read(cn, self.decl.hdls.val, off)
    }

    /// Initiates a write with response ([Vol 3] Part G, Section 4.9.3). The
    /// peer's acknowledgment arrives in a [`WriteEvent`] with
    /// [`WriteOp::Req`].
    pub fn write(&self, val: &[u8]) -> Result<()> {
        if !self.decl.props.write() {
            return Err(Error::OperationNotPermitted);
        }
        let (gate, cn) = self.bound()?;
        gate.initiate_write(cn, self.decl.hdls.val, val, WriteOp::Req)
    }

    /// Sends a write without response ([Vol 3] Part G, Section 4.9.1). A
    /// [`WriteEvent`] with [`WriteOp::Cmd`] follows once the command is
    /// transmitted, which also returns its write credit.
    pub fn write_wo_rsp(&self, val: &[u8]) -> Result<()> {
        if !self.decl.props.write_wo_rsp() {
            return Err(Error::OperationNotPermitted);
        }
        let (gate, cn) = self.bound()?;
        gate.initiate_write(cn, self.decl.hdls.val, val, WriteOp::Cmd)
    }

    /// Returns the characteristic type.
    #[inline]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.decl.uuid
    }

    /// Returns the 16-bit alias of the characteristic type.
    #[inline]
    #[must_use]
    pub const fn short_uuid(&self) -> u16 {
        self.decl.uuid.short()
    }

    /// Returns the properties from the declaration.
    #[inline]
    #[must_use]
    pub const fn props(&self) -> Props {
        self.decl.props
    }

    #[inline]
    #[must_use]
    pub const fn handles(&self) -> CharHandles {
        self.decl.hdls
    }

    #[inline]
    #[must_use]
    pub const fn decl_handle(&self) -> Handle {
        self.decl.hdls.decl
    }

    #[inline]
    #[must_use]
    pub const fn value_handle(&self) -> Handle {
        self.decl.hdls.val
    }

    /// Returns the connection on which the characteristic was discovered.
    #[inline]
    #[must_use]
    pub const fn conn(&self) -> Option<ConnHandle> {
        self.conn
    }

    /// Returns the gateway and connection if the characteristic can issue
    /// procedures.
    fn bound(&self) -> Result<(Arc<dyn Gateway>, ConnHandle)> {
        let gate = self.gate.as_ref().and_then(Weak::upgrade);
        match (gate, self.conn) {
            (Some(gate), Some(cn)) if self.decl.hdls.val.is_valid() => Ok((gate, cn)),
            _ => Err(Error::InvalidState),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decl_parse() {
        let d = CharDecl::parse(Handle::new(0x10), &[0x12, 0x11, 0x00, 0x19, 0x2A]).unwrap();
        assert_eq!(d.hdls.decl, Handle::new(0x10));
        assert_eq!(d.hdls.val, Handle::new(0x11));
        assert!(d.props.read() && d.props.notify() && !d.props.write());
        assert_eq!(d.uuid, Uuid::Short(0x2A19));

        let mut v = vec![0x04, 0x21, 0x00];
        v.extend_from_slice(&0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E_u128.to_le_bytes());
        let d = CharDecl::parse(Handle::new(0x20), &v).unwrap();
        assert!(d.props.write_wo_rsp());
        assert_eq!(d.uuid.short(), 0x0002);
        assert!(d.uuid.is_long());
    }

    #[test]
    fn decl_parse_invalid() {
        let h = Handle::new(0x10);
        assert_eq!(CharDecl::parse(Handle::INVALID, &[0x02, 0x11, 0, 0x19, 0x2A]), None);
        assert_eq!(CharDecl::parse(h, &[0x02, 0x11, 0, 0x19]), None);
        assert_eq!(CharDecl::parse(h, &[0x02, 0x00, 0, 0x19, 0x2A]), None);
        assert_eq!(CharDecl::parse(h, &[0x02, 0x10, 0, 0x19, 0x2A]), None);
    }

    #[test]
    fn unbound() {
        let c = DiscoveredChar::default();
        assert_eq!(c.uuid(), Uuid::Short(0));
        assert_eq!(c.short_uuid(), 0);
        assert_eq!(c.handles(), CharHandles::default());
        assert!(!c.decl_handle().is_valid() && !c.value_handle().is_valid());
        assert_eq!(c.props(), Props::default());
        assert_eq!(c.conn(), None);
        for _ in 0..3 {
            assert_eq!(c.read(0), Err(Error::OperationNotPermitted));
            assert_eq!(c.write(&[1]), Err(Error::OperationNotPermitted));
            assert_eq!(c.write_wo_rsp(&[1]), Err(Error::OperationNotPermitted));
        }

        // With permissions but no binding the state check fails instead
        let c = DiscoveredChar {
            decl: CharDecl {
                props: Props::from_raw(0x0E),
                ..CharDecl::default()
            },
            ..DiscoveredChar::default()
        };
        assert_eq!(c.read(0), Err(Error::InvalidState));
        assert_eq!(c.write(&[1]), Err(Error::InvalidState));
        assert_eq!(c.write_wo_rsp(&[1]), Err(Error::InvalidState));
    }

    #[test]
    fn long_uuid_once() {
        let mut c = DiscoveredChar::default();
        let b = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E_u128.to_le_bytes();
        assert_eq!(c.set_long_uuid(b), Ok(()));
        assert_eq!(c.uuid(), Uuid::from_le_bytes(b));
        assert_eq!(c.set_long_uuid([0; 16]), Err(Error::InvalidState));
        assert_eq!(c.uuid(), Uuid::from_le_bytes(b));
    }
}
