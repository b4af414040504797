use structbuf::{Pack, StructBuf, Unpacker};

use super::*;

/// `ATT_ERROR_RSP` PDU ([Vol 3] Part F, Section 3.4.1.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("ATT request {req:#04X} for {hdl} failed with {err}")]
pub struct ErrorRsp {
    /// Raw opcode of the request that failed.
    pub req: u8,
    pub hdl: Handle,
    pub err: ErrorCode,
}

/// Outbound client request or command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Request<'a> {
    /// `ATT_READ_REQ` ([Vol 3] Part F, Section 3.4.4.3).
    Read { hdl: Handle },
    /// `ATT_READ_BLOB_REQ` ([Vol 3] Part F, Section 3.4.4.5).
    ReadBlob { hdl: Handle, off: u16 },
    /// `ATT_WRITE_REQ` ([Vol 3] Part F, Section 3.4.5.1).
    Write { hdl: Handle, val: &'a [u8] },
    /// `ATT_WRITE_CMD` ([Vol 3] Part F, Section 3.4.5.3).
    WriteCmd { hdl: Handle, val: &'a [u8] },
}

impl<'a> Request<'a> {
    /// Size of the opcode and handle fields.
    const HDR: usize = 1 + 2;

    /// Returns a read request, using `ATT_READ_BLOB_REQ` for non-zero
    /// offsets.
    #[inline]
    #[must_use]
    pub const fn read(hdl: Handle, off: u16) -> Self {
        if off == 0 {
            Self::Read { hdl }
        } else {
            Self::ReadBlob { hdl, off }
        }
    }

    /// Returns the request opcode.
    #[inline]
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match *self {
            Self::Read { .. } => Opcode::ReadReq,
            Self::ReadBlob { .. } => Opcode::ReadBlobReq,
            Self::Write { .. } => Opcode::WriteReq,
            Self::WriteCmd { .. } => Opcode::WriteCmd,
        }
    }

    /// Returns the target attribute handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        match *self {
            Self::Read { hdl }
            | Self::ReadBlob { hdl, .. }
            | Self::Write { hdl, .. }
            | Self::WriteCmd { hdl, .. } => hdl,
        }
    }

    /// Returns the encoded PDU length.
    #[inline]
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::Read { .. } => Self::HDR,
            Self::ReadBlob { .. } => Self::HDR + 2,
            Self::Write { val, .. } | Self::WriteCmd { val, .. } => Self::HDR + val.len(),
        }
    }

    /// Returns the maximum value length that a write PDU may carry for the
    /// specified `ATT_MTU`.
    #[inline]
    #[must_use]
    pub fn max_val_len(mtu: u16) -> usize {
        (usize::from(mtu).saturating_sub(Self::HDR)).min(MAX_VAL_LEN)
    }

    /// Encodes the PDU.
    #[must_use]
    pub fn encode(&self) -> StructBuf {
        let mut b = StructBuf::new(self.pdu_len());
        {
            let mut p = b.append();
            p.u8(self.opcode()).u16(self.handle());
            match *self {
                Self::Read { .. } => {}
                Self::ReadBlob { off, .. } => {
                    p.u16(off);
                }
                Self::Write { val, .. } | Self::WriteCmd { val, .. } => {
                    p.put(val);
                }
            }
        }
        b
    }
}

/// Server response that completes a client procedure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Response<'a> {
    /// `ATT_READ_RSP` value.
    Read(&'a [u8]),
    /// `ATT_READ_BLOB_RSP` value part.
    ReadBlob(&'a [u8]),
    /// `ATT_WRITE_RSP`.
    Write,
    /// `ATT_ERROR_RSP`.
    Error(ErrorRsp),
}

impl<'a> Response<'a> {
    /// Decodes a received PDU. Returns `None` if the PDU is not a well-formed
    /// response to a read or write procedure.
    pub fn decode(pdu: &'a [u8]) -> Option<Self> {
        let (&op, params) = pdu.split_first()?;
        match Opcode::try_from(op).ok()? {
            Opcode::ReadRsp => Some(Self::Read(params)),
            Opcode::ReadBlobRsp => Some(Self::ReadBlob(params)),
            Opcode::WriteRsp if params.is_empty() => Some(Self::Write),
            Opcode::ErrorRsp if params.len() == 4 => {
                let mut p = Unpacker::new(params);
                Some(Self::Error(ErrorRsp {
                    req: p.u8(),
                    hdl: Handle::new(p.u16()),
                    err: ErrorCode::try_from(p.u8()).unwrap_or(ErrorCode::UnlikelyError),
                }))
            }
            _ => None,
        }
    }

    /// Returns the opcode of the request that the response completes.
    #[inline]
    #[must_use]
    pub const fn req(&self) -> u8 {
        match *self {
            Self::Read(_) => Opcode::ReadReq as u8,
            Self::ReadBlob(_) => Opcode::ReadBlobReq as u8,
            Self::Write => Opcode::WriteReq as u8,
            Self::Error(e) => e.req,
        }
    }
}
