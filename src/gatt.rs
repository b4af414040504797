//! Generic Attribute Profile client ([Vol 3] Part G).

pub use {self::char::*, dispatch::*, gate::*, props::*};

use crate::att::ErrorCode;

mod char;
mod dispatch;
mod gate;
mod props;


/// Reason a client procedure could not be initiated. Every variant is
/// detected before any PDU is sent to the peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("connection or characteristic is not in a usable state")]
    InvalidState,
    #[error("a client procedure is already in progress")]
    StackBusy,
    #[error("operation not permitted by characteristic properties")]
    OperationNotPermitted,
    #[error("no request buffer or write credit available")]
    NoMemory,
    #[error("value length {len} exceeds the maximum of {max}")]
    ValueTooLong { len: usize, max: usize },
}

/// Common GATT client result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Reason an accepted procedure failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Failure {
    #[error("peer responded with {0}")]
    Att(ErrorCode),
    #[error("connection terminated")]
    Disconnected,
}

/// Outcome of an accepted procedure.
pub type Status = std::result::Result<(), Failure>;
