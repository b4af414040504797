//! Attribute Protocol ([Vol 3] Part F), client side.

pub use {consts::*, handle::*, pdu::*};

mod consts;
mod handle;
mod pdu;
