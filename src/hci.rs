//! Host Controller Interface types consumed from the transport
//! ([Vol 4] Part E).

pub use handle::*;

mod handle;
