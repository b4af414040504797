//! Bluetooth LE GATT client procedures for discovered characteristics.
//!
//! A central discovers characteristics on a peer's attribute table and then
//! reads and writes their values. Each connection permits only one
//! outstanding read or acknowledged write ([Vol 3] Part F, Section 3.3.2),
//! while unacknowledged writes draw from a separate pool of transmit credits.
//! [`gatt::DiscoveredChar`] validates requests against the discovered
//! properties and hands them to a [`gatt::Gateway`], which enforces both
//! limits and reports outcomes through a [`gatt::Dispatcher`].

pub mod att;
pub mod gap;
pub mod gatt;
pub mod hci;

mod util;
