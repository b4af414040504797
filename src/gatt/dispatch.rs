use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::att::Handle;
use crate::hci::ConnHandle;
use crate::util::name_of;

use super::*;

/// Write procedure variant reported in a [`WriteEvent`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WriteOp {
    /// Write request. The event means that the peer acknowledged the write or
    /// rejected it.
    Req,
    /// Write command. The event means that the command left the local
    /// controller. The peer never acknowledges commands.
    Cmd,
}

/// Completion of a read procedure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadEvent<'a> {
    pub conn: ConnHandle,
    pub hdl: Handle,
    /// Offset that was requested.
    pub off: u16,
    pub status: Status,
    /// Value or value part. Empty on failure.
    pub val: &'a [u8],
}

impl ReadEvent<'_> {
    /// Returns whether the event belongs to the value of characteristic `c`.
    #[inline]
    #[must_use]
    pub fn is_for(&self, c: &DiscoveredChar) -> bool {
        c.conn() == Some(self.conn) && c.value_handle() == self.hdl
    }
}

/// Completion of a write request or transmission of a write command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteEvent {
    pub conn: ConnHandle,
    pub hdl: Handle,
    pub op: WriteOp,
    pub status: Status,
}

impl WriteEvent {
    /// Returns whether the event belongs to the value of characteristic `c`.
    #[inline]
    #[must_use]
    pub fn is_for(&self, c: &DiscoveredChar) -> bool {
        c.conn() == Some(self.conn) && c.value_handle() == self.hdl
    }
}

/// Read completion callback.
#[derive(Clone)]
#[repr(transparent)]
pub struct OnRead(Arc<dyn Fn(&ReadEvent<'_>) + Send + Sync>);

impl<T: Fn(&ReadEvent<'_>) + Send + Sync + 'static> From<T> for OnRead {
    #[inline(always)]
    fn from(f: T) -> Self {
        Self(Arc::new(f))
    }
}

impl Debug for OnRead {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(OnRead)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

/// Write completion callback.
#[derive(Clone)]
#[repr(transparent)]
pub struct OnWrite(Arc<dyn Fn(&WriteEvent) + Send + Sync>);

impl<T: Fn(&WriteEvent) + Send + Sync + 'static> From<T> for OnWrite {
    #[inline(always)]
    fn from(f: T) -> Self {
        Self(Arc::new(f))
    }
}

impl Debug for OnWrite {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(OnWrite)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

/// Callbacks subscribed to one attribute of one connection.
#[derive(Clone, Debug, Default)]
struct Sub {
    read: Option<OnRead>,
    write: Option<OnWrite>,
}

/// Completion dispatcher.
///
/// Holds one read callback slot and one write callback slot shared by all
/// connections and attributes. Registering a callback replaces the previous
/// one. Callbacks subscribed to a specific connection and attribute handle
/// take precedence over the slot for events matching that key. An event with
/// no matching callback is dropped.
///
/// Callbacks run without any dispatcher or gateway lock held, so they may
/// initiate the next procedure.
#[derive(Debug, Default)]
pub struct Dispatcher {
    read: Mutex<Option<OnRead>>,
    write: Mutex<Option<OnWrite>>,
    subs: Mutex<HashMap<(ConnHandle, Handle), Sub>>,
}

impl Dispatcher {
    /// Sets the read completion callback.
    #[inline]
    pub fn on_read(&self, f: impl Into<OnRead>) {
        *self.read.lock() = Some(f.into());
    }

    /// Sets the write completion callback.
    #[inline]
    pub fn on_write(&self, f: impl Into<OnWrite>) {
        *self.write.lock() = Some(f.into());
    }

    /// Subscribes to read completions for attribute `hdl` on connection `cn`.
    pub fn subscribe_read(&self, cn: ConnHandle, hdl: Handle, f: impl Into<OnRead>) {
        self.subs.lock().entry((cn, hdl)).or_default().read = Some(f.into());
    }

    /// Subscribes to write completions for attribute `hdl` on connection `cn`.
    pub fn subscribe_write(&self, cn: ConnHandle, hdl: Handle, f: impl Into<OnWrite>) {
        self.subs.lock().entry((cn, hdl)).or_default().write = Some(f.into());
    }

    /// Removes all subscriptions for attribute `hdl` on connection `cn`.
    /// Returns whether any existed.
    pub fn unsubscribe(&self, cn: ConnHandle, hdl: Handle) -> bool {
        self.subs.lock().remove(&(cn, hdl)).is_some()
    }

    /// Removes all subscriptions for connection `cn`.
    pub fn unsubscribe_conn(&self, cn: ConnHandle) {
        self.subs.lock().retain(|&(c, _), _| c != cn);
    }

    /// Delivers a read completion. Returns whether a callback received it.
    pub fn read_complete(&self, e: &ReadEvent) -> bool {
        let sub = (self.subs.lock().get(&(e.conn, e.hdl))).and_then(|s| s.read.clone());
        let Some(f) = sub.or_else(|| self.read.lock().clone()) else {
            trace!("Dropped read completion: {e:?}");
            return false;
        };
        (f.0)(e);
        true
    }

    /// Delivers a write completion. Returns whether a callback received it.
    pub fn write_complete(&self, e: &WriteEvent) -> bool {
        let sub = (self.subs.lock().get(&(e.conn, e.hdl))).and_then(|s| s.write.clone());
        let Some(f) = sub.or_else(|| self.write.lock().clone()) else {
            trace!("Dropped write completion: {e:?}");
            return false;
        };
        (f.0)(e);
        true
    }
}
