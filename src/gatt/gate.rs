use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::att::{Handle, Opcode, Request, Response, DEFAULT_MTU};
use crate::hci::ConnHandle;

use super::*;

/// Procedure gateway that starts client procedures on behalf of
/// [`DiscoveredChar`].
///
/// An implementation must accept at most one read or write request per
/// connection until its completion is reported, and must report exactly one
/// completion for every accepted procedure.
pub trait Gateway: Send + Sync {
    /// Starts reading attribute `hdl` at offset `off`.
    fn initiate_read(&self, cn: ConnHandle, hdl: Handle, off: u16) -> Result<()>;

    /// Starts writing `val` to attribute `hdl`.
    fn initiate_write(&self, cn: ConnHandle, hdl: Handle, val: &[u8], op: WriteOp) -> Result<()>;
}

/// ATT PDU sink.
pub trait Transport: Send + Sync {
    /// Queues an ATT PDU for transmission on connection `cn`. Returns
    /// [`Error::NoMemory`] if no transmit buffer is available. The gateway
    /// calls this without holding its lock, so the implementation may feed
    /// connection events back into the gateway from within the call.
    fn send(&self, cn: ConnHandle, pdu: &[u8]) -> Result<()>;
}

/// Gateway configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of write commands that may await transmission across all
    /// connections. At least one credit is always available.
    pub write_cmd_credits: usize,
    /// `ATT_MTU` assumed for connections that do not specify one.
    pub default_mtu: u16,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            write_cmd_credits: 4,
            default_mtu: DEFAULT_MTU,
        }
    }
}

/// Identifier of one reservation made by [`ProcGate`]. Unique for the
/// lifetime of the gateway.
type Token = u64;

/// Outstanding read or write request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Pending {
    op: Opcode,
    hdl: Handle,
    off: u16,
    tok: Token,
    /// Whether the transport accepted the PDU.
    sent: bool,
}

/// Client procedure state of one connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Proc {
    Idle,
    Pending(Pending),
}

/// Write command awaiting transmission.
#[derive(Clone, Copy, Debug)]
struct Cmd {
    hdl: Handle,
    tok: Token,
    sent: bool,
}

/// Per-connection state.
#[derive(Debug)]
struct Conn {
    mtu: u16,
    proc: Proc,
    /// Write commands awaiting transmission, oldest first.
    cmds: VecDeque<Cmd>,
}

impl Conn {
    #[inline]
    fn new(mtu: u16) -> Self {
        Self {
            mtu,
            proc: Proc::Idle,
            cmds: VecDeque::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    conns: HashMap<ConnHandle, Conn>,
    credits: usize,
    next: Token,
    /// Reservations removed by a disconnect while their PDU was being sent.
    /// The sender reports their outcome.
    orphans: HashSet<Token>,
}

impl State {
    /// Returns a new reservation token.
    #[inline]
    fn token(&mut self) -> Token {
        self.next = self.next.wrapping_add(1);
        self.next
    }
}

/// [`Gateway`] implementation over an ATT PDU [`Transport`].
///
/// The owner feeds connection events into the gateway: [`Self::connect`] and
/// [`Self::disconnect`] as links come and go, [`Self::recv`] for every
/// received ATT PDU, and [`Self::data_sent`] as the controller reports
/// transmitted write commands. Completions are reported through
/// [`Self::dispatcher`].
///
/// A procedure is reserved before its PDU is handed to the transport and the
/// reservation is released if the transport rejects it. A disconnect that
/// races with the send leaves the reservation to the sender, which reports a
/// [`Failure::Disconnected`] completion only if the send succeeded.
#[derive(Debug)]
pub struct ProcGate<T> {
    tx: T,
    cfg: Config,
    st: Mutex<State>,
    dispatch: Dispatcher,
}

impl<T: Transport> ProcGate<T> {
    /// Creates a new gateway. The credit pool and default MTU are raised to
    /// their minimum values if the configuration is below them.
    #[must_use]
    pub fn new(tx: T, mut cfg: Config) -> Self {
        if cfg.write_cmd_credits == 0 {
            warn!("Empty write command credit pool, using 1 credit");
            cfg.write_cmd_credits = 1;
        }
        cfg.default_mtu = cfg.default_mtu.max(DEFAULT_MTU);
        Self {
            tx,
            st: Mutex::new(State {
                credits: cfg.write_cmd_credits,
                ..State::default()
            }),
            cfg,
            dispatch: Dispatcher::default(),
        }
    }

    /// Returns the effective configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the underlying transport.
    #[inline(always)]
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.tx
    }

    /// Returns the completion dispatcher.
    #[inline(always)]
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatch
    }

    /// Returns the number of available write command credits.
    #[inline]
    #[must_use]
    pub fn credits(&self) -> usize {
        self.st.lock().credits
    }

    /// Returns whether connection `cn` has a procedure in progress.
    #[inline]
    #[must_use]
    pub fn is_busy(&self, cn: ConnHandle) -> bool {
        (self.st.lock().conns.get(&cn)).map_or(false, |c| c.proc != Proc::Idle)
    }

    /// Registers a new connection. An `mtu` of 0 selects the configured
    /// default.
    pub fn connect(&self, cn: ConnHandle, mtu: u16) {
        let mtu = match mtu {
            0 => self.cfg.default_mtu,
            n => n.max(DEFAULT_MTU),
        };
        let mut st = self.st.lock();
        if let Some(c) = st.conns.get_mut(&cn) {
            warn!("{cn} is already connected");
            c.mtu = mtu;
            return;
        }
        st.conns.insert(cn, Conn::new(mtu));
        debug!("{cn} connected with ATT_MTU {mtu}");
    }

    /// Updates the `ATT_MTU` after an MTU exchange.
    pub fn set_mtu(&self, cn: ConnHandle, mtu: u16) {
        match self.st.lock().conns.get_mut(&cn) {
            Some(c) => c.mtu = mtu.max(DEFAULT_MTU),
            None => warn!("ATT_MTU update for unknown {cn}"),
        }
    }

    /// Removes connection `cn`, failing its outstanding procedure and any
    /// write commands that were not transmitted.
    pub fn disconnect(&self, cn: ConnHandle) {
        let c = {
            let mut st = self.st.lock();
            let State {
                conns,
                credits,
                orphans,
                ..
            } = &mut *st;
            let Some(c) = conns.remove(&cn) else {
                warn!("Disconnect for unknown {cn}");
                return;
            };
            *credits += c.cmds.len();
            if let Proc::Pending(p) = c.proc {
                if !p.sent {
                    orphans.insert(p.tok);
                }
            }
            orphans.extend(c.cmds.iter().filter(|cmd| !cmd.sent).map(|cmd| cmd.tok));
            c
        };
        debug!("{cn} disconnected");
        if let Proc::Pending(p) = c.proc {
            if p.sent {
                self.complete(cn, p, Err(Failure::Disconnected), &[]);
            }
        }
        for cmd in c.cmds.iter().filter(|cmd| cmd.sent) {
            self.cmd_complete(cn, cmd.hdl, Err(Failure::Disconnected));
        }
        self.dispatch.unsubscribe_conn(cn);
    }

    /// Handles an ATT PDU received on connection `cn`. Responses that do not
    /// match the outstanding procedure are dropped.
    pub fn recv(&self, cn: ConnHandle, pdu: &[u8]) {
        let Some(rsp) = Response::decode(pdu) else {
            warn!("Unexpected ATT PDU on {cn}: {pdu:02X?}");
            return;
        };
        let p = {
            let mut st = self.st.lock();
            let Some(c) = st.conns.get_mut(&cn) else {
                warn!("ATT response for unknown {cn}");
                return;
            };
            let proc = c.proc;
            match proc {
                Proc::Pending(p) if completes(&rsp, &p) => {
                    c.proc = Proc::Idle;
                    p
                }
                _ => {
                    warn!("Unexpected {rsp:?} on {cn} while {proc:?}");
                    return;
                }
            }
        };
        let (status, val) = match rsp {
            Response::Read(v) | Response::ReadBlob(v) => (Ok(()), v),
            Response::Write => (Ok(()), &[][..]),
            Response::Error(e) => {
                debug!("{e}");
                (Err(Failure::Att(e.err)), &[][..])
            }
        };
        self.complete(cn, p, status, val);
    }

    /// Handles the controller's report that `n` write commands were
    /// transmitted on connection `cn`, returning their credits.
    pub fn data_sent(&self, cn: ConnHandle, n: usize) {
        let mut sent = Vec::new();
        {
            let mut st = self.st.lock();
            let State { conns, credits, .. } = &mut *st;
            let Some(c) = conns.get_mut(&cn) else {
                warn!("Transmit report for unknown {cn}");
                return;
            };
            c.cmds.retain(|cmd| {
                if cmd.sent && sent.len() < n {
                    sent.push(cmd.hdl);
                    return false;
                }
                true
            });
            if sent.len() < n {
                warn!("{cn} reported {n} sent commands, but {} were sent", sent.len());
            }
            *credits += sent.len();
        }
        for hdl in sent {
            self.cmd_complete(cn, hdl, Ok(()));
        }
    }

    /// Reserves the connection for a request and sends it.
    fn request(&self, cn: ConnHandle, req: Request<'_>) -> Result<()> {
        let p = {
            let mut st = self.st.lock();
            let tok = st.token();
            let c = st.conns.get_mut(&cn).ok_or(Error::InvalidState)?;
            if c.proc != Proc::Idle {
                return Err(Error::StackBusy);
            }
            if let Request::Write { val, .. } = req {
                check_len(val, c.mtu)?;
            }
            let p = Pending {
                op: req.opcode(),
                hdl: req.handle(),
                off: match req {
                    Request::ReadBlob { off, .. } => off,
                    _ => 0,
                },
                tok,
                sent: false,
            };
            c.proc = Proc::Pending(p);
            p
        };
        let r = self.send(cn, &req);
        let mut st = self.st.lock();
        if st.orphans.remove(&p.tok) {
            drop(st);
            if r.is_ok() {
                self.complete(cn, p, Err(Failure::Disconnected), &[]);
            }
            return r;
        }
        if let Some(c) = st.conns.get_mut(&cn) {
            // The procedure may have already completed
            if matches!(c.proc, Proc::Pending(q) if q.tok == p.tok) {
                c.proc = match r {
                    Ok(()) => Proc::Pending(Pending { sent: true, ..p }),
                    Err(_) => Proc::Idle,
                };
            }
        }
        r
    }

    /// Takes a write command credit and sends the command.
    fn command(&self, cn: ConnHandle, hdl: Handle, val: &[u8]) -> Result<()> {
        let tok = {
            let mut st = self.st.lock();
            let tok = st.token();
            let State { conns, credits, .. } = &mut *st;
            let c = conns.get_mut(&cn).ok_or(Error::InvalidState)?;
            check_len(val, c.mtu)?;
            if *credits == 0 {
                return Err(Error::NoMemory);
            }
            *credits -= 1;
            c.cmds.push_back(Cmd {
                hdl,
                tok,
                sent: false,
            });
            tok
        };
        let r = self.send(cn, &Request::WriteCmd { hdl, val });
        let mut st = self.st.lock();
        if st.orphans.remove(&tok) {
            drop(st);
            if r.is_ok() {
                self.cmd_complete(cn, hdl, Err(Failure::Disconnected));
            }
            return r;
        }
        let State { conns, credits, .. } = &mut *st;
        if let Some(c) = conns.get_mut(&cn) {
            if let Some(i) = c.cmds.iter().position(|cmd| cmd.tok == tok) {
                if r.is_ok() {
                    c.cmds[i].sent = true;
                } else {
                    c.cmds.remove(i);
                    *credits += 1;
                }
            }
        }
        r
    }

    /// Encodes and sends a PDU.
    fn send(&self, cn: ConnHandle, req: &Request<'_>) -> Result<()> {
        let pdu = req.encode();
        self.tx.send(cn, pdu.as_ref())?;
        debug!("{} for {} on {cn}", req.opcode(), req.handle());
        Ok(())
    }

    /// Reports completion of a read or write request.
    fn complete(&self, conn: ConnHandle, p: Pending, status: Status, val: &[u8]) {
        let Pending { op, hdl, off, .. } = p;
        debug!("{op} for {hdl} on {conn} completed with {status:?}");
        if op == Opcode::WriteReq {
            self.dispatch.write_complete(&WriteEvent {
                conn,
                hdl,
                op: WriteOp::Req,
                status,
            });
        } else {
            self.dispatch.read_complete(&ReadEvent {
                conn,
                hdl,
                off,
                status,
                val,
            });
        }
    }

    /// Reports transmission or failure of a write command.
    #[inline]
    fn cmd_complete(&self, conn: ConnHandle, hdl: Handle, status: Status) {
        self.dispatch.write_complete(&WriteEvent {
            conn,
            hdl,
            op: WriteOp::Cmd,
            status,
        });
    }
}

impl<T: Transport> Gateway for ProcGate<T> {
    fn initiate_read(&self, cn: ConnHandle, hdl: Handle, off: u16) -> Result<()> {
        if !hdl.is_valid() {
            return Err(Error::InvalidState);
        }
        self.request(cn, Request::read(hdl, off))
    }

    fn initiate_write(&self, cn: ConnHandle, hdl: Handle, val: &[u8], op: WriteOp) -> Result<()> {
        if !hdl.is_valid() {
            return Err(Error::InvalidState);
        }
        match op {
            WriteOp::Req => self.request(cn, Request::Write { hdl, val }),
            WriteOp::Cmd => self.command(cn, hdl, val),
        }
    }
}

/// Returns whether `rsp` completes procedure `p`. An error response must
/// name the same request opcode and attribute handle.
#[inline]
fn completes(rsp: &Response<'_>, p: &Pending) -> bool {
    match *rsp {
        Response::Error(e) => e.req == u8::from(p.op) && e.hdl == p.hdl,
        _ => rsp.req() == u8::from(p.op),
    }
}

/// Checks that `val` fits in a write PDU.
#[inline]
fn check_len(val: &[u8], mtu: u16) -> Result<()> {
    let max = Request::max_val_len(mtu);
    if val.len() > max {
        return Err(Error::ValueTooLong {
            len: val.len(),
            max,
        });
    }
    Ok(())
}
