//! The session engine (spec.md §4.4, C4): version handshake, attach,
//! walk, open, create, read, write, stat, wstat, clunk, remove, flush.
//!
//! Grounded on the dispatch shape of `rs9p-rs9p/crates/rs9p/src/srv.rs`
//! (one request in flight, decode body, act, reply) turned inside out
//! for a client (marshal a request, block for one reply, validate,
//! return), and on `Superpat-ad/crates/ninep/src/client.rs`'s
//! `expect_rmessage!` pattern of asserting the reply variant matches
//! what was sent — generalized here into `ProtocolViolation` on any
//! mismatch rather than a panic.

use log::{debug, warn};
use ninep_proto::message::{self, Dir, Received, Rmsg, Tmsg, WalkQids};
use ninep_proto::{CodecError, Qid, IOHDRSZ, MAX_WALK_NAMES, MIN_MSIZE, NOFID, NOTAG};

use crate::alloc_table::{FidTable, TagTable};
use crate::error::{ClientError, Result};
use crate::transport::Transport;

/// Session lifecycle phase (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unversioned,
    Versioned,
    Attached,
    Closed,
}

/// Parameters for [`Session::version`].
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig<'a> {
    pub requested_msize: u32,
    pub requested_version: &'a str,
}

/// Outcome of a successful [`Session::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkResult {
    pub newfid: u32,
    pub wqids: WalkQids,
}

/// A failure detected while sending or receiving a frame, before any
/// reply has been parsed far enough to borrow from the receive buffer.
/// Kept lifetime-free so it can be produced by the free functions below
/// without entangling the receive buffer's borrow.
enum Framing {
    TransportWrite,
    TransportRead,
    TransportClosed,
    Codec(CodecError),
    TagMismatch,
}

impl<'a> From<Framing> for ClientError<'a> {
    fn from(f: Framing) -> Self {
        match f {
            Framing::TransportWrite => ClientError::TransportWrite,
            Framing::TransportRead => ClientError::TransportRead,
            Framing::TransportClosed => ClientError::TransportClosed,
            Framing::Codec(e) => ClientError::Codec(e),
            Framing::TagMismatch => ClientError::TagMismatch,
        }
    }
}

fn send_frame<T: Transport>(transport: &mut T, buf: &[u8]) -> core::result::Result<(), Framing> {
    match transport.send(buf) {
        Ok(n) if n == buf.len() => Ok(()),
        Ok(_) => Err(Framing::TransportWrite),
        Err(_) => Err(Framing::TransportWrite),
    }
}

/// Read bytes from `transport` into `recv_buf` until a full frame (per
/// its own declared `size`) has arrived, or a transport/framing failure
/// occurs. Returns the frame's length.
fn recv_frame<T: Transport>(
    transport: &mut T,
    recv_buf: &mut [u8],
    cap: u32,
) -> core::result::Result<usize, Framing> {
    let mut have = 0usize;
    // Fill at least the 4-byte size prefix first.
    while have < 4 {
        let n = transport.recv(&mut recv_buf[have..]).map_err(|_| Framing::TransportRead)?;
        if n == 0 {
            return if have == 0 { Err(Framing::TransportClosed) } else { Err(Framing::Codec(CodecError::ShortHeader)) };
        }
        have += n;
    }

    let size = u32::from_le_bytes(recv_buf[0..4].try_into().unwrap());
    if (size as usize) < message::MIN_FRAME_LEN {
        return Err(Framing::Codec(CodecError::ShortHeader));
    }
    if size > cap {
        return Err(Framing::Codec(CodecError::Oversize));
    }
    let want = size as usize;
    if want > recv_buf.len() {
        return Err(Framing::Codec(CodecError::Oversize));
    }

    while have < want {
        let n = transport.recv(&mut recv_buf[have..want]).map_err(|_| Framing::TransportRead)?;
        if n == 0 {
            return Err(Framing::Codec(CodecError::Truncated));
        }
        have += n;
    }

    Ok(want)
}

/// Send `send_buf[..n]`, block for exactly one complete reply, and
/// validate its tag. Returns the parsed reply, still borrowed from
/// `recv_buf`.
#[allow(clippy::too_many_arguments)]
fn exchange<'b, T: Transport>(
    transport: &mut T,
    send_buf: &[u8],
    n: usize,
    recv_buf: &'b mut [u8],
    cap: u32,
    expect_tag: u16,
) -> core::result::Result<Received<'b>, Framing> {
    send_frame(transport, &send_buf[..n])?;
    let len = recv_frame(transport, recv_buf, cap)?;
    let received = message::unmarshal(&recv_buf[..len], cap).map_err(Framing::Codec)?;
    if received.tag != expect_tag {
        return Err(Framing::TagMismatch);
    }
    Ok(received)
}

/// A synchronous, single-session 9P2000 client.
///
/// `TAGS` and `FIDS` size the tag and fid tables (spec.md §4.3's
/// recommended defaults are 16 and 32); `MAX_MSIZE` is the compile-time
/// buffer capacity that bounds however small a `msize` is eventually
/// negotiated (spec.md §4.4, §9 "static sizing"). No allocation occurs
/// on any operation.
pub struct Session<T: Transport, const TAGS: usize = 16, const FIDS: usize = 32, const MAX_MSIZE: usize = 8192> {
    transport: T,
    tags: TagTable<TAGS>,
    fids: FidTable<FIDS>,
    iounits: [u32; FIDS],
    send_buf: [u8; MAX_MSIZE],
    recv_buf: [u8; MAX_MSIZE],
    phase: Phase,
    msize: u32,
    rootfid: Option<u32>,
}

impl<T: Transport, const TAGS: usize, const FIDS: usize, const MAX_MSIZE: usize>
    Session<T, TAGS, FIDS, MAX_MSIZE>
{
    /// Build a session over an already-connected transport. The session
    /// starts in [`Phase::Unversioned`]; call [`Session::version`] before
    /// anything else.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            tags: TagTable::new(),
            fids: FidTable::new(),
            iounits: [0; FIDS],
            send_buf: [0; MAX_MSIZE],
            recv_buf: [0; MAX_MSIZE],
            phase: Phase::Unversioned,
            msize: MAX_MSIZE as u32,
            rootfid: None,
        }
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The negotiated `msize`, or the compile-time ceiling before
    /// negotiation completes.
    pub fn msize(&self) -> u32 {
        self.msize
    }

    /// The fid returned by [`Session::attach`], if attached.
    pub fn rootfid(&self) -> Option<u32> {
        self.rootfid
    }

    fn current_cap(&self) -> u32 {
        match self.phase {
            Phase::Unversioned => MAX_MSIZE as u32,
            _ => self.msize,
        }
    }

    fn alloc_tag(&mut self) -> Result<'static, u16> {
        self.tags.alloc().ok_or(ClientError::TagsExhausted)
    }

    fn alloc_fid(&mut self) -> Result<'static, u32> {
        self.fids.alloc().ok_or(ClientError::FidsExhausted)
    }

    /// Negotiate the protocol version (spec.md §4.4's `version`).
    ///
    /// The version string is read directly out of the `MAX_MSIZE`-sized
    /// receive buffer with no separate scratch array: an over-long
    /// string is accepted whenever it fits the negotiated frame and
    /// rejected with `StringTooLong` only when it does not (spec.md §9's
    /// open question).
    pub fn version<'s>(&'s mut self, cfg: SessionConfig<'_>) -> Result<'s, ()> {
        if self.phase != Phase::Unversioned {
            return Err(ClientError::InvalidArgument);
        }
        let msg = Tmsg::Version { msize: cfg.requested_msize, version: cfg.requested_version };
        let n = msg.marshal(NOTAG, MAX_MSIZE as u32, &mut self.send_buf)?;

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, NOTAG) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                warn!("version exchange failed, closing session");
                return Err(f.into());
            },
        };

        match received.msg {
            Rmsg::Version { msize: server_msize, version } => {
                let ceiling = cfg.requested_msize.min(MAX_MSIZE as u32);
                if server_msize < MIN_MSIZE || server_msize > ceiling {
                    self.phase = Phase::Closed;
                    return Err(ClientError::ProtocolViolation);
                }
                if version != cfg.requested_version {
                    self.phase = Phase::Closed;
                    return Err(ClientError::VersionUnsupported);
                }
                self.msize = server_msize;
                self.phase = Phase::Versioned;
                debug!("version negotiated: msize={} version={}", server_msize, version);
                Ok(())
            },
            Rmsg::Error { ename } => {
                self.phase = Phase::Closed;
                warn!("version rejected by server: {}", ename);
                Err(ClientError::ServerError(ename))
            },
            _ => {
                self.phase = Phase::Closed;
                warn!("version reply carried an unexpected message type");
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Attach to the file tree as `uname`, naming `aname` (spec.md §4.4's
    /// `attach`). No authentication fid is ever sent (`afid = NOFID`):
    /// `auth` is not part of this engine's programmatic surface.
    pub fn attach<'s>(&'s mut self, uname: &str, aname: &str) -> Result<'s, Qid> {
        if self.phase != Phase::Versioned {
            return Err(ClientError::InvalidArgument);
        }
        let fid = self.alloc_fid()?;
        let tag = match self.alloc_tag() {
            Ok(t) => t,
            Err(e) => {
                self.fids.release(fid);
                return Err(e);
            },
        };

        let msg = Tmsg::Attach { fid, afid: NOFID, uname, aname };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                self.fids.release(fid);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.fids.release(fid);
                self.phase = Phase::Closed;
                warn!("attach exchange failed, closing session");
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Attach { qid } => {
                self.rootfid = Some(fid);
                self.phase = Phase::Attached;
                debug!("attached as {:?}, rootfid={}", uname, fid);
                Ok(qid)
            },
            Rmsg::Error { ename } => {
                self.fids.release(fid);
                self.phase = Phase::Closed;
                warn!("attach rejected by server: {}", ename);
                Err(ClientError::ServerError(ename))
            },
            _ => {
                self.fids.release(fid);
                self.phase = Phase::Closed;
                warn!("attach reply carried an unexpected message type");
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Walk from `fid` through `names`, yielding a new fid (spec.md
    /// §4.4's `walk`). A partial walk releases the new fid and returns
    /// [`ClientError::WalkPartial`] with the number of names actually
    /// resolved.
    pub fn walk<'s>(&'s mut self, fid: u32, names: &[&str]) -> Result<'s, WalkResult> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        if names.len() > MAX_WALK_NAMES {
            return Err(ClientError::InvalidArgument);
        }
        let newfid = self.alloc_fid()?;
        let tag = match self.alloc_tag() {
            Ok(t) => t,
            Err(e) => {
                self.fids.release(newfid);
                return Err(e);
            },
        };

        let msg = Tmsg::Walk { fid, newfid, wnames: names };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                self.fids.release(newfid);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.fids.release(newfid);
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Walk { wqids } => {
                let k = wqids.len() as u16;
                let nwname = names.len() as u16;
                if k < nwname {
                    self.fids.release(newfid);
                    Err(ClientError::WalkPartial(k))
                } else {
                    Ok(WalkResult { newfid, wqids })
                }
            },
            Rmsg::Error { ename } => {
                self.fids.release(newfid);
                Err(ClientError::ServerError(ename))
            },
            _ => {
                self.fids.release(newfid);
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Open `fid` for I/O (spec.md §4.4's `open`). A zero `iounit` from
    /// the server is replaced with `msize - IOHDRSZ`.
    pub fn open<'s>(&'s mut self, fid: u32, mode: u8) -> Result<'s, Qid> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Open { fid, mode };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Open { qid, iounit } => {
                self.iounits[fid as usize] = if iounit == 0 { self.msize.saturating_sub(IOHDRSZ) } else { iounit };
                Ok(qid)
            },
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Create `name` under `fid` and open it (spec.md §4.4, `Tcreate`
    /// row of §4.2's table). On success `fid` itself now refers to the
    /// newly created file, per 9P semantics.
    pub fn create<'s>(&'s mut self, fid: u32, name: &str, perm: u32, mode: u8) -> Result<'s, Qid> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Create { fid, name, perm, mode };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Create { qid, iounit } => {
                self.iounits[fid as usize] = if iounit == 0 { self.msize.saturating_sub(IOHDRSZ) } else { iounit };
                Ok(qid)
            },
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Read up to `count` bytes from `fid` at `offset` (spec.md §4.4's
    /// `read`). The result borrows the receive buffer and is valid only
    /// until the next operation on this session. `count` is clipped to
    /// the fid's `iounit`.
    pub fn read<'s>(&'s mut self, fid: u32, offset: u64, count: u32) -> Result<'s, &'s [u8]> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let iounit = self.effective_iounit(fid);
        let clipped = count.min(iounit);
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Read { fid, offset, count: clipped };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Read { data } => {
                if data.len() as u32 > clipped {
                    self.phase = Phase::Closed;
                    return Err(ClientError::ProtocolViolation);
                }
                Ok(data)
            },
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Write `data` to `fid` at `offset` (spec.md §4.4's `write`). `data`
    /// is clipped to the fid's `iounit`; the caller loops on a short
    /// return to write the remainder.
    pub fn write<'s>(&'s mut self, fid: u32, offset: u64, data: &[u8]) -> Result<'s, u32> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let iounit = self.effective_iounit(fid) as usize;
        let clipped = &data[..data.len().min(iounit)];
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Write { fid, offset, data: clipped };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Write { count } => Ok(count),
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Fetch `fid`'s directory entry (spec.md §4.4's `stat`).
    pub fn stat<'s>(&'s mut self, fid: u32) -> Result<'s, Dir<'s>> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Stat { fid };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Stat { dir } => Ok(dir),
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Request that `fid`'s directory entry be mutated to `dir` (spec.md
    /// §4.4's `wstat`). The server may reject any individual field.
    pub fn wstat<'s>(&'s mut self, fid: u32, dir: Dir<'_>) -> Result<'s, ()> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Wstat { fid, dir };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Wstat => Ok(()),
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Clunk `fid` (spec.md §4.4's `clunk`). Releases the fid
    /// unconditionally, even on `Rerror` — clunking an already-clunked
    /// fid is rejected locally as [`ClientError::UnknownFid`] without
    /// contacting the server (spec.md §8 invariant 6).
    pub fn clunk<'s>(&'s mut self, fid: u32) -> Result<'s, ()> {
        self.clunk_like(fid, false)
    }

    /// Remove `fid`'s file and clunk it (spec.md §4.4's `remove`). Same
    /// unconditional-release contract as [`Session::clunk`].
    pub fn remove<'s>(&'s mut self, fid: u32) -> Result<'s, ()> {
        self.clunk_like(fid, true)
    }

    fn clunk_like<'s>(&'s mut self, fid: u32, is_remove: bool) -> Result<'s, ()> {
        if !self.fids.contains(fid) {
            return Err(ClientError::UnknownFid);
        }
        let tag = self.alloc_tag()?;
        let msg = if is_remove { Tmsg::Remove { fid } } else { Tmsg::Clunk { fid } };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                self.fids.release(fid);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let result = exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag);
        self.fids.release(fid);

        let received = match result {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                warn!("clunk/remove exchange failed, closing session");
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Clunk | Rmsg::Remove => {
                debug!("fid {} released", fid);
                Ok(())
            },
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    /// Flush the outstanding request tagged `oldtag` (spec.md §4.4's
    /// `flush`). Uses a freshly allocated tag for the `Tflush` itself.
    pub fn flush<'s>(&'s mut self, oldtag: u16) -> Result<'s, ()> {
        let tag = self.alloc_tag()?;
        let msg = Tmsg::Flush { oldtag };
        let n = match msg.marshal(tag, self.msize, &mut self.send_buf) {
            Ok(n) => n,
            Err(e) => {
                self.tags.release(tag);
                return Err(e.into());
            },
        };

        let cap = self.current_cap();
        let received = match exchange(&mut self.transport, &self.send_buf, n, &mut self.recv_buf, cap, tag) {
            Ok(r) => r,
            Err(f) => {
                self.phase = Phase::Closed;
                return Err(f.into());
            },
        };
        self.tags.release(tag);

        match received.msg {
            Rmsg::Flush => Ok(()),
            Rmsg::Error { ename } => Err(ClientError::ServerError(ename)),
            _ => {
                self.phase = Phase::Closed;
                Err(ClientError::ProtocolViolation)
            },
        }
    }

    fn effective_iounit(&self, fid: u32) -> u32 {
        let stored = self.iounits[fid as usize];
        if stored == 0 {
            self.msize.saturating_sub(IOHDRSZ)
        } else {
            stored
        }
    }
}
