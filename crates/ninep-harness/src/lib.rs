//! In-process conformance harness (spec.md §4.5, C5).
//!
//! An in-process mock server and a control handle connected by two
//! shared byte queues — standing in for spec.md §6's "line-oriented
//! text channel on which the harness writes a command name; the mock
//! server responds on the main channel with the corresponding
//! malformed/edge reply". Conceptually grounded on
//! `mitander-lockframe/crates/lockframe-harness`'s simulated-server
//! pattern (a test-only peer a client talks to without a real socket),
//! adapted from that crate's turmoil-driven async server to a plain
//! synchronous queue since this engine has no async runtime.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ninep_client::Transport;
use ninep_proto::{Cursor, Dir, MsgType, Qid, Writer, DMDIR};

mod command;
pub use command::Command;

/// The seed directory entry spec.md §4.5 fixes for `rstat_success`.
pub fn seed_dir() -> Dir<'static> {
    Dir {
        typ: 9001,
        dev: 5,
        qid: Qid::new(23, 2342, 1337),
        mode: DMDIR,
        atime: 1_494_443_596,
        mtime: 1_494_443_609,
        length: 2342,
        name: "testfile",
        uid: "testuser",
        gid: "testgroup",
        muid: "ken",
    }
}

/// Shared state between [`MockTransport`] and [`Controller`].
struct Shared {
    /// Bytes the client will read on its next `recv` calls (the mock
    /// server's queued replies).
    inbound: VecDeque<u8>,
    /// Bytes the client has written (the mock server's view of what it
    /// was sent), retained for assertions.
    outbound: VecDeque<u8>,
}

/// The [`Transport`] implementation the client session drives.
pub struct MockTransport {
    shared: Rc<RefCell<Shared>>,
}

impl Transport for MockTransport {
    type Error = ();

    fn send(&mut self, buf: &[u8]) -> Result<usize, ()> {
        self.shared.borrow_mut().outbound.extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let mut shared = self.shared.borrow_mut();
        let n = buf.len().min(shared.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = shared.inbound.pop_front().expect("checked length above");
        }
        Ok(n)
    }

    fn close(&mut self) {}
}

/// The test-side handle: arms canned replies and inspects what the
/// client actually sent.
pub struct Controller {
    shared: Rc<RefCell<Shared>>,
}

impl Controller {
    /// Queue `cmd`'s bytes for the client's next `recv` call(s).
    pub fn arm(&self, cmd: Command) {
        self.shared.borrow_mut().inbound.extend(cmd.bytes());
    }

    /// Queue raw bytes directly, for ad hoc frames a `Command` variant
    /// does not cover.
    pub fn arm_bytes(&self, bytes: Vec<u8>) {
        self.shared.borrow_mut().inbound.extend(bytes);
    }

    /// Drain and return everything the client has sent so far.
    pub fn sent(&self) -> Vec<u8> {
        self.shared.borrow_mut().outbound.drain(..).collect()
    }
}

/// Build a connected `(MockTransport, Controller)` pair.
pub fn mock_pair() -> (MockTransport, Controller) {
    let shared = Rc::new(RefCell::new(Shared { inbound: VecDeque::new(), outbound: VecDeque::new() }));
    (MockTransport { shared: shared.clone() }, Controller { shared })
}

/// Build a raw frame: `size[4] type[1] tag[2] ...body...`, with `body`
/// writing directly into the frame buffer via [`Writer`]. Used by
/// [`command::Command::bytes`] and directly by tests driving frames no
/// named command covers.
pub fn build_frame(typ: u8, tag: u16, cap: usize, body: impl FnOnce(&mut Writer<'_>)) -> Vec<u8> {
    let mut buf = vec![0u8; cap];
    let mut w = Writer::new(&mut buf);
    w.u32(0).expect("reserved size field fits");
    w.u8(typ).expect("type byte fits");
    w.u16(tag).expect("tag fits");
    body(&mut w);
    let len = w.len();
    w.patch_u32(0, len as u32);
    buf.truncate(len);
    buf
}

/// Encode `dir` the way a server would for `Rstat`/`Twstat`: a 2-byte
/// outer `nstat`, then the inner-size-prefixed stat blob.
pub fn write_dir(w: &mut Writer<'_>, dir: &Dir<'_>) {
    w.u16(dir.nstat()).expect("seed dir fits harness buffer");
    dir.encode_stat_blob(w).expect("seed dir fits harness buffer");
}

/// Read back a frame's leading fields, for assertions against what the
/// client sent. Exposed so tests can check e.g. that a `Tversion` the
/// client sent carries the expected `msize`.
pub fn peek_header(bytes: &[u8]) -> (u32, u8, u16) {
    let mut c = Cursor::new(bytes, bytes.len());
    let size = c.u32().unwrap();
    let typ = c.u8().unwrap();
    let tag = c.u16().unwrap();
    (size, typ, tag)
}
