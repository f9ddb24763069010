//! Wire format and bit-exact codec for the 9P2000 protocol.
//!
//! This crate owns the parts of the system that never touch a socket:
//! the byte-level primitives ([`codec`]), the qid type ([`qid`]), and the
//! T/R message shapes with their marshal/unmarshal rules ([`message`]).
//! It is `no_std` so that the session engine built on top of it
//! (`ninep-client`) can run on a target with no allocator and no OS.
//!
//! Grounded on `rs9p-rs9p/crates/rs9p/src/{fcall,serialize}.rs`, adapted
//! from an async 9P2000.L server codec to a synchronous 9P2000 client one.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod codec;
pub mod error;
pub mod message;
pub mod qid;

pub use codec::{Cursor, Writer};
pub use error::{CodecError, Result};
pub use message::{
    open_mode, Dir, MsgType, Received, Rmsg, Tmsg, WalkQids, DMDIR, IOHDRSZ, MAX_WALK_NAMES,
    MIN_FRAME_LEN, MIN_MSIZE, NOFID, NOTAG,
};
pub use qid::{Qid, QidType};
