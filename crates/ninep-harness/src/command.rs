//! Named malformed/edge-case replies (spec.md §4.5's command table).
//!
//! Each [`Command`] variant is one row of that table: a byte sequence a
//! real 9P server could never legitimately produce, built by hand (not
//! through [`crate::build_frame`]'s normal patched-size path, where the
//! row specifically depends on a wrong or inconsistent size field).

use ninep_proto::{MsgType, NOTAG};

use crate::{build_frame, seed_dir, write_dir};

/// One row of spec.md §4.5's conformance command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    HeaderTooShort1,
    HeaderTooShort2,
    HeaderTooLarge,
    HeaderWrongType,
    HeaderInvalidType,
    HeaderTagMismatch,
    HeaderTypeMismatch,
    RversionSuccess,
    RversionUnknown,
    RversionMsizeTooBig,
    RversionInvalid,
    RversionInvalidLen,
    RversionVersionTooLong,
    RattachSuccess,
    RattachInvalidLen,
    RstatSuccess,
    RstatNstatInvalid,
}

impl Command {
    /// The raw bytes a mock server would send for this command.
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Command::HeaderTooShort1 => vec![0u8],

            Command::HeaderTooShort2 => {
                // size=6, below MIN_FRAME_LEN; the two trailing bytes are
                // never reached once the size prefix alone is rejected.
                vec![6, 0, 0, 0, 0, 0]
            },

            Command::HeaderTooLarge => {
                // size=42 declared, no body delivered: the read loop
                // stalls and the queue runs dry before `want` is reached.
                42u32.to_le_bytes().to_vec()
            },

            Command::HeaderWrongType => build_frame(MsgType::Tversion as u8, NOTAG, 64, |w| {
                w.u32(8192).unwrap();
                w.string("9P2000").unwrap();
            }),

            Command::HeaderInvalidType => build_frame(200, 0, 16, |_w| {}),

            // Same wire bytes serve both rows: an Rversion with tag 0 is a
            // tag mismatch against a pending Tversion (tag NOTAG), and a
            // type mismatch against any pending non-version request (whose
            // first allocated tag off a fresh table is also 0).
            Command::HeaderTagMismatch | Command::HeaderTypeMismatch => {
                build_frame(MsgType::Rversion as u8, 0, 32, |w| {
                    w.u32(8192).unwrap();
                    w.string("9P2000").unwrap();
                })
            },

            Command::RversionSuccess => build_frame(MsgType::Rversion as u8, NOTAG, 32, |w| {
                w.u32(8192).unwrap();
                w.string("9P2000").unwrap();
            }),

            Command::RversionUnknown => build_frame(MsgType::Rversion as u8, NOTAG, 32, |w| {
                w.u32(8192).unwrap();
                w.string("unknown").unwrap();
            }),

            Command::RversionMsizeTooBig => build_frame(MsgType::Rversion as u8, NOTAG, 32, |w| {
                w.u32(8193).unwrap();
                w.string("9P2000").unwrap();
            }),

            Command::RversionInvalid => build_frame(MsgType::Rversion as u8, NOTAG, 32, |w| {
                w.u32(8192).unwrap();
                w.string("9P20009P2000").unwrap();
            }),

            Command::RversionInvalidLen => {
                // A well-formed frame whose *inner* string length claims one
                // more byte than the body actually carries: the total
                // declared size matches the bytes physically present, so
                // the mismatch surfaces inside the string decode rather
                // than as a short read.
                let mut buf = vec![0u8; 32];
                let mut w = ninep_proto::Writer::new(&mut buf);
                w.u32(0).unwrap();
                w.u8(MsgType::Rversion as u8).unwrap();
                w.u16(NOTAG).unwrap();
                w.u32(8192).unwrap();
                w.u16(7).unwrap(); // claims 7 bytes, only 6 follow
                w.bytes(b"9P2000").unwrap();
                let len = w.len();
                w.patch_u32(0, len as u32);
                buf.truncate(len);
                buf
            },

            Command::RversionVersionTooLong => {
                // A long but internally consistent version string: this
                // engine has no separate static scratch buffer, so it
                // parses cleanly (accepted at the codec layer) and is
                // rejected only at the negotiation layer for not matching
                // the requested version string.
                let long_version: String = "9P2000-".chars().cycle().take(300).collect();
                build_frame(MsgType::Rversion as u8, NOTAG, 512, |w| {
                    w.u32(8192).unwrap();
                    w.string(&long_version).unwrap();
                })
            },

            Command::RattachSuccess => build_frame(MsgType::Rattach as u8, 0, 32, |w| {
                w.qid(&ninep_proto::Qid::new(0, 1, 42)).unwrap();
            }),

            Command::RattachInvalidLen => {
                // A fully-parsed qid followed by one stray trailing byte:
                // the body itself decodes, but the frame's declared size
                // leaves one byte unaccounted for.
                let mut buf = vec![0u8; 32];
                let mut w = ninep_proto::Writer::new(&mut buf);
                w.u32(0).unwrap();
                w.u8(MsgType::Rattach as u8).unwrap();
                w.u16(0).unwrap();
                w.qid(&ninep_proto::Qid::new(0, 1, 42)).unwrap();
                w.u8(0).unwrap(); // stray trailing byte
                let len = w.len();
                w.patch_u32(0, len as u32);
                buf.truncate(len);
                buf
            },

            Command::RstatSuccess => build_frame(MsgType::Rstat as u8, 0, 256, |w| {
                write_dir(w, &seed_dir());
            }),

            Command::RstatNstatInvalid => {
                let mut buf = vec![0u8; 256];
                let mut w = ninep_proto::Writer::new(&mut buf);
                w.u32(0).unwrap();
                w.u8(MsgType::Rstat as u8).unwrap();
                w.u16(0).unwrap();
                w.u16(1337).unwrap(); // claimed nstat
                w.u16(10).unwrap(); // bogus inner size, inconsistent with 1337
                w.bytes(&[0u8; 8]).unwrap();
                let len = w.len();
                w.patch_u32(0, len as u32);
                buf.truncate(len);
                buf
            },
        }
    }
}
