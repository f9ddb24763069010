//! Synchronous, statically-sized 9P2000 session engine.
//!
//! Built on [`ninep_proto`]'s wire codec. Owns the tag and fid
//! allocators (C3) and drives the request/response state machine (C4)
//! over an opaque [`Transport`]. `no_std` by default; enable the `std`
//! feature for [`StdTransport`], a convenience adapter over
//! `std::io::{Read, Write}`.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod alloc_table;
pub mod error;
pub mod session;
pub mod transport;

pub use alloc_table::{FidTable, TagTable};
pub use error::{ClientError, Result};
pub use session::{Phase, Session, SessionConfig, WalkResult};
pub use transport::Transport;

#[cfg(feature = "std")]
pub use transport::StdTransport;
