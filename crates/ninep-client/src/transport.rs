//! The blocking byte-stream abstraction the session engine is built on
//! (spec.md §6).
//!
//! The session engine performs its own framing; a `Transport` need only
//! deliver a reliable, ordered byte stream. Grounded on
//! `Superpat-ad/crates/ninep/src/client.rs`'s `Socket` enum, which wraps
//! `UnixStream`/`TcpStream` behind a small blocking read/write surface —
//! generalized here into a trait so the core stays free of any concrete
//! transport, socket or otherwise.

/// A blocking, ordered, reliable byte stream.
///
/// Implementors need not be buffered; the session engine calls `recv`
/// in a loop until a full frame has arrived.
pub trait Transport {
    /// Transport-specific I/O failure.
    type Error;

    /// Write `buf` in full. Returns the number of bytes written, which
    /// a conforming implementation makes equal to `buf.len()` on success.
    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Read at most `buf.len()` bytes into `buf`. Returns the number of
    /// bytes read; 0 means the peer has closed the stream.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Release any underlying resource. Idempotent.
    fn close(&mut self);
}

/// Adapter from `std::io::{Read, Write}` to [`Transport`], for hosted
/// callers and the conformance harness. Not part of the core contract —
/// it performs no framing of its own, just byte forwarding.
#[cfg(feature = "std")]
pub struct StdTransport<S> {
    inner: S,
}

#[cfg(feature = "std")]
impl<S> StdTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[cfg(feature = "std")]
impl<S: std::io::Read + std::io::Write> Transport for StdTransport<S> {
    type Error = std::io::Error;

    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        use std::io::Write;
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        use std::io::Read;
        self.inner.read(buf)
    }

    fn close(&mut self) {}
}
