//! Little-endian fixed-width and length-prefixed primitives (spec.md C1).
//!
//! Adapted from the teacher's `Encoder`/`Decoder` pair in
//! `rs9p-rs9p/crates/rs9p/src/serialize.rs`, which wraps
//! `byteorder::{ReadBytesExt, WriteBytesExt}` over `std::io::{Read, Write}`.
//! That pair needs `std::io`, which this crate cannot depend on (the
//! session engine must run without an allocator or an OS). Here the same
//! `byteorder` dependency is instead used through `ByteOrder`'s slice-level
//! associated functions (`LittleEndian::read_u32`, `write_u32`), which only
//! need `&[u8]`/`&mut [u8]` and therefore work in `no_std`.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CodecError, Result};
use crate::qid::Qid;

/// A forward-only reader over a byte slice with a declared body limit.
///
/// `data` is the physical bytes available (e.g. the engine's receive
/// buffer, filled up to however many bytes the transport returned).
/// `body_end` is the offset, within `data`, at which the *declared*
/// message body ends (`size - 7` bytes after the header, per spec.md
/// §4.2). The two are tracked separately so that a string whose declared
/// length would run past the declared body — but not past the physical
/// buffer — is rejected as [`CodecError::StringTooLong`] rather than
/// silently reading into the next frame's bytes.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    body_end: usize,
}

impl<'a> Cursor<'a> {
    /// Build a cursor over `data`, with the declared body ending at `body_end`.
    pub fn new(data: &'a [u8], body_end: usize) -> Self {
        Self { data, pos: 0, body_end }
    }

    /// Bytes left before the declared body ends (may exceed `data.len()`
    /// only if the caller mis-set `body_end`; callers in this crate never
    /// do that).
    pub fn body_remaining(&self) -> usize {
        self.body_end.saturating_sub(self.pos)
    }

    /// Current offset from the start of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(CodecError::ShortBuffer);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u16`.
    pub fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    /// Read a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a little-endian `u64`.
    pub fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Read a 2-byte-length-prefixed UTF-8 string, borrowed from the
    /// underlying buffer.
    ///
    /// Fails with [`CodecError::StringTooLong`] if the declared length
    /// exceeds what remains of the declared message body, independent of
    /// how much physical buffer is left. Fails with
    /// [`CodecError::ShortBuffer`] if the prefix or body bytes themselves
    /// overrun the physical buffer, and with [`CodecError::MalformedBody`]
    /// if the bytes are not valid UTF-8 (9P2000 mandates UTF-8 payloads).
    pub fn string(&mut self) -> Result<&'a str> {
        let n = self.u16()? as usize;
        if n > self.body_remaining() {
            return Err(CodecError::StringTooLong);
        }
        let bytes = self.take(n)?;
        core::str::from_utf8(bytes).map_err(|_| CodecError::MalformedBody)
    }

    /// Read a 13-byte qid: type(1), version(4), path(8).
    pub fn qid(&mut self) -> Result<Qid> {
        let typ = self.u8()?;
        let version = self.u32()?;
        let path = self.u64()?;
        Ok(Qid::new(typ, version, path))
    }

    /// Read `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }
}

/// A forward-only, bounded-capacity writer over a mutable byte slice.
///
/// Mirrors [`Cursor`] on the encode side. Appends never allocate; writing
/// past the slice's capacity fails with [`CodecError::BufferFull`]
/// instead of growing the buffer, per spec.md §4.1.
pub struct Writer<'a> {
    data: &'a mut [u8],
    len: usize,
}

impl<'a> Writer<'a> {
    /// Wrap `data` for writing from offset 0.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, len: 0 }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        if self.len + bytes.len() > self.data.len() {
            return Err(CodecError::BufferFull);
        }
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Write a single byte.
    pub fn u8(&mut self, v: u8) -> Result<()> {
        self.push(&[v])
    }

    /// Write a little-endian `u16`.
    pub fn u16(&mut self, v: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, v);
        self.push(&buf)
    }

    /// Write a little-endian `u32`.
    pub fn u32(&mut self, v: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, v);
        self.push(&buf)
    }

    /// Write a little-endian `u64`.
    pub fn u64(&mut self, v: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, v);
        self.push(&buf)
    }

    /// Write a 2-byte-length-prefixed UTF-8 string. Fails with
    /// [`CodecError::StringTooLong`] if `s` is longer than `u16::MAX`.
    pub fn string(&mut self, s: &str) -> Result<()> {
        if s.len() > u16::MAX as usize {
            return Err(CodecError::StringTooLong);
        }
        self.u16(s.len() as u16)?;
        self.push(s.as_bytes())
    }

    /// Write a 13-byte qid.
    pub fn qid(&mut self, qid: &Qid) -> Result<()> {
        self.u8(qid.raw_type())?;
        self.u32(qid.version())?;
        self.u64(qid.path())
    }

    /// Write raw bytes verbatim.
    pub fn bytes(&mut self, b: &[u8]) -> Result<()> {
        self.push(b)
    }

    /// Overwrite `len` bytes starting at `offset` — used to patch the
    /// reserved outer `size` field once the frame's total length is known
    /// (spec.md §4.2's "reserves four bytes ... overwrites the reserved
    /// bytes with the final total length").
    pub fn patch_u32(&mut self, offset: usize, v: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, v);
        self.data[offset..offset + 4].copy_from_slice(&buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scalars() {
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        w.u8(7).unwrap();
        w.u16(0x1234).unwrap();
        w.u32(0xdead_beef).unwrap();
        w.u64(0x0123_4567_89ab_cdef).unwrap();
        let len = w.len();

        let mut c = Cursor::new(&buf[..len], len);
        assert_eq!(c.u8().unwrap(), 7);
        assert_eq!(c.u16().unwrap(), 0x1234);
        assert_eq!(c.u32().unwrap(), 0xdead_beef);
        assert_eq!(c.u64().unwrap(), 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn string_round_trip() {
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        w.string("testfile").unwrap();
        let len = w.len();

        let mut c = Cursor::new(&buf[..len], len);
        assert_eq!(c.string().unwrap(), "testfile");
    }

    #[test]
    fn string_too_long_rejected_against_declared_body() {
        // Declare a body that ends right after the 2-byte length prefix,
        // even though the physical buffer has more bytes behind it.
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        w.string("testfile").unwrap();

        let mut c = Cursor::new(&buf, 2);
        assert_eq!(c.string(), Err(CodecError::StringTooLong));
    }

    #[test]
    fn short_buffer_on_underrun() {
        let buf = [0u8; 1];
        let mut c = Cursor::new(&buf, 1);
        assert_eq!(c.u32(), Err(CodecError::ShortBuffer));
    }

    #[test]
    fn buffer_full_on_overflow() {
        let mut buf = [0u8; 1];
        let mut w = Writer::new(&mut buf);
        assert_eq!(w.u16(1), Err(CodecError::BufferFull));
    }
}
