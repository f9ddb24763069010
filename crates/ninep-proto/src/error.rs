//! Error representation for the 9P2000 wire codec.
//!
//! 9P2000 reports server-side failures as strings (`Rerror`), not errno
//! values — unlike 9P2000.L, which reports errno directly (see
//! `rs9p`'s `RlError`). `CodecError` instead covers failures the codec
//! itself detects while framing and parsing, before any `Rerror` body
//! is even looked at.

use core::fmt;

/// Failure while packing or unpacking a 9P2000 frame or one of its fields.
///
/// Every variant here corresponds to one of the rejections spelled out
/// in spec.md §4.1/§4.2; the session engine promotes all of them to a
/// closed session (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes remained in the source than the field being read requires.
    ShortBuffer,
    /// A write would have exceeded the destination buffer's capacity.
    BufferFull,
    /// A length-prefixed string's declared length exceeds the bytes left
    /// in the containing message body.
    StringTooLong,
    /// The outer `size` field was smaller than the minimum frame (7 bytes).
    ShortHeader,
    /// The outer `size` field exceeds the negotiated `msize`.
    Oversize,
    /// The outer `size` field exceeds the bytes actually available.
    Truncated,
    /// The `type` byte is not one of the defined 9P2000 R-message types.
    UnknownType,
    /// The body did not parse exactly within `size - 7` bytes (underrun or
    /// leftover bytes), or a nested length (e.g. `stat`'s inner size) was
    /// inconsistent with its container.
    MalformedBody,
    /// The `type` byte decoded to a defined T-message where an R-message
    /// was expected (a server replying with a request type).
    ProtocolTypeNotR,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ShortBuffer => "short buffer",
            Self::BufferFull => "buffer full",
            Self::StringTooLong => "string too long",
            Self::ShortHeader => "frame header too short",
            Self::Oversize => "frame exceeds negotiated msize",
            Self::Truncated => "frame truncated",
            Self::UnknownType => "unknown message type",
            Self::MalformedBody => "malformed message body",
            Self::ProtocolTypeNotR => "reply carried a request message type",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// Result alias used throughout the codec.
pub type Result<T> = core::result::Result<T, CodecError>;
