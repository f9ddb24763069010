//! Client-visible error taxonomy (spec.md §7).
//!
//! Grounded on `pfpacket-rust-9p/src/error.rs`'s manual `Display`/
//! `std::error::Error` style (no `thiserror`, since this crate is
//! `no_std` by default) and on `ninep-proto::CodecError`, which every
//! framing variant here wraps verbatim.

use core::fmt;

use ninep_proto::CodecError;

/// Every way a session-engine operation can fail.
///
/// `ename` (on [`ClientError::ServerError`]) borrows directly out of the
/// session's receive buffer, so this type carries the same lifetime as
/// the `Ok` values `Session` operations return. Each variant documents
/// whether it closes the session, per spec.md §7's classification;
/// [`ClientError::closes_session`] turns that into code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError<'a> {
    /// The transport failed to accept a write.
    TransportWrite,
    /// The transport failed to produce bytes when read.
    TransportRead,
    /// The transport reported it is no longer usable.
    TransportClosed,
    /// A framing failure from the wire codec.
    Codec(CodecError),
    /// The R tag did not match the outstanding T tag.
    TagMismatch,
    /// The reply's message type did not correspond to the request that
    /// was pending (e.g. a non-`Rversion` reply to `Tversion`, or a
    /// `Tread` returning more than was requested).
    ProtocolViolation,
    /// `Rversion` negotiated "unknown" or any string other than the one
    /// requested.
    VersionUnsupported,
    /// The server replied `Rerror`.
    ServerError(&'a str),
    /// No free tag slot remained.
    TagsExhausted,
    /// No free fid slot remained.
    FidsExhausted,
    /// The fid named by the caller is not currently in service, or was
    /// already clunked.
    UnknownFid,
    /// The caller supplied an argument the protocol or this engine
    /// rejects outright (e.g. more than 16 walk names).
    InvalidArgument,
    /// A walk only partially succeeded; carries the number of names the
    /// server actually walked. The new fid was not created server-side
    /// and has already been released back to the allocator.
    WalkPartial(u16),
}

impl<'a> ClientError<'a> {
    /// True if this condition leaves the session unusable and a caller
    /// must not issue further operations on it (spec.md §7).
    pub fn closes_session(&self) -> bool {
        match self {
            ClientError::TransportWrite
            | ClientError::TransportRead
            | ClientError::TransportClosed
            | ClientError::Codec(_)
            | ClientError::TagMismatch
            | ClientError::ProtocolViolation
            | ClientError::VersionUnsupported => true,
            ClientError::ServerError(_)
            | ClientError::TagsExhausted
            | ClientError::FidsExhausted
            | ClientError::UnknownFid
            | ClientError::InvalidArgument
            | ClientError::WalkPartial(_) => false,
        }
    }
}

impl<'a> From<CodecError> for ClientError<'a> {
    fn from(e: CodecError) -> Self {
        match e {
            // A T-type byte where an R-message was expected is a
            // correlation failure (spec.md §7), not a wire-encoding one.
            CodecError::ProtocolTypeNotR => ClientError::ProtocolViolation,
            e => ClientError::Codec(e),
        }
    }
}

impl<'a> fmt::Display for ClientError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::TransportWrite => f.write_str("transport write failed"),
            ClientError::TransportRead => f.write_str("transport read failed"),
            ClientError::TransportClosed => f.write_str("transport closed"),
            ClientError::Codec(e) => write!(f, "codec error: {e}"),
            ClientError::TagMismatch => f.write_str("reply tag did not match request"),
            ClientError::ProtocolViolation => f.write_str("protocol violation"),
            ClientError::VersionUnsupported => f.write_str("server version unsupported"),
            ClientError::ServerError(ename) => write!(f, "server error: {ename}"),
            ClientError::TagsExhausted => f.write_str("no free tag available"),
            ClientError::FidsExhausted => f.write_str("no free fid available"),
            ClientError::UnknownFid => f.write_str("fid not in service"),
            ClientError::InvalidArgument => f.write_str("invalid argument"),
            ClientError::WalkPartial(k) => write!(f, "walk only resolved {k} names"),
        }
    }
}

#[cfg(feature = "std")]
impl<'a> std::error::Error for ClientError<'a> {}

/// Result alias used throughout the session engine.
pub type Result<'a, T> = core::result::Result<T, ClientError<'a>>;
