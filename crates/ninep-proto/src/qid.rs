//! Qid, the server-assigned unique file identifier (spec.md §3).
//!
//! Grounded on `rs9p-rs9p/crates/rs9p/src/fcall.rs`'s `QIdType` bitflags
//! and `QId` struct, trimmed to the base 9P2000 bits (the teacher also
//! carries `SYMLINK`/`LINK`, which are 9P2000.u additions out of scope
//! here per spec.md §1).

use bitflags::bitflags;

bitflags! {
    /// Bits in a [`Qid`]'s type byte.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct QidType: u8 {
        /// The file is a directory.
        const DIR    = 0x80;
        /// The file is append-only.
        const APPEND = 0x40;
        /// The file is exclusive-use.
        const EXCL   = 0x20;
        /// The file is a mounted channel.
        const MOUNT  = 0x10;
        /// The file is an authentication file.
        const AUTH   = 0x08;
        /// The file is not backed up.
        const TMP    = 0x04;
        /// A plain file — no bits set.
        const FILE   = 0x00;
    }
}

/// A 13-byte server-assigned file identifier (spec.md §3).
///
/// Two files are the same iff their `path`s are equal; a `version` bump
/// means the content changed underneath an unchanged `path`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Qid {
    typ: u8,
    version: u32,
    path: u64,
}

impl Qid {
    /// Build a qid from its three wire fields.
    pub fn new(typ: u8, version: u32, path: u64) -> Self {
        Self { typ, version, path }
    }

    /// The type bitfield, decoded. Unrecognized bits are preserved by
    /// [`Qid::raw_type`] but dropped here — a future protocol revision's
    /// type bit must not make an otherwise-valid qid unreadable.
    pub fn kind(&self) -> QidType {
        QidType::from_bits_truncate(self.typ)
    }

    /// The type byte, exactly as it arrived on the wire.
    pub fn raw_type(&self) -> u8 {
        self.typ
    }

    /// Per-file revision counter.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Identifier unique among all files the server has ever served.
    pub fn path(&self) -> u64 {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_means_same_file() {
        let a = Qid::new(QidType::FILE.bits(), 1, 42);
        let b = Qid::new(QidType::FILE.bits(), 2, 42);
        assert_eq!(a.path(), b.path());
        assert_ne!(a.version(), b.version());
    }

    #[test]
    fn directory_bit_roundtrips() {
        let q = Qid::new(QidType::DIR.bits(), 0, 1);
        assert!(q.kind().contains(QidType::DIR));
    }
}
