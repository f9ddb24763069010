//! Tag & fid allocation (spec.md §4.3, C3).
//!
//! A compact table with a scan-based free list, sized statically at
//! build time via a const generic — spec.md's "recommended defaults:
//! 16 outstanding tags, 32 live fids" become the default type parameters
//! on [`Session`](crate::session::Session) rather than a runtime
//! capacity. Grounded on the fid/tag bookkeeping `rs9p-rs9p`'s
//! `srv.rs` does with a `HashMap`, adapted away from heap-backed maps
//! to `[Option<T>; N]` since this crate is `no_std`.

use ninep_proto::{NOFID, NOTAG};

/// Table of outstanding request tags, excluding the reserved [`NOTAG`].
pub struct TagTable<const N: usize> {
    slots: [bool; N],
}

impl<const N: usize> TagTable<N> {
    pub fn new() -> Self {
        Self { slots: [false; N] }
    }

    /// Allocate the lowest-numbered free tag. `None` if the table is
    /// full (spec.md's `TagsExhausted`).
    pub fn alloc(&mut self) -> Option<u16> {
        for (i, used) in self.slots.iter_mut().enumerate() {
            if !*used {
                *used = true;
                let tag = i as u16;
                debug_assert_ne!(tag, NOTAG, "tag table must not reach NOTAG");
                return Some(tag);
            }
        }
        None
    }

    /// Release a tag back to the free list.
    ///
    /// Releasing a tag that was not allocated is a programming error:
    /// it panics in debug builds and is a silent no-op in release,
    /// matching spec.md §4.3's "double-free is a programming error
    /// (fatal in debug, silent in release)".
    pub fn release(&mut self, tag: u16) {
        let idx = tag as usize;
        debug_assert!(idx < N, "tag out of range");
        debug_assert!(self.slots.get(idx).copied().unwrap_or(false), "double free of tag");
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = false;
        }
    }

    /// Capacity of this table.
    pub fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for TagTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Table of fids currently in service, excluding the reserved [`NOFID`].
pub struct FidTable<const N: usize> {
    slots: [bool; N],
}

impl<const N: usize> FidTable<N> {
    pub fn new() -> Self {
        Self { slots: [false; N] }
    }

    /// Allocate the lowest-numbered free fid. `None` if the table is
    /// full (spec.md's `FidsExhausted`).
    pub fn alloc(&mut self) -> Option<u32> {
        for (i, used) in self.slots.iter_mut().enumerate() {
            if !*used {
                *used = true;
                let fid = i as u32;
                debug_assert_ne!(fid, NOFID, "fid table must not reach NOFID");
                return Some(fid);
            }
        }
        None
    }

    /// True if `fid` is currently in service.
    pub fn contains(&self, fid: u32) -> bool {
        self.slots.get(fid as usize).copied().unwrap_or(false)
    }

    /// Release a fid back to the free list. A no-op if it was not held,
    /// so callers can release unconditionally on any clunk outcome
    /// (spec.md §4.4's clunk/remove invariant) without checking first.
    pub fn release(&mut self, fid: u32) {
        if let Some(slot) = self.slots.get_mut(fid as usize) {
            *slot = false;
        }
    }

    /// Capacity of this table.
    pub fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for FidTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_reuse_after_release() {
        let mut t: TagTable<4> = TagTable::new();
        let a = t.alloc().unwrap();
        t.release(a);
        let b = t.alloc().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tag_exhaustion() {
        let mut t: TagTable<2> = TagTable::new();
        assert!(t.alloc().is_some());
        assert!(t.alloc().is_some());
        assert!(t.alloc().is_none());
    }

    #[test]
    fn fid_release_then_contains_false() {
        let mut f: FidTable<4> = FidTable::new();
        let fid = f.alloc().unwrap();
        assert!(f.contains(fid));
        f.release(fid);
        assert!(!f.contains(fid));
    }

    #[test]
    fn fid_double_release_is_noop_in_release_semantics() {
        let mut f: FidTable<4> = FidTable::new();
        let fid = f.alloc().unwrap();
        f.release(fid);
        f.release(fid);
        assert!(!f.contains(fid));
    }
}
