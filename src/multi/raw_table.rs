//! Raw-allocation side table
//!
//! Requests larger than every configured size class are served straight
//! from the general heap and tracked in a mutex-guarded map from block
//! base address to requested size. The map holds exactly one entry per
//! live raw allocation; a free or realloc that finds no entry indicates
//! corruption and degrades to a safe no-op in release builds.

use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::warn;

use super::header::{self, BLOCK_ALIGN, HEADER_SIZE};
use crate::error::{AllocError, AllocResult};

#[cfg(debug_assertions)]
use crate::validate::MemoryValidator;

/// Layout of a raw block for a payload of `size` bytes.
///
/// Only called for sizes that were validated when the block was
/// allocated, so construction cannot fail.
fn raw_layout(size: u32) -> Layout {
    Layout::from_size_align(HEADER_SIZE + size as usize, BLOCK_ALIGN)
        .expect("raw layout was validated at allocation time")
}

/// Mutex-guarded map of live oversized allocations
pub(crate) struct RawTable {
    /// base address -> requested payload size
    entries: Mutex<HashMap<usize, u32>>,
    /// Sum of live payload sizes, for lock-free stats reads
    total_bytes: AtomicUsize,
}

impl RawTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            total_bytes: AtomicUsize::new(0),
        }
    }

    /// Allocates `size` payload bytes from the general heap and tracks
    /// the block. On heap failure no bookkeeping happens.
    pub(crate) fn alloc(&self, size: usize) -> AllocResult<NonNull<u8>> {
        let stored: u32 = size.try_into().map_err(|_| AllocError::SizeOverflow)?;
        let total = HEADER_SIZE
            .checked_add(size)
            .ok_or(AllocError::SizeOverflow)?;
        let layout =
            Layout::from_size_align(total, BLOCK_ALIGN).map_err(|_| AllocError::SizeOverflow)?;

        // SAFETY: layout has non-zero size (HEADER_SIZE > 0).
        let raw = unsafe { std::alloc::alloc(layout) };
        let base = NonNull::new(raw).ok_or(AllocError::OutOfMemory { size })?;

        // SAFETY: base has room for header + size bytes and is
        // BLOCK_ALIGN-aligned.
        let payload = unsafe { header::attach(base, stored) };

        let prev = self.entries.lock().insert(base.as_ptr() as usize, stored);
        debug_assert!(prev.is_none(), "duplicate raw-table entry");
        self.total_bytes.fetch_add(size, Ordering::Relaxed);

        Ok(payload)
    }

    /// Frees a tracked raw block.
    ///
    /// A missing entry indicates corruption: debug builds assert,
    /// release builds log and leave the pointer alone rather than crash.
    ///
    /// # Safety
    /// `payload` must have been returned by [`alloc`](Self::alloc) or
    /// [`realloc`](Self::realloc) on this table and not freed since.
    pub(crate) unsafe fn free(&self, payload: NonNull<u8>) {
        // SAFETY: caller contract; payload carries a header.
        let base = unsafe { header::base_of(payload) };
        let removed = self.entries.lock().remove(&(base.as_ptr() as usize));

        let Some(size) = removed else {
            debug_assert!(false, "freeing untracked raw allocation");
            warn!(
                ptr = base.as_ptr() as usize,
                "raw free: pointer not tracked, ignoring"
            );
            return;
        };

        self.total_bytes.fetch_sub(size as usize, Ordering::Relaxed);
        // SAFETY: base was allocated with exactly this layout and its
        // entry has been removed, so no one else can free it again.
        unsafe {
            std::alloc::dealloc(base.as_ptr(), raw_layout(size));
        }
    }

    /// Resizes a tracked raw block in place or by moving it.
    ///
    /// On heap failure the stale entry is removed and the call fails;
    /// the old block is deliberately written off rather than left
    /// half-tracked (documented leak trade-off).
    ///
    /// # Safety
    /// Same contract as [`free`](Self::free).
    pub(crate) unsafe fn realloc(
        &self,
        payload: NonNull<u8>,
        new_size: usize,
    ) -> AllocResult<NonNull<u8>> {
        let stored: u32 = new_size.try_into().map_err(|_| AllocError::SizeOverflow)?;
        let total = HEADER_SIZE
            .checked_add(new_size)
            .ok_or(AllocError::SizeOverflow)?;

        // SAFETY: caller contract; payload carries a header.
        let base = unsafe { header::base_of(payload) };
        let key = base.as_ptr() as usize;

        let mut entries = self.entries.lock();
        let Some(&old_size) = entries.get(&key) else {
            debug_assert!(false, "realloc of untracked raw allocation");
            return Err(AllocError::UntrackedPointer);
        };

        // SAFETY: base was allocated with raw_layout(old_size); the new
        // size is non-zero.
        let moved = unsafe { std::alloc::realloc(base.as_ptr(), raw_layout(old_size), total) };

        let Some(new_base) = NonNull::new(moved) else {
            entries.remove(&key);
            self.total_bytes
                .fetch_sub(old_size as usize, Ordering::Relaxed);
            return Err(AllocError::OutOfMemory { size: new_size });
        };

        entries.remove(&key);
        let prev = entries.insert(new_base.as_ptr() as usize, stored);
        debug_assert!(prev.is_none(), "duplicate raw-table entry after realloc");
        drop(entries);

        self.total_bytes
            .fetch_add(new_size - old_size as usize, Ordering::Relaxed);

        // SAFETY: new_base has room for header + new_size bytes.
        Ok(unsafe { header::attach(new_base, stored) })
    }

    /// Number of live raw allocations
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Sum of live raw payload bytes
    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Frees every tracked block.
    ///
    /// # Safety
    /// Invalidates all outstanding raw pointers; the caller must
    /// guarantee none is still in use.
    pub(crate) unsafe fn clear(&self) {
        let mut entries = self.entries.lock();
        for (base, size) in entries.drain() {
            // SAFETY: every entry maps a live base pointer to the size it
            // was allocated with.
            unsafe {
                std::alloc::dealloc(base as *mut u8, raw_layout(size));
            }
        }
        self.total_bytes.store(0, Ordering::Relaxed);
    }

    /// Reports every live raw allocation to a memory validator.
    #[cfg(debug_assertions)]
    pub(crate) fn validate(&self, validator: &mut dyn MemoryValidator, name: &str) {
        let entries = self.entries.lock();
        for (&base, &size) in entries.iter() {
            let payload = (base + HEADER_SIZE) as *mut u8;
            // SAFETY: base + HEADER_SIZE is inside a live allocation.
            let ptr = unsafe { NonNull::new_unchecked(payload) };
            validator.claim_block(ptr, size as usize, name);
        }
    }
}

impl Drop for RawTable {
    fn drop(&mut self) {
        // Hard shutdown sweep: anything still tracked is released, not
        // reported as a leak.
        // SAFETY: dropping the table means no caller can use its
        // pointers afterwards.
        unsafe { self.clear() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_tracks_one_entry() {
        let table = RawTable::new();
        let p = table.alloc(5000).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.total_bytes(), 5000);
        unsafe {
            assert_eq!(header::stored_size(p), 5000);
            table.free(p);
        }
        assert_eq!(table.len(), 0);
        assert_eq!(table.total_bytes(), 0);
    }

    #[test]
    fn realloc_moves_tracking_with_block() {
        let table = RawTable::new();
        let p = table.alloc(4096).unwrap();
        unsafe {
            core::ptr::write_bytes(p.as_ptr(), 0xAC, 4096);
            let q = table.realloc(p, 8192).unwrap();
            assert_eq!(header::stored_size(q), 8192);
            assert_eq!(table.len(), 1);
            assert_eq!(table.total_bytes(), 8192);
            // Prefix of the old contents survives the move.
            for i in [0usize, 1, 4095] {
                assert_eq!(*q.as_ptr().add(i), 0xAC);
            }
            table.free(q);
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn clear_frees_everything() {
        let table = RawTable::new();
        for _ in 0..8 {
            table.alloc(10_000).unwrap();
        }
        assert_eq!(table.len(), 8);
        unsafe { table.clear() };
        assert_eq!(table.len(), 0);
        assert_eq!(table.total_bytes(), 0);
    }

    #[test]
    fn drop_sweeps_live_entries() {
        let table = RawTable::new();
        table.alloc(100_000).unwrap();
        table.alloc(200_000).unwrap();
        drop(table); // must not leak or double-free
    }
}
