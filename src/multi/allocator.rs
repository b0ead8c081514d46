//! Segregated size-class allocator
//!
//! `MultiPool` fronts a set of fixed-block pools, one per configured
//! size class, plus a general-heap fallback for oversized requests.
//! Every returned pointer hides a 4-byte size prefix, so `free` and
//! `realloc` recover the original request size in O(1) with no lookup
//! for pool-backed allocations.
//!
//! ## Invariants
//!
//! - The size-class table and bucket lookup table are built once at
//!   construction and never mutated afterwards
//! - For any live payload pointer, the prefix holds the size last
//!   requested for it (not the pool's block size)
//! - Requests up to `max_block_size` map to exactly one class via
//!   `(size - 1) >> 5`; larger requests are tracked in the raw table
//! - The raw table holds exactly one entry per live raw allocation

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use super::header;
use super::raw_table::RawTable;
use super::size_class::{ClassTable, SizeClassConfig};
use super::stats::{MultiPoolStats, SizeClassStats};
use crate::error::{AllocError, AllocResult};
use crate::pool::{GrowthPolicy, PoolConfig};

#[cfg(debug_assertions)]
use crate::validate::MemoryValidator;

/// Thread-safe, segregated size-class general-purpose allocator
///
/// Construct one per subsystem and pass it to call sites explicitly;
/// construction and teardown must be externally serialized, everything
/// else may be called concurrently from arbitrary threads.
///
/// # Example
///
/// ```
/// use multipool::{GrowthPolicy, MultiPool, SizeClassConfig};
///
/// let pool = MultiPool::new(
///     &[
///         SizeClassConfig::new(64, 1000),
///         SizeClassConfig::new(256, 500),
///     ],
///     GrowthPolicy::Slow,
/// )
/// .expect("valid size classes");
///
/// let p = pool.alloc(40).unwrap();
/// unsafe {
///     assert_eq!(pool.alloc_size(Some(p)), Some(40));
///     pool.free(Some(p));
/// }
/// ```
pub struct MultiPool {
    classes: ClassTable,
    raw: RawTable,
    /// Cumulative bytes moved by cross-bucket reallocations, for
    /// diagnostics only
    realloc_copied_bytes: AtomicU64,
}

impl MultiPool {
    /// Creates an allocator from ascending size-class configurations.
    ///
    /// `growth` is forwarded opaquely to each class's fixed-block pool.
    ///
    /// # Errors
    /// [`AllocError::InvalidConfig`] if the class list is empty, not
    /// strictly ascending, not 32-byte multiples, or has a zero
    /// capacity; allocation errors if the initial reserves fail.
    pub fn new(configs: &[SizeClassConfig], growth: GrowthPolicy) -> AllocResult<Self> {
        Self::with_config(configs, growth, PoolConfig::default())
    }

    /// Creates an allocator with an explicit pool configuration.
    pub fn with_config(
        configs: &[SizeClassConfig],
        growth: GrowthPolicy,
        pool_config: PoolConfig,
    ) -> AllocResult<Self> {
        Ok(Self {
            classes: ClassTable::build(configs, growth, pool_config)?,
            raw: RawTable::new(),
            realloc_copied_bytes: AtomicU64::new(0),
        })
    }

    /// Largest request served by a size class; anything bigger takes
    /// the raw path.
    pub fn max_block_size(&self) -> usize {
        self.classes.max_block_size() as usize
    }

    /// Allocates `size` bytes.
    ///
    /// Requests within the size classes are O(1) pool pops; larger ones
    /// go to the general heap and are tracked in the raw table.
    ///
    /// # Errors
    /// - [`AllocError::ZeroSize`] for `size == 0` (no side effects)
    /// - [`AllocError::PoolExhausted`] / [`AllocError::OutOfMemory`]
    ///   when the backing store cannot satisfy the request
    pub fn alloc(&self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        if size <= self.max_block_size() {
            let class = self.classes.class_for(size);
            let block = class.pool.alloc()?;
            // SAFETY: the pool block has capacity for the class size
            // plus the header, and size <= class.block_size <= u32::MAX.
            Ok(unsafe { header::attach(block, size as u32) })
        } else {
            self.raw.alloc(size)
        }
    }

    /// Frees a pointer previously returned by this allocator.
    ///
    /// `None` is a no-op. The stored prefix size selects the same
    /// bucket the allocation came from.
    ///
    /// # Safety
    /// `ptr` must have come from this allocator's `alloc`/`realloc` and
    /// must not have been freed since; the memory must not be accessed
    /// afterwards.
    pub unsafe fn free(&self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };

        // SAFETY: caller contract; every live pointer carries a prefix.
        let size = unsafe { header::stored_size(ptr) } as usize;

        if size <= self.max_block_size() {
            let class = self.classes.class_for(size);
            // SAFETY: the payload came from this class's pool (same
            // bucket computation as alloc), shifted by the header.
            unsafe { class.pool.free(header::base_of(ptr)) };
        } else {
            // SAFETY: oversized prefix means the pointer is raw-tracked.
            unsafe { self.raw.free(ptr) };
        }
    }

    /// Resizes an allocation, preserving `min(old, new)` bytes.
    ///
    /// - `None` behaves exactly like [`alloc`](Self::alloc)
    /// - Shrinking never reallocates: the same pointer comes back
    /// - Growing within the current bucket rewrites the prefix in place
    /// - Anything else allocates, copies, and frees the old block
    ///
    /// # Safety
    /// Same contract as [`free`](Self::free) for `ptr`. On success the
    /// old pointer must no longer be used (it may equal the returned
    /// one); on failure it remains valid, except for the documented
    /// raw-path failure where its tracking entry is dropped.
    pub unsafe fn realloc(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> AllocResult<NonNull<u8>> {
        let Some(ptr) = ptr else {
            return self.alloc(new_size);
        };

        // SAFETY: caller contract.
        let old_size = unsafe { header::stored_size(ptr) } as usize;

        // Shrinking is free: keep the block, keep the stored size.
        if new_size <= old_size {
            return Ok(ptr);
        }

        let max = self.max_block_size();

        if old_size > max {
            // SAFETY: oversized prefix means the pointer is raw-tracked.
            return unsafe { self.raw.realloc(ptr, new_size) };
        }

        let class = self.classes.class_for(old_size);
        if new_size <= class.block_size as usize {
            // Same bucket: the block already has room, only the prefix
            // changes. The bucket computed from new_size is this class
            // again, so a later free returns the block correctly.
            // SAFETY: caller contract; capacity checked above.
            unsafe { header::set_size(ptr, new_size as u32) };
            return Ok(ptr);
        }

        // Cross-bucket (or into the raw path): allocate, copy, free.
        let new_ptr = self.alloc(new_size)?;
        let copied = old_size.min(new_size);
        // SAFETY: both payloads are live and at least `copied` bytes;
        // distinct blocks cannot overlap.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), copied);
            self.free(Some(ptr));
        }
        self.realloc_copied_bytes
            .fetch_add(copied as u64, Ordering::Relaxed);
        Ok(new_ptr)
    }

    /// Returns the size last requested for `ptr`, or `None` for `None`.
    ///
    /// # Safety
    /// `ptr` must be live and from this allocator.
    pub unsafe fn alloc_size(&self, ptr: Option<NonNull<u8>>) -> Option<usize> {
        // SAFETY: caller contract.
        ptr.map(|p| unsafe { header::stored_size(p) } as usize)
    }

    /// Live pool-backed blocks across all size classes.
    ///
    /// Raw (oversized) allocations are deliberately not counted here,
    /// even though the byte totals below include them.
    pub fn count(&self) -> usize {
        self.classes
            .classes()
            .iter()
            .map(|class| class.pool.count())
            .sum()
    }

    /// Number of live raw (oversized) allocations
    pub fn raw_count(&self) -> usize {
        self.raw.len()
    }

    /// Reserved bytes across all pools plus live raw allocations
    pub fn total_size_bytes(&self) -> usize {
        let pools: usize = self
            .classes
            .classes()
            .iter()
            .map(|class| class.pool.total_size_bytes())
            .sum();
        pools + self.raw.total_bytes()
    }

    /// In-use bytes across all pools plus live raw allocations
    pub fn size_in_use_bytes(&self) -> usize {
        let pools: usize = self
            .classes
            .classes()
            .iter()
            .map(|class| class.pool.size_in_use_bytes())
            .sum();
        pools + self.raw.total_bytes()
    }

    /// Reserved capacity in megabytes
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes() as f64 / (1024.0 * 1024.0)
    }

    /// In-use bytes in megabytes
    pub fn size_in_use_mb(&self) -> f64 {
        self.size_in_use_bytes() as f64 / (1024.0 * 1024.0)
    }

    /// Cumulative bytes copied by cross-bucket reallocations
    pub fn realloc_copied_bytes(&self) -> u64 {
        self.realloc_copied_bytes.load(Ordering::Relaxed)
    }

    /// Takes a statistics snapshot
    pub fn stats(&self) -> MultiPoolStats {
        MultiPoolStats {
            classes: self
                .classes
                .classes()
                .iter()
                .map(|class| SizeClassStats {
                    block_size: class.block_size as usize,
                    pool: class.pool.stats(),
                })
                .collect(),
            raw_count: self.raw.len(),
            raw_bytes: self.raw.total_bytes(),
            realloc_copied_bytes: self.realloc_copied_bytes(),
            total_reserved_bytes: self.total_size_bytes(),
            total_in_use_bytes: self.size_in_use_bytes(),
        }
    }

    /// Emits per-pool statistics, raw totals and the realloc-copy
    /// counter through `tracing`
    pub fn print_stats(&self) {
        for class in self.classes.classes() {
            class.pool.print_stats();
        }
        info!(
            raw_allocations = self.raw.len(),
            raw_bytes = self.raw.total_bytes(),
            realloc_copied_bytes = self.realloc_copied_bytes(),
            in_use_mb = self.size_in_use_mb(),
            reserved_mb = self.total_size_mb(),
            "multi-pool"
        );
    }

    /// Empties every size-class pool and frees every raw allocation.
    ///
    /// The realloc-copy counter is a lifetime diagnostic and is not
    /// reset.
    ///
    /// # Safety
    /// Invalidates all outstanding pointers; the caller must guarantee
    /// none is still in use and no other operation is in flight.
    pub unsafe fn clear(&self) {
        for class in self.classes.classes() {
            // SAFETY: forwarded caller contract.
            unsafe { class.pool.clear() };
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.raw.clear() };
    }

    /// Reports every live pool-backed block and raw-table entry to a
    /// memory validator.
    ///
    /// Requires quiescence (no concurrent alloc/free), like
    /// [`clear`](Self::clear).
    #[cfg(debug_assertions)]
    pub fn validate(&self, validator: &mut dyn MemoryValidator, name: &str) {
        for class in self.classes.classes() {
            class.pool.validate(validator, name);
        }
        self.raw.validate(validator, name);
    }
}
