//! Fixed-block pool implementation
//!
//! # Safety
//!
//! This module implements a thread-safe fixed-block pool using a
//! lock-free free list:
//! - Equally-sized blocks carved out of one or more owned chunks
//! - Atomic tagged head with CAS for thread-safe allocation/deallocation
//! - Free blocks store the next pointer in their first bytes (intrusive list)
//! - Chunk growth is serialized by a mutex; the alloc/free fast path
//!   never takes it
//!
//! ## Invariants
//!
//! - All blocks are aligned to `block_align` (at least pointer-aligned,
//!   since free blocks hold the intrusive list pointer)
//! - The free list contains only valid, unallocated blocks
//! - The head carries a generation counter that advances on every pop,
//!   so a head observed across a concurrent pop/free/re-push cycle
//!   fails its CAS instead of installing a stale next pointer (ABA)
//! - `free_count`/`block_count` track totals for O(1) queries

use core::alloc::Layout;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::info;

use super::{FixedPoolStats, GrowthPolicy, PoolConfig};
use crate::error::{AllocError, AllocResult};
use crate::utils::{Backoff, align_up};

#[cfg(debug_assertions)]
use crate::validate::MemoryValidator;

/// Node in the free list
///
/// When a block is free, the first bytes of the block are used to store
/// a pointer to the next free block, forming a linked list.
#[repr(C)]
struct FreeBlock {
    next: *mut FreeBlock,
}

/// The free-list head packs the block address into the low 48 bits and
/// a 16-bit generation counter into the high bits. The generation
/// advances on every successful pop; pushes keep it.
const ADDR_BITS: u32 = 48;
const ADDR_MASK: u64 = (1 << ADDR_BITS) - 1;

fn pack_head(block: *mut FreeBlock, tag: u64) -> u64 {
    let addr = block as u64;
    debug_assert_eq!(addr & !ADDR_MASK, 0, "block address exceeds 48 bits");
    (tag << ADDR_BITS) | addr
}

fn head_block(packed: u64) -> *mut FreeBlock {
    (packed & ADDR_MASK) as usize as *mut FreeBlock
}

fn head_tag(packed: u64) -> u64 {
    packed >> ADDR_BITS
}

/// One contiguous run of blocks owned by the pool
struct Chunk {
    base: NonNull<u8>,
    layout: Layout,
    block_count: usize,
}

impl Chunk {
    fn new(
        block_size: usize,
        block_align: usize,
        block_count: usize,
        fill: Option<u8>,
    ) -> AllocResult<Self> {
        let total_size = block_size
            .checked_mul(block_count)
            .ok_or(AllocError::SizeOverflow)?;
        let layout = Layout::from_size_align(total_size, block_align)
            .map_err(|_| AllocError::InvalidConfig("chunk layout"))?;

        // SAFETY: layout has non-zero size (block_size and block_count are
        // both validated non-zero by the pool constructor).
        let raw = unsafe { std::alloc::alloc(layout) };
        let base = NonNull::new(raw).ok_or(AllocError::OutOfMemory { size: total_size })?;

        if let Some(pattern) = fill {
            // SAFETY: base points to a freshly allocated region of
            // total_size bytes, exclusively owned here.
            unsafe {
                ptr::write_bytes(base.as_ptr(), pattern, total_size);
            }
        }

        Ok(Self {
            base,
            layout,
            block_count,
        })
    }

    fn start_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    fn end_addr(&self) -> usize {
        self.start_addr() + self.layout.size()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: base/layout are exactly what std::alloc::alloc returned
        // in Chunk::new, and the chunk exclusively owns the region.
        unsafe {
            std::alloc::dealloc(self.base.as_ptr(), self.layout);
        }
    }
}

// SAFETY: Chunk exclusively owns its buffer; the raw pointer is never
// aliased outside the pool that holds the chunk.
unsafe impl Send for Chunk {}
// SAFETY: All access to the buffer goes through the pool's atomic free
// list; the Chunk itself only exposes addresses.
unsafe impl Sync for Chunk {}

/// Thread-safe pool of fixed-size blocks
///
/// Hands out blocks of one fixed size from pre-reserved chunks. When the
/// free list runs dry the pool grows according to its [`GrowthPolicy`],
/// or fails if growth is disabled.
///
/// # Memory Layout
/// ```text
/// chunk 0: [Block0][Block1]...[BlockN]
/// chunk 1: [Block0][Block1]...[BlockM]   (added by growth)
///             ↓       ↓
///          [free] → [free] → ... → null  (free list spans chunks)
/// ```
pub struct FixedBlockPool {
    /// Size of each individual block (aligned up)
    block_size: usize,

    /// Alignment of each block
    block_align: usize,

    /// Blocks per chunk for `GrowthPolicy::Slow` and the initial reserve
    initial_capacity: usize,

    /// Growth behavior when the free list is exhausted
    growth: GrowthPolicy,

    /// Owned chunks; locked only for growth, clear and validation
    chunks: Mutex<Vec<Chunk>>,

    /// Tagged head of the free list (address + generation counter)
    free_head: AtomicU64,

    /// Count of free blocks (atomic, for safe concurrent observation)
    free_count: AtomicUsize,

    /// Total number of blocks across all chunks
    block_count: AtomicUsize,

    /// Configuration
    config: PoolConfig,

    /// Statistics (only tracked if enabled)
    total_allocs: AtomicU64,
    total_deallocs: AtomicU64,
    peak_usage: AtomicUsize,
}

impl FixedBlockPool {
    /// Creates a new pool with custom configuration
    ///
    /// # Errors
    /// Returns an error if:
    /// - `block_size` is too small to hold the free-list pointer
    /// - `block_align` is not a power of two
    /// - `initial_capacity` is zero
    /// - The initial chunk cannot be reserved
    pub fn with_config(
        block_size: usize,
        block_align: usize,
        initial_capacity: usize,
        growth: GrowthPolicy,
        config: PoolConfig,
    ) -> AllocResult<Self> {
        if block_size < size_of::<*mut u8>() {
            return Err(AllocError::InvalidConfig("block size too small"));
        }
        if !block_align.is_power_of_two() {
            return Err(AllocError::InvalidConfig("alignment not a power of two"));
        }
        if initial_capacity == 0 {
            return Err(AllocError::InvalidConfig("initial capacity is zero"));
        }

        // Free blocks hold the intrusive list pointer in their first
        // bytes, so blocks must be at least pointer-aligned.
        let block_align = block_align.max(align_of::<*mut FreeBlock>());
        let block_size = align_up(block_size, block_align);

        let pool = Self {
            block_size,
            block_align,
            initial_capacity,
            growth,
            chunks: Mutex::new(Vec::new()),
            free_head: AtomicU64::new(0),
            free_count: AtomicUsize::new(0),
            block_count: AtomicUsize::new(0),
            config,
            total_allocs: AtomicU64::new(0),
            total_deallocs: AtomicU64::new(0),
            peak_usage: AtomicUsize::new(0),
        };

        {
            let mut chunks = pool.chunks.lock();
            pool.add_chunk(&mut chunks, initial_capacity)?;
        }

        Ok(pool)
    }

    /// Creates a new pool with default configuration
    pub fn new(
        block_size: usize,
        block_align: usize,
        initial_capacity: usize,
        growth: GrowthPolicy,
    ) -> AllocResult<Self> {
        Self::with_config(
            block_size,
            block_align,
            initial_capacity,
            growth,
            PoolConfig::default(),
        )
    }

    /// Returns the size of each block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the alignment of each block
    pub fn block_align(&self) -> usize {
        self.block_align
    }

    /// Returns the total number of blocks across all chunks
    pub fn block_count(&self) -> usize {
        self.block_count.load(Ordering::Relaxed)
    }

    /// Returns the number of live (allocated) blocks
    pub fn count(&self) -> usize {
        self.block_count()
            .saturating_sub(self.free_count.load(Ordering::Relaxed))
    }

    /// Returns the number of free blocks (exact in absence of races)
    pub fn free_blocks(&self) -> usize {
        self.free_count.load(Ordering::Relaxed)
    }

    /// Total reserved capacity in bytes
    pub fn total_size_bytes(&self) -> usize {
        self.block_count() * self.block_size
    }

    /// Bytes currently handed out to callers
    pub fn size_in_use_bytes(&self) -> usize {
        self.count() * self.block_size
    }

    /// Checks if a pointer belongs to one of this pool's chunks
    ///
    /// Takes the chunk lock; intended for diagnostics and debug
    /// assertions, not the allocation fast path.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        let chunks = self.chunks.lock();
        chunks.iter().any(|chunk| {
            addr >= chunk.start_addr()
                && addr < chunk.end_addr()
                && (addr - chunk.start_addr()).is_multiple_of(self.block_size)
        })
    }

    /// Reserves a new chunk and splices its blocks onto the free list.
    ///
    /// Caller must hold the chunk lock.
    fn add_chunk(&self, chunks: &mut Vec<Chunk>, block_count: usize) -> AllocResult<()> {
        let chunk = Chunk::new(
            self.block_size,
            self.block_align,
            block_count,
            self.config.alloc_pattern,
        )?;

        // Link the chunk's blocks into a local chain before publishing.
        let first = chunk.start_addr() as *mut FreeBlock;
        let last = (chunk.start_addr() + (block_count - 1) * self.block_size) as *mut FreeBlock;
        let mut prev: *mut FreeBlock = ptr::null_mut();
        for i in (0..block_count).rev() {
            let block_addr = chunk.start_addr() + i * self.block_size;
            debug_assert!(block_addr.is_multiple_of(self.block_align));
            let block = block_addr as *mut FreeBlock;

            // SAFETY: block_addr is within the freshly reserved chunk,
            // properly aligned, and at least pointer-sized (validated in
            // with_config). No other thread can see the chunk yet.
            unsafe {
                (*block).next = prev;
            }
            prev = block;
        }
        debug_assert_eq!(prev, first);

        // Splice the chain onto the shared free list.
        loop {
            let head = self.free_head.load(Ordering::Acquire);
            // SAFETY: last is the tail of the local chain; it is not yet
            // reachable by other threads, so this write cannot race.
            unsafe {
                (*last).next = head_block(head);
            }
            if self
                .free_head
                .compare_exchange_weak(
                    head,
                    pack_head(first, head_tag(head)),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break;
            }
        }

        self.free_count.fetch_add(block_count, Ordering::Relaxed);
        self.block_count.fetch_add(block_count, Ordering::Relaxed);
        chunks.push(chunk);
        Ok(())
    }

    /// Grows the pool according to its policy.
    ///
    /// Caller must hold the chunk lock.
    fn grow(&self, chunks: &mut Vec<Chunk>) -> AllocResult<()> {
        let added = match self.growth {
            GrowthPolicy::None => {
                return Err(AllocError::PoolExhausted {
                    block_size: self.block_size,
                });
            }
            GrowthPolicy::Slow => self.initial_capacity,
            GrowthPolicy::Fast => self.block_count().max(self.initial_capacity),
        };
        self.add_chunk(chunks, added)
    }

    /// Attempts to pop a block from the free list.
    ///
    /// `Ok(None)` means the list is empty; growth is the caller's job.
    fn try_pop(&self) -> AllocResult<Option<NonNull<u8>>> {
        let mut backoff = self.config.use_backoff.then(Backoff::new);
        let mut attempts = 0;

        loop {
            let head = self.free_head.load(Ordering::Acquire);
            let block = head_block(head);

            if block.is_null() {
                return Ok(None);
            }

            if attempts >= self.config.max_retries {
                return Err(AllocError::ContentionLimit { attempts });
            }

            // SAFETY: block is non-null and points to a free block. The
            // Acquire load synchronizes with the Release/AcqRel stores in
            // free() and add_chunk(), so the next pointer is visible.
            let next = unsafe { (*block).next };

            // Advancing the generation makes the CAS fail if this block
            // was popped, freed and re-pushed since the load above.
            if self
                .free_head
                .compare_exchange_weak(
                    head,
                    pack_head(next, head_tag(head).wrapping_add(1)),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.free_count.fetch_sub(1, Ordering::Relaxed);

                if self.config.track_stats {
                    self.total_allocs.fetch_add(1, Ordering::Relaxed);
                    crate::utils::atomic_max(&self.peak_usage, self.size_in_use_bytes());
                }

                return Ok(NonNull::new(block.cast::<u8>()));
            }

            // Another thread modified the list; back off and retry.
            attempts += 1;
            if let Some(ref mut b) = backoff {
                b.spin();
            }
        }
    }

    /// Allocates one block.
    ///
    /// Grows the pool (per [`GrowthPolicy`]) when the free list is
    /// exhausted. The returned block has the pool's fixed `block_size`
    /// capacity regardless of how much of it the caller intends to use.
    ///
    /// # Errors
    /// - [`AllocError::PoolExhausted`] if the pool is empty and growth is
    ///   disabled
    /// - [`AllocError::OutOfMemory`] if a growth chunk cannot be reserved
    /// - [`AllocError::ContentionLimit`] if the CAS retry budget runs out
    pub fn alloc(&self) -> AllocResult<NonNull<u8>> {
        loop {
            if let Some(ptr) = self.try_pop()? {
                return Ok(ptr);
            }

            let mut chunks = self.chunks.lock();
            // Re-check under the lock: another thread may have grown the
            // pool or freed a block while we waited.
            if !head_block(self.free_head.load(Ordering::Acquire)).is_null() {
                continue;
            }
            self.grow(&mut chunks)?;
        }
    }

    /// Returns a block to the free list.
    ///
    /// # Safety
    /// - `ptr` must have been returned by [`alloc`](Self::alloc) on this
    ///   pool and must not have been freed since
    /// - The block must not be accessed after this call
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        debug_assert!(self.contains(ptr.as_ptr()), "pointer outside pool");

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: ptr is a live block of block_size bytes owned by
            // the caller until this call completes.
            unsafe {
                ptr::write_bytes(ptr.as_ptr(), pattern, self.block_size);
            }
        }

        let block = ptr.as_ptr().cast::<FreeBlock>();
        let mut backoff = self.config.use_backoff.then(Backoff::new);

        loop {
            let head = self.free_head.load(Ordering::Acquire);

            // SAFETY: the block is being surrendered by its owner; writing
            // the next pointer before the CAS publishes it is unobservable
            // to other threads.
            unsafe {
                (*block).next = head_block(head);
            }

            if self
                .free_head
                .compare_exchange_weak(
                    head,
                    pack_head(block, head_tag(head)),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.free_count.fetch_add(1, Ordering::Relaxed);
                if self.config.track_stats {
                    self.total_deallocs.fetch_add(1, Ordering::Relaxed);
                }
                return;
            }

            if let Some(ref mut b) = backoff {
                b.spin();
            }
        }
    }

    /// Returns every block to the free list, keeping reserved chunks.
    ///
    /// # Safety
    /// Invalidates all outstanding blocks. The caller must guarantee no
    /// block is still in use and no alloc/free is in flight.
    pub unsafe fn clear(&self) {
        let chunks = self.chunks.lock();

        let mut head: *mut FreeBlock = ptr::null_mut();
        let mut total = 0usize;
        for chunk in chunks.iter() {
            for i in (0..chunk.block_count).rev() {
                let block = (chunk.start_addr() + i * self.block_size) as *mut FreeBlock;
                // SAFETY: the caller guarantees quiescence, so every block
                // can be relinked regardless of its previous state.
                unsafe {
                    (*block).next = head;
                }
                head = block;
            }
            total += chunk.block_count;
        }

        let tag = head_tag(self.free_head.load(Ordering::Relaxed)).wrapping_add(1);
        self.free_head.store(pack_head(head, tag), Ordering::Release);
        self.free_count.store(total, Ordering::Relaxed);

        if self.config.track_stats {
            self.total_allocs.store(0, Ordering::Relaxed);
            self.total_deallocs.store(0, Ordering::Relaxed);
            self.peak_usage.store(0, Ordering::Relaxed);
        }
    }

    /// Takes a statistics snapshot
    pub fn stats(&self) -> FixedPoolStats {
        FixedPoolStats {
            total_allocs: self.total_allocs.load(Ordering::Relaxed),
            total_deallocs: self.total_deallocs.load(Ordering::Relaxed),
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            current_usage: self.size_in_use_bytes(),
            block_size: self.block_size,
            block_count: self.block_count(),
            free_blocks: self.free_blocks(),
        }
    }

    /// Emits pool statistics through `tracing`
    pub fn print_stats(&self) {
        let stats = self.stats();
        info!(
            block_size = stats.block_size,
            blocks = stats.block_count,
            free = stats.free_blocks,
            in_use_bytes = stats.current_usage,
            reserved_bytes = stats.reserved_bytes(),
            total_allocs = stats.total_allocs,
            total_deallocs = stats.total_deallocs,
            "fixed-block pool"
        );
    }

    /// Reports every live block to a memory validator.
    ///
    /// Requires quiescence: the free list is walked without
    /// synchronization against concurrent alloc/free.
    #[cfg(debug_assertions)]
    pub fn validate(&self, validator: &mut dyn MemoryValidator, name: &str) {
        use std::collections::HashSet;

        let chunks = self.chunks.lock();

        let mut free_set = HashSet::new();
        let mut cur = head_block(self.free_head.load(Ordering::Acquire));
        while !cur.is_null() {
            free_set.insert(cur as usize);
            // SAFETY: quiescence contract; every list node is a valid
            // free block owned by this pool.
            cur = unsafe { (*cur).next };
        }

        for chunk in chunks.iter() {
            for i in 0..chunk.block_count {
                let addr = chunk.start_addr() + i * self.block_size;
                if !free_set.contains(&addr) {
                    // SAFETY: addr is a block inside an owned chunk.
                    let ptr = unsafe { NonNull::new_unchecked(addr as *mut u8) };
                    validator.claim_block(ptr, self.block_size, name);
                }
            }
        }
    }
}

// SAFETY: FixedBlockPool is Send because chunks are exclusively owned and
// all shared counters are atomics.
unsafe impl Send for FixedBlockPool {}

// SAFETY: FixedBlockPool is Sync because all allocation state is managed
// through atomic CAS with AcqRel/Acquire ordering; the chunk list is
// mutex-guarded; no unsynchronized shared mutation exists.
unsafe impl Sync for FixedBlockPool {}
