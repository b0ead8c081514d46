//! Size-class table and bucket lookup
//!
//! Size classes are configured in strictly ascending order, each a
//! multiple of the 32-byte size quantum. A flat lookup table maps every
//! 32-byte bucket of allocation sizes to the smallest class that covers
//! it, making class selection O(1) on both alloc and free.

use super::header::{BLOCK_ALIGN, HEADER_SIZE};
use crate::error::{AllocError, AllocResult};
use crate::pool::{FixedBlockPool, GrowthPolicy, PoolConfig};

/// Width of one lookup bucket in bytes. Size classes must be multiples
/// of this quantum.
pub const SIZE_QUANTUM: u32 = 32;

const BUCKET_SHIFT: u32 = SIZE_QUANTUM.trailing_zeros();

/// Configuration for one size class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassConfig {
    /// Usable block size in bytes; must be a non-zero multiple of
    /// [`SIZE_QUANTUM`] and strictly larger than the previous class.
    pub block_size: u32,
    /// Number of blocks pre-reserved for this class
    pub capacity: u32,
}

impl SizeClassConfig {
    /// Creates a size-class configuration
    pub const fn new(block_size: u32, capacity: u32) -> Self {
        Self {
            block_size,
            capacity,
        }
    }
}

/// One size class: a fixed-block pool plus its usable block size
pub(crate) struct SizeClass {
    /// Pool whose blocks are `block_size` + header bytes
    pub(crate) pool: FixedBlockPool,
    /// Usable payload capacity of a block in this class
    pub(crate) block_size: u32,
}

/// Size classes plus the flat bucket lookup table.
///
/// Built once at construction; read-only afterwards. Entry `i` of the
/// lookup table covers sizes in `(i*32, i*32 + 32]` and holds the index
/// of the smallest class whose block size covers that range.
pub(crate) struct ClassTable {
    classes: Box<[SizeClass]>,
    lookup: Box<[u16]>,
    max_block_size: u32,
}

impl ClassTable {
    pub(crate) fn build(
        configs: &[SizeClassConfig],
        growth: GrowthPolicy,
        pool_config: PoolConfig,
    ) -> AllocResult<Self> {
        if configs.is_empty() {
            return Err(AllocError::InvalidConfig("no size classes configured"));
        }
        if configs.len() > u16::MAX as usize {
            return Err(AllocError::InvalidConfig("too many size classes"));
        }

        let mut classes = Vec::with_capacity(configs.len());
        let mut prev_size = 0u32;
        for config in configs {
            if config.block_size == 0 || !config.block_size.is_multiple_of(SIZE_QUANTUM) {
                return Err(AllocError::InvalidConfig(
                    "size class is not a multiple of 32",
                ));
            }
            if config.block_size <= prev_size {
                return Err(AllocError::InvalidConfig(
                    "size classes must be strictly ascending",
                ));
            }
            if config.capacity == 0 {
                return Err(AllocError::InvalidConfig("size class capacity is zero"));
            }
            prev_size = config.block_size;

            // Pool blocks carry the hidden size header in front of the
            // usable payload.
            let pool = FixedBlockPool::with_config(
                config.block_size as usize + HEADER_SIZE,
                BLOCK_ALIGN,
                config.capacity as usize,
                growth,
                pool_config,
            )?;
            classes.push(SizeClass {
                pool,
                block_size: config.block_size,
            });
        }

        let max_block_size = prev_size;
        let bucket_count = (max_block_size / SIZE_QUANTUM) as usize;

        // Walk classes and buckets in lockstep; both are ascending, so
        // each bucket gets the first class that covers its upper bound.
        let mut lookup = Vec::with_capacity(bucket_count);
        let mut class_idx = 0usize;
        for bucket in 0..bucket_count {
            let representative = (bucket as u32) * SIZE_QUANTUM + SIZE_QUANTUM;
            while classes[class_idx].block_size < representative {
                class_idx += 1;
            }
            lookup.push(class_idx as u16);
        }

        Ok(Self {
            classes: classes.into_boxed_slice(),
            lookup: lookup.into_boxed_slice(),
            max_block_size,
        })
    }

    /// Largest size served by a size class; anything bigger takes the
    /// raw path.
    pub(crate) fn max_block_size(&self) -> u32 {
        self.max_block_size
    }

    /// O(1) class selection for a request of `size` bytes.
    ///
    /// `size` must be in `1..=max_block_size`; alloc and free compute
    /// the same bucket for the same stored size.
    pub(crate) fn class_for(&self, size: usize) -> &SizeClass {
        debug_assert!(size >= 1 && size <= self.max_block_size as usize);
        let bucket = (size - 1) >> BUCKET_SHIFT;
        &self.classes[self.lookup[bucket] as usize]
    }

    pub(crate) fn classes(&self) -> &[SizeClass] {
        &self.classes
    }
}
