//! Fixed-block pool configuration

/// Growth policy for a fixed-block pool
///
/// Forwarded opaquely by [`MultiPool`](crate::multi::MultiPool) to each
/// size-class pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthPolicy {
    /// Never grow: allocation fails once the pre-reserved blocks run out.
    None,
    /// Grow by one chunk of the initial capacity each time the free list
    /// is exhausted.
    #[default]
    Slow,
    /// Double the total block count each time the free list is exhausted.
    Fast,
}

/// Configuration for a fixed-block pool
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill patterns for debugging
    pub alloc_pattern: Option<u8>,
    /// Pattern written over a block as it returns to the free list
    pub dealloc_pattern: Option<u8>,

    /// Use exponential backoff for CAS retries
    pub use_backoff: bool,

    /// Maximum CAS retry attempts before failing
    pub max_retries: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) { Some(0xBB) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
            use_backoff: true,
            max_retries: 1000,
        }
    }
}

impl PoolConfig {
    /// Production configuration: no fill patterns, stats enabled
    pub fn production() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: None,
            dealloc_pattern: None,
            use_backoff: true,
            max_retries: 1000,
        }
    }

    /// Debug configuration: fill patterns and stats on
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
            use_backoff: true,
            max_retries: 1000,
        }
    }

    /// Performance configuration: minimal overhead
    pub fn performance() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            use_backoff: false,
            max_retries: usize::MAX,
        }
    }
}
