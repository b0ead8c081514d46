//! Fixed-block pool statistics

/// Statistics snapshot for a fixed-block pool
///
/// Cumulative counters (`total_allocs`, `total_deallocs`, `peak_usage`)
/// are only maintained when [`PoolConfig::track_stats`] is set and read
/// as zero otherwise; the remaining fields are always live.
///
/// [`PoolConfig::track_stats`]: crate::pool::PoolConfig
#[derive(Debug, Clone, Copy)]
pub struct FixedPoolStats {
    /// Total allocations performed
    pub total_allocs: u64,
    /// Total deallocations performed
    pub total_deallocs: u64,
    /// Peak memory usage in bytes
    pub peak_usage: usize,
    /// Current memory usage in bytes
    pub current_usage: usize,
    /// Size of each block
    pub block_size: usize,
    /// Total number of blocks across all chunks
    pub block_count: usize,
    /// Currently free blocks
    pub free_blocks: usize,
}

impl FixedPoolStats {
    /// Reserved capacity of the pool in bytes
    pub fn reserved_bytes(&self) -> usize {
        self.block_size * self.block_count
    }
}
