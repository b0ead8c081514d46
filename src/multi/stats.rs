//! Multi-pool statistics snapshots

use core::fmt;

use crate::pool::FixedPoolStats;
use crate::utils::format_bytes;

/// Statistics for one size class
#[derive(Debug, Clone, Copy)]
pub struct SizeClassStats {
    /// Usable payload size of the class
    pub block_size: usize,
    /// Snapshot of the backing pool (block sizes there include the
    /// hidden header)
    pub pool: FixedPoolStats,
}

/// Statistics snapshot across all size classes and the raw path
#[derive(Debug, Clone)]
pub struct MultiPoolStats {
    /// Per-class snapshots, ascending by block size
    pub classes: Vec<SizeClassStats>,
    /// Number of live raw (oversized) allocations
    pub raw_count: usize,
    /// Sum of live raw payload bytes
    pub raw_bytes: usize,
    /// Cumulative bytes copied by cross-bucket reallocations
    pub realloc_copied_bytes: u64,
    /// Reserved bytes across pools and raw allocations
    pub total_reserved_bytes: usize,
    /// In-use bytes across pools and raw allocations
    pub total_in_use_bytes: usize,
}

impl fmt::Display for MultiPoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Multi-pool statistics:")?;
        for class in &self.classes {
            writeln!(
                f,
                "  class {:>6}: {} live / {} blocks, {} in use, {} reserved",
                class.block_size,
                class.pool.block_count - class.pool.free_blocks,
                class.pool.block_count,
                format_bytes(class.pool.current_usage),
                format_bytes(class.pool.reserved_bytes()),
            )?;
        }
        writeln!(
            f,
            "  raw: {} allocations, {}",
            self.raw_count,
            format_bytes(self.raw_bytes)
        )?;
        writeln!(
            f,
            "  realloc copied: {}",
            format_bytes(self.realloc_copied_bytes as usize)
        )?;
        writeln!(
            f,
            "  total: {} in use / {} reserved",
            format_bytes(self.total_in_use_bytes),
            format_bytes(self.total_reserved_bytes)
        )
    }
}
