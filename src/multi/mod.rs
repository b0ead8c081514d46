//! Segregated size-class allocator
//!
//! Buckets allocations into fixed-block pools by size class, with a
//! tracked general-heap fallback for oversized requests and a hidden
//! per-allocation size prefix for O(1) size recovery.
//!
//! ## Modules
//! - `allocator` - Main `MultiPool` implementation
//! - `size_class` - Class configuration and the bucket lookup table
//! - `stats` - Statistics snapshot types
//! - `header` - Hidden size-prefix accessors (internal)
//! - `raw_table` - Oversized-allocation side table (internal)

pub mod allocator;
pub mod size_class;
pub mod stats;

mod header;
mod raw_table;

pub use allocator::MultiPool;
pub use size_class::{SIZE_QUANTUM, SizeClassConfig};
pub use stats::{MultiPoolStats, SizeClassStats};
