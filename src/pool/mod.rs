//! Fixed-block pool
//!
//! A thread-safe allocator for equally-sized blocks handed out from
//! pre-reserved chunks, with an optional growth policy. O(1)
//! allocation and deallocation through a lock-free free list.
//!
//! ## Modules
//! - `allocator` - Main `FixedBlockPool` implementation
//! - `config` - `PoolConfig` and `GrowthPolicy`
//! - `stats` - Statistics snapshot types

pub mod allocator;
pub mod config;
pub mod stats;

pub use allocator::FixedBlockPool;
pub use config::{GrowthPolicy, PoolConfig};
pub use stats::FixedPoolStats;
