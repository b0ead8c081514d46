//! Segregated size-class, thread-safe memory pool allocator
//!
//! This crate reduces heap-call frequency and fragmentation for
//! workloads that make many same-shaped allocations:
//!
//! - [`FixedBlockPool`]: O(1) alloc/free of equally-sized blocks from
//!   pre-reserved, optionally growing chunks
//! - [`MultiPool`]: a general-purpose front over a set of size-class
//!   pools, with O(1) class lookup, hidden per-allocation size headers
//!   and a tracked heap fallback for oversized requests
//!
//! It is not a garbage collector and does not defragment; construction
//! and teardown are single-threaded, everything in between is safe to
//! call from arbitrary threads.
//!
//! # Example
//!
//! ```
//! use multipool::{GrowthPolicy, MultiPool, SizeClassConfig};
//!
//! let pool = MultiPool::new(
//!     &[
//!         SizeClassConfig::new(64, 1000),
//!         SizeClassConfig::new(256, 500),
//!     ],
//!     GrowthPolicy::Slow,
//! )?;
//!
//! let p = pool.alloc(200)?; // served by the 256-byte class
//! unsafe {
//!     assert_eq!(pool.alloc_size(Some(p)), Some(200));
//!     pool.free(Some(p));
//! }
//! assert_eq!(pool.count(), 0);
//! # Ok::<(), multipool::AllocError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

// Core modules
pub mod error;
pub mod utils;

// Allocator implementations
pub mod multi;
pub mod pool;

// Leak-audit hooks (reporting walks are debug-only)
pub mod validate;

// Re-export common types for convenience
pub use error::{AllocError, AllocResult};
pub use multi::{MultiPool, MultiPoolStats, SizeClassConfig, SizeClassStats};
pub use pool::{FixedBlockPool, FixedPoolStats, GrowthPolicy, PoolConfig};
pub use validate::MemoryValidator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
