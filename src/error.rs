//! Allocation error types
//!
//! Allocation failures are surfaced immediately and once: there are no
//! retries or backoff at this level. Callers must check every result.

use thiserror::Error;

/// Result type for allocation operations
pub type AllocResult<T> = Result<T, AllocError>;

/// Error type for allocation operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The general heap could not satisfy an allocation request.
    #[error("allocation of {size} bytes failed: out of memory")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// A fixed-block pool has no free blocks and is not allowed to grow.
    #[error("pool exhausted: no free {block_size}-byte blocks available")]
    PoolExhausted {
        /// Block size of the exhausted pool
        block_size: usize,
    },

    /// A size calculation overflowed.
    #[error("allocation size calculation overflowed")]
    SizeOverflow,

    /// Zero-sized requests are rejected with no side effects.
    #[error("zero-sized allocation request")]
    ZeroSize,

    /// Construction-time contract violation (programmer error).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A pointer on the raw path has no side-table entry. Indicates
    /// corruption or a pointer that was never handed out by this
    /// allocator.
    #[error("pointer is not tracked by the raw-allocation table")]
    UntrackedPointer,

    /// The CAS retry limit was exceeded under contention.
    #[error("allocation abandoned after {attempts} contended attempts")]
    ContentionLimit {
        /// Number of failed compare-exchange attempts
        attempts: usize,
    },
}

impl AllocError {
    /// Whether this error represents resource exhaustion (as opposed to
    /// a contract violation).
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            AllocError::OutOfMemory { .. } | AllocError::PoolExhausted { .. }
        )
    }
}
