//! Debug-only memory validation hooks
//!
//! An external leak auditor implements [`MemoryValidator`]; the
//! allocator reports every live pool-backed block and raw-table entry to
//! it. The reporting walks are compiled in debug builds only; the core
//! allocator contract does not depend on them.

use core::ptr::NonNull;

/// Receiver for live-block reports during validation
pub trait MemoryValidator {
    /// Called once per live block.
    ///
    /// `ptr` is the block address as seen by the owning structure, `size`
    /// its capacity in bytes, and `tag` names the reporting component.
    fn claim_block(&mut self, ptr: NonNull<u8>, size: usize, tag: &str);
}

/// Validator that records every claim, for tests and ad-hoc auditing
#[derive(Debug, Default)]
pub struct RecordingValidator {
    claims: Vec<(usize, usize, String)>,
}

impl RecordingValidator {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All claims seen so far as `(address, size, tag)`
    pub fn claims(&self) -> &[(usize, usize, String)] {
        &self.claims
    }

    /// Number of claims with the given tag
    pub fn count_tagged(&self, tag: &str) -> usize {
        self.claims.iter().filter(|(_, _, t)| t == tag).count()
    }
}

impl MemoryValidator for RecordingValidator {
    fn claim_block(&mut self, ptr: NonNull<u8>, size: usize, tag: &str) {
        self.claims.push((ptr.as_ptr() as usize, size, tag.to_string()));
    }
}
