//! Hidden size prefix
//!
//! Every pointer handed to callers is preceded by a 4-byte header
//! holding the size that was last requested for it. `free` and
//! `realloc` recover that size without any table lookup for pool-backed
//! allocations. All offset arithmetic lives here; callers only ever see
//! payload pointers.

use core::ptr::NonNull;

/// Bytes reserved in front of every payload for the stored size.
pub(crate) const HEADER_SIZE: usize = size_of::<u32>();

/// Alignment of every underlying block. Pointer alignment keeps the
/// header read aligned and gives payloads 4-byte alignment.
pub(crate) const BLOCK_ALIGN: usize = align_of::<*mut u8>();

/// Writes `size` into the header at `base` and returns the payload
/// pointer.
///
/// # Safety
/// `base` must point to at least `HEADER_SIZE + size` writable bytes and
/// be aligned to `BLOCK_ALIGN`.
#[inline]
pub(crate) unsafe fn attach(base: NonNull<u8>, size: u32) -> NonNull<u8> {
    unsafe {
        base.cast::<u32>().write(size);
        base.add(HEADER_SIZE)
    }
}

/// Reads the stored size for a payload pointer.
///
/// # Safety
/// `payload` must have been produced by [`attach`] and still be live.
#[inline]
pub(crate) unsafe fn stored_size(payload: NonNull<u8>) -> u32 {
    unsafe { payload.sub(HEADER_SIZE).cast::<u32>().read() }
}

/// Rewrites the stored size in place (same-bucket realloc).
///
/// # Safety
/// Same contract as [`stored_size`], plus the underlying block must have
/// capacity for `size` payload bytes.
#[inline]
pub(crate) unsafe fn set_size(payload: NonNull<u8>, size: u32) {
    unsafe {
        payload.sub(HEADER_SIZE).cast::<u32>().write(size);
    }
}

/// Recovers the block base pointer from a payload pointer.
///
/// # Safety
/// `payload` must have been produced by [`attach`].
#[inline]
pub(crate) unsafe fn base_of(payload: NonNull<u8>) -> NonNull<u8> {
    unsafe { payload.sub(HEADER_SIZE) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut buf = [0u64; 8];
        let base = NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe {
            let payload = attach(base, 40);
            assert_eq!(payload.as_ptr() as usize, base.as_ptr() as usize + HEADER_SIZE);
            assert_eq!(stored_size(payload), 40);
            assert_eq!(base_of(payload), base);

            set_size(payload, 52);
            assert_eq!(stored_size(payload), 52);
        }
    }
}
