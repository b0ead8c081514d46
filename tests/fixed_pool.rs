//! Integration tests for the fixed-block pool

use multipool::{AllocError, FixedBlockPool, GrowthPolicy, PoolConfig};

#[test]
fn test_fixed_pool_basic() {
    let pool = FixedBlockPool::with_config(128, 8, 16, GrowthPolicy::None, PoolConfig::default())
        .expect("Failed to create pool");

    let ptr = pool.alloc().expect("Allocation failed");

    unsafe {
        // Write to allocated memory
        std::ptr::write_bytes(ptr.as_ptr(), 0x42, 128);
        assert_eq!(*ptr.as_ptr(), 0x42);

        pool.free(ptr);
    }
    assert_eq!(pool.count(), 0);
}

#[test]
fn test_fixed_pool_reuse() {
    let pool = FixedBlockPool::new(64, 8, 16, GrowthPolicy::None).unwrap();

    let ptr1 = pool.alloc().expect("First allocation failed");
    let addr1 = ptr1.as_ptr() as usize;

    unsafe { pool.free(ptr1) };

    // Allocate again - should reuse the same block
    let ptr2 = pool.alloc().expect("Second allocation failed");
    let addr2 = ptr2.as_ptr() as usize;

    assert_eq!(addr1, addr2, "Pool should reuse freed blocks");

    unsafe { pool.free(ptr2) };
}

#[test]
fn test_fixed_pool_multiple_blocks() {
    let pool = FixedBlockPool::new(32, 8, 16, GrowthPolicy::None).unwrap();

    // Allocate multiple blocks
    let mut ptrs = vec![];
    for i in 0..10 {
        let ptr = pool.alloc().expect("Allocation failed");
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), i as u8, 32);
        }
        ptrs.push(ptr);
    }

    // Verify all blocks are different
    for i in 0..ptrs.len() {
        for j in (i + 1)..ptrs.len() {
            assert_ne!(ptrs[i].as_ptr(), ptrs[j].as_ptr());
        }
    }

    // Verify patterns
    for (i, ptr) in ptrs.iter().enumerate() {
        unsafe {
            assert_eq!(*ptr.as_ptr(), i as u8);
        }
    }

    assert_eq!(pool.count(), 10);

    for ptr in ptrs {
        unsafe { pool.free(ptr) };
    }
    assert_eq!(pool.count(), 0);
}

#[test]
fn test_fixed_pool_exhaustion_and_growth() {
    // Non-growable pool fails once empty
    let fixed = FixedBlockPool::new(64, 8, 4, GrowthPolicy::None).unwrap();
    let mut held = vec![];
    for _ in 0..4 {
        held.push(fixed.alloc().unwrap());
    }
    assert!(matches!(
        fixed.alloc(),
        Err(AllocError::PoolExhausted { .. })
    ));
    for ptr in held.drain(..) {
        unsafe { fixed.free(ptr) };
    }

    // Growable pool keeps going
    let growable = FixedBlockPool::new(64, 8, 4, GrowthPolicy::Fast).unwrap();
    for _ in 0..64 {
        held.push(growable.alloc().unwrap());
    }
    assert_eq!(growable.count(), 64);
    assert!(growable.block_count() >= 64);
    for ptr in held {
        unsafe { growable.free(ptr) };
    }
    assert_eq!(growable.count(), 0);
}

#[test]
fn test_fixed_pool_alignment() {
    for align in [8usize, 16, 32] {
        let pool = FixedBlockPool::new(64, align, 16, GrowthPolicy::None).unwrap();
        let ptr = pool.alloc().unwrap();
        assert_eq!(ptr.as_ptr() as usize % align, 0);
        unsafe { pool.free(ptr) };
    }
}

#[test]
fn test_fixed_pool_concurrent() {
    use std::sync::Arc;
    use std::thread;

    let pool = Arc::new(
        FixedBlockPool::new(128, 8, 16, GrowthPolicy::Slow).expect("Failed to create pool"),
    );

    let mut handles = vec![];

    for i in 0..4 {
        let pool = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            let mut ptrs = vec![];

            // Each thread allocates 5 blocks
            for _ in 0..5 {
                if let Ok(ptr) = pool.alloc() {
                    unsafe {
                        std::ptr::write_bytes(ptr.as_ptr(), i as u8, 128);
                    }
                    ptrs.push(ptr);
                }
            }

            // Verify patterns
            for ptr in &ptrs {
                unsafe {
                    assert_eq!(*ptr.as_ptr(), i as u8);
                }
            }

            for ptr in ptrs {
                unsafe { pool.free(ptr) };
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pool.count(), 0);
}

#[test]
fn test_fixed_pool_stress() {
    let pool = FixedBlockPool::new(256, 8, 16, GrowthPolicy::Slow).unwrap();

    for iteration in 0..100 {
        let mut ptrs = vec![];

        for _ in 0..10 {
            if let Ok(ptr) = pool.alloc() {
                unsafe {
                    std::ptr::write_bytes(ptr.as_ptr(), iteration as u8, 256);
                }
                ptrs.push(ptr);
            }
        }

        for ptr in &ptrs {
            unsafe {
                assert_eq!(*ptr.as_ptr(), iteration as u8);
            }
        }

        for ptr in ptrs {
            unsafe { pool.free(ptr) };
        }
    }

    assert_eq!(pool.count(), 0);
}

#[test]
fn test_fixed_pool_clear() {
    let pool = FixedBlockPool::new(64, 8, 8, GrowthPolicy::Slow).unwrap();

    for _ in 0..12 {
        pool.alloc().unwrap();
    }
    assert_eq!(pool.count(), 12);

    unsafe { pool.clear() };
    assert_eq!(pool.count(), 0);
    assert_eq!(pool.free_blocks(), pool.block_count());

    // The pool is fully usable again after clear
    let ptr = pool.alloc().unwrap();
    unsafe { pool.free(ptr) };
}

#[test]
fn test_fixed_pool_stats() {
    let pool =
        FixedBlockPool::with_config(64, 8, 8, GrowthPolicy::None, PoolConfig::debug()).unwrap();

    let a = pool.alloc().unwrap();
    let b = pool.alloc().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.total_allocs, 2);
    assert_eq!(stats.free_blocks, 6);
    assert_eq!(stats.current_usage, 2 * stats.block_size);
    assert!(stats.peak_usage >= stats.current_usage);

    unsafe {
        pool.free(a);
        pool.free(b);
    }
    let stats = pool.stats();
    assert_eq!(stats.total_deallocs, 2);
    assert_eq!(stats.current_usage, 0);
}
