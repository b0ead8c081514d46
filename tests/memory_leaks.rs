//! Memory leak detection tests
//!
//! These tests verify that the pools properly return memory and don't
//! leak across allocation cycles, clears and drops.

use multipool::{FixedBlockPool, GrowthPolicy, MultiPool, PoolConfig, SizeClassConfig};

fn multi() -> MultiPool {
    MultiPool::new(
        &[SizeClassConfig::new(64, 16), SizeClassConfig::new(256, 8)],
        GrowthPolicy::Slow,
    )
    .unwrap()
}

/// Test that FixedBlockPool tracks usage down to zero
#[test]
fn test_fixed_pool_tracks_usage() {
    let pool =
        FixedBlockPool::with_config(128, 8, 16, GrowthPolicy::None, PoolConfig::default()).unwrap();

    let mut ptrs = Vec::new();
    for _ in 0..8 {
        ptrs.push(pool.alloc().unwrap());
    }

    assert_eq!(pool.size_in_use_bytes(), 8 * pool.block_size());

    for ptr in ptrs {
        unsafe { pool.free(ptr) };
    }

    // Pool still owns the memory, but every block is free again
    assert_eq!(pool.size_in_use_bytes(), 0);
    assert_eq!(pool.free_blocks(), pool.block_count());
}

/// Test repeated allocation/deallocation doesn't leak
#[test]
fn test_no_leaks_in_repeated_cycles() {
    let pool = multi();
    let reserved = pool.total_size_bytes();

    for round in 0..100usize {
        let size = 1 + (round * 41) % 256;
        let ptr = pool.alloc(size).unwrap();
        unsafe { pool.free(Some(ptr)) };
    }

    assert_eq!(pool.count(), 0, "No blocks should be leaked");
    assert_eq!(pool.size_in_use_bytes(), 0);
    // No growth was needed, so reserves are unchanged
    assert_eq!(pool.total_size_bytes(), reserved);
}

/// Test that raw allocations return their bytes on free
#[test]
fn test_raw_allocations_return_bytes() {
    let pool = multi();

    for _ in 0..50 {
        let ptr = pool.alloc(10_000).unwrap();
        assert_eq!(pool.raw_count(), 1);
        unsafe { pool.free(Some(ptr)) };
        assert_eq!(pool.raw_count(), 0);
    }

    let stats = pool.stats();
    assert_eq!(stats.raw_bytes, 0);
    assert_eq!(stats.total_in_use_bytes, 0);
}

/// Test that clear releases pool blocks and raw allocations alike
#[test]
fn test_clear_releases_all_memory() {
    let pool = multi();

    for _ in 0..5 {
        pool.alloc(40).unwrap();
        pool.alloc(200).unwrap();
        pool.alloc(4000).unwrap();
    }
    assert!(pool.size_in_use_bytes() > 0);

    unsafe { pool.clear() };

    assert_eq!(pool.count(), 0);
    assert_eq!(pool.raw_count(), 0);
    assert_eq!(pool.size_in_use_bytes(), 0);
}

/// Test that dropping the allocator releases chunk memory
#[test]
fn test_releases_on_drop() {
    {
        let pool = multi();
        let p = pool.alloc(100).unwrap();
        unsafe { pool.free(Some(p)) };
        // pool drops here - verifies chunk Drop impls run
    }

    // If there's a leak, ASan or Valgrind would detect it
}

/// Test that dropping with live raw allocations sweeps them
#[test]
fn test_drop_sweeps_live_raw_allocations() {
    {
        let pool = multi();
        // Deliberately never freed; the shutdown sweep reclaims them
        pool.alloc(5000).unwrap();
        pool.alloc(8000).unwrap();
        assert_eq!(pool.raw_count(), 2);
    }

    // Reaching here without a crash means the sweep deallocated both
}

/// Test that growth reserves are retained but fully reusable
#[test]
fn test_growth_does_not_leak() {
    let pool = MultiPool::new(&[SizeClassConfig::new(64, 4)], GrowthPolicy::Slow).unwrap();
    let initial_reserved = pool.total_size_bytes();

    let mut ptrs = Vec::new();
    for _ in 0..20 {
        ptrs.push(pool.alloc(64).unwrap());
    }

    let grown_reserved = pool.total_size_bytes();
    assert!(grown_reserved > initial_reserved, "Growth should reserve more");

    for ptr in ptrs {
        unsafe { pool.free(Some(ptr)) };
    }

    // Reserves stay with the pool, but nothing is in use
    assert_eq!(pool.total_size_bytes(), grown_reserved);
    assert_eq!(pool.size_in_use_bytes(), 0);
    assert_eq!(pool.count(), 0);
}
