#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]
#![cfg(test)]

use pool_alloc::{
    BlockHandle, InitError, PoolAllocator,
    config::{DEFAULT_HEAP_SIZE, MAX_BLOCK_SIZE_COUNT, METADATA_LENGTH},
};

fn one_to_n(n: usize) -> Vec<usize> {
    (1..=n).collect()
}

fn offset(handle: BlockHandle) -> usize {
    handle.offset().get()
}

fn drain(pool: &mut PoolAllocator, size: usize) -> Vec<BlockHandle> {
    let mut handles = Vec::new();
    while let Some(handle) = pool.allocate(size) {
        pool.block_mut(handle).unwrap()[0] = 0x31;
        handles.push(handle);
    }
    handles
}

#[test]
fn init_unsorted() {
    assert!(PoolAllocator::new(&[34, 12, 23, 4, 105]).is_ok());
}

#[test]
fn init_one() {
    assert!(PoolAllocator::new(&[8]).is_ok());
}

#[test]
fn init_duplicates() {
    let pool = PoolAllocator::new(&[12, 12, 12]).unwrap();
    assert_eq!(pool.size_classes().len(), 3);
}

#[test]
fn init_max_length() {
    let pool = PoolAllocator::new(&one_to_n(MAX_BLOCK_SIZE_COUNT)).unwrap();
    assert_eq!(pool.size_classes().len(), MAX_BLOCK_SIZE_COUNT);
}

#[test]
fn init_equal_division() {
    // 65536 / 4, minus the header.
    let pool = PoolAllocator::new(&[16381]).unwrap();
    assert_eq!(pool.size_classes()[0].block_count(), 4);
}

#[test]
fn init_max_block_size() {
    assert!(PoolAllocator::new(&[65533]).is_ok());
}

#[test]
fn init_empty() {
    assert_eq!(PoolAllocator::new(&[]).unwrap_err(), InitError::EmptySizes);
}

#[test]
fn init_too_many_sizes() {
    let err = PoolAllocator::new(&one_to_n(MAX_BLOCK_SIZE_COUNT + 1)).unwrap_err();
    assert!(err.is_too_many_sizes());
}

#[test]
fn init_block_size_zero() {
    let err = PoolAllocator::new(&[1, 4, 3, 0, 2]).unwrap_err();
    assert!(err.is_zero_block_size());
}

#[test]
fn init_block_size_too_large() {
    let err = PoolAllocator::new(&[65534]).unwrap_err();
    assert!(err.is_block_too_large());
}

#[test]
fn init_total_block_size_too_large() {
    let err = PoolAllocator::new(&[1, 5000, 35300, 29500, 2]).unwrap_err();
    assert!(err.is_partition_overflow());
}

#[test]
fn allocate_different_sizes() {
    let mut pool = PoolAllocator::new(&one_to_n(255)).unwrap();

    let m1 = pool.allocate(4).unwrap();
    pool.block_mut(m1).unwrap()[..4].copy_from_slice(&0x0ABC_DEFF_u32.to_ne_bytes());
    let m2 = pool.allocate(8).unwrap();
    pool.block_mut(m2).unwrap()[..8].copy_from_slice(&0x0001_2345_6789_0ABC_u64.to_ne_bytes());

    let read_u32 = u32::from_ne_bytes(pool.block(m1).unwrap()[..4].try_into().unwrap());
    let read_u64 = u64::from_ne_bytes(pool.block(m2).unwrap()[..8].try_into().unwrap());
    assert_eq!(read_u32, 0x0ABC_DEFF);
    assert_eq!(read_u64, 0x0001_2345_6789_0ABC);
}

#[test]
fn allocate_zero() {
    let mut pool = PoolAllocator::new(&[8, 4]).unwrap();
    assert_eq!(pool.allocate(0), None);
}

#[test]
fn allocate_check_heap_offsets() {
    let mut pool = PoolAllocator::new(&[8, 4]).unwrap();
    let heap_start = offset(pool.allocate(8).unwrap()) - METADATA_LENGTH;
    assert_eq!(heap_start, 0);
    let _ = pool.allocate(8).unwrap();
    let _ = pool.allocate(8).unwrap();
    let m1 = pool.allocate(8).unwrap();

    // Three blocks of 8 + 3 bytes precede m1.
    assert_eq!(offset(m1), heap_start + 3 * (8 + METADATA_LENGTH) + METADATA_LENGTH);
}

#[test]
fn allocate_uneven_partitions() {
    let mut pool = PoolAllocator::new(&[53360, 1]).unwrap();
    let heap_start = offset(pool.allocate(2).unwrap()) - METADATA_LENGTH;

    let m1 = pool.allocate(1).unwrap();
    assert_eq!(offset(m1), heap_start + 53366);
    let m2 = pool.allocate(1).unwrap();
    assert_eq!(offset(m2), heap_start + 53370);
    let m3 = pool.allocate(1).unwrap();
    assert_eq!(offset(m3), heap_start + 53374);
}

#[test]
fn allocate_size_between_classes() {
    let mut pool = PoolAllocator::new(&[1, 2, 6]).unwrap();
    let m1 = pool.allocate(4).unwrap();
    assert_eq!(pool.block_size(m1), Some(6));

    pool.block_mut(m1).unwrap()[..4].copy_from_slice(&0x0ABC_DEFF_u32.to_ne_bytes());
    let value = u32::from_ne_bytes(pool.block(m1).unwrap()[..4].try_into().unwrap());
    assert_eq!(value, 0x0ABC_DEFF);
}

#[test]
fn allocate_too_large() {
    let mut pool = PoolAllocator::new(&[1, 2, 5]).unwrap();
    assert_eq!(pool.allocate(8), None);
}

#[test]
fn allocate_all_available() {
    // 1-byte blocks with a 3-byte header: 65536 / 4 blocks.
    let mut pool = PoolAllocator::new(&[1]).unwrap();
    assert_eq!(drain(&mut pool, 1).len(), 16384);
    assert_eq!(pool.allocate(1), None);
}

#[test]
fn allocate_single_class_of_512_byte_stride() {
    let mut pool = PoolAllocator::new(&[509]).unwrap();
    assert_eq!(drain(&mut pool, 1).len(), 128);
    assert_eq!(pool.allocate(1), None);
}

#[test]
fn allocate_with_duplicate_sizes() {
    // Each of the 128 classes gets exactly one 512-byte share.
    let mut pool = PoolAllocator::new(&[509; 128]).unwrap();
    assert_eq!(drain(&mut pool, 1).len(), 128);
    assert_eq!(pool.allocate(1), None);
}

#[test]
fn allocate_max_size() {
    let mut pool = PoolAllocator::new(&[65533]).unwrap();
    assert!(pool.allocate(65533).is_some());
}

#[test]
fn allocate_start_and_end_of_heap() {
    let mut pool = PoolAllocator::new(&[65529, 1]).unwrap();
    let m1 = pool.allocate(65529).unwrap();
    let m2 = pool.allocate(1).unwrap();
    assert_eq!(offset(m2) - offset(m1), 65529 + METADATA_LENGTH);
    assert_eq!(offset(m2), DEFAULT_HEAP_SIZE - 1);
}

#[test]
fn release_returns_same_block() {
    let mut pool = PoolAllocator::new(&one_to_n(255)).unwrap();
    let m1 = pool.allocate(3).unwrap();
    let m2 = pool.allocate(40).unwrap();
    drain(&mut pool, 1);

    pool.release(m1);
    pool.release(m2);
    assert_eq!(pool.allocate(3), Some(m1));
    assert_eq!(pool.allocate(40), Some(m2));
}

#[test]
fn release_keeps_block_contents() {
    let mut pool = PoolAllocator::new(&[50, 3, 24, 8]).unwrap();

    let m1 = pool.allocate(34).unwrap();
    pool.block_mut(m1).unwrap()[0] = 0x36;
    let m2 = pool.allocate(18).unwrap();
    pool.block_mut(m2).unwrap()[0] = 0xFF;
    pool.release(m1);

    let m3 = pool.allocate(34).unwrap();
    assert_eq!(pool.block(m3).unwrap()[0], 0x36);
    pool.block_mut(m3).unwrap()[0] = 0x44;
    assert_eq!(pool.block(m3).unwrap()[0], 0x44);
    assert_eq!(pool.block(m1).unwrap()[0], 0x44);
}

#[test]
fn release_after_all_allocated() {
    let mut pool = PoolAllocator::new(&[1]).unwrap();
    let handles = drain(&mut pool, 1);
    assert_eq!(handles.len(), 16384);
    assert_eq!(pool.allocate(1), None);

    for handle in handles {
        pool.release(handle);
    }
    assert_eq!(drain(&mut pool, 1).len(), 16384);
}

#[test]
fn release_max_size_block() {
    let mut pool = PoolAllocator::new(&[65533]).unwrap();
    let m1 = pool.allocate(30).unwrap();
    pool.release(m1);
    assert_eq!(pool.allocate(644), Some(m1));
}

#[test]
fn allocate_multiple_then_release() {
    let mut pool = PoolAllocator::new(&[50, 3, 24, 8]).unwrap();
    let m1 = pool.allocate(24).unwrap();
    let _ = pool.allocate(6).unwrap();
    let m3 = pool.allocate(2).unwrap();
    let _ = pool.allocate(20).unwrap();
    let m5 = pool.allocate(25).unwrap();

    pool.release(m1);
    pool.release(m3);
    pool.release(m5);

    assert_eq!(pool.allocate(2), Some(m3));
    assert_eq!(pool.allocate(24), Some(m1));
    assert_eq!(pool.allocate(25), Some(m5));
}

#[test]
fn partitions_fit_heap_and_are_disjoint() {
    let size_sets: [&[usize]; 6] = [
        &[8, 4],
        &[34, 12, 23, 4, 105],
        &[53360, 1],
        &[65529, 1],
        &[509; 128],
        &[1000, 999, 1, 1, 77, 300, 4096],
    ];
    for sizes in size_sets {
        let pool = PoolAllocator::new(sizes).unwrap();
        let classes = pool.size_classes();
        assert!(pool.used_bytes() <= DEFAULT_HEAP_SIZE);
        for class in classes {
            assert_eq!(class.partition_size(), class.block_count() * class.stride());
            assert!(class.block_count() >= 1);
        }
        for (i, a) in classes.iter().enumerate() {
            for b in &classes[i + 1..] {
                let (a, b) = (a.partition(), b.partition());
                assert!(a.end <= b.start || b.end <= a.start, "{a:?} overlaps {b:?}");
            }
        }
    }
}

#[test]
fn allocate_release_round_trip_reuses_block() {
    let mut pool = PoolAllocator::new(&[16, 8, 2]).unwrap();
    let first = pool.allocate(8).unwrap();
    pool.release(first);
    for _ in 0..100 {
        let handle = pool.allocate(8).unwrap();
        assert_eq!(handle, first);
        pool.release(handle);
    }
}

#[test]
fn single_class_exhaustion_count() {
    for block_size in [1, 2, 7, 13, 100, 509, 4093, 30000] {
        let mut pool = PoolAllocator::new(&[block_size]).unwrap();
        let expected = DEFAULT_HEAP_SIZE / (block_size + METADATA_LENGTH);
        assert_eq!(drain(&mut pool, block_size).len(), expected, "block_size={block_size}");
        assert_eq!(pool.allocate(block_size), None);
    }
}

#[test]
fn try_release_accepts_live_blocks_only() {
    let mut pool = PoolAllocator::new(&[50, 3, 24, 8]).unwrap();
    let handles = [24, 6, 2, 20, 25].map(|size| pool.allocate(size).unwrap());
    for handle in handles {
        assert_eq!(pool.try_release(handle), Ok(()));
    }
    for handle in handles {
        assert!(pool.try_release(handle).unwrap_err().is_double_free());
    }
}

#[test]
fn reset_starts_new_generation() {
    let mut pool = PoolAllocator::new(&[8, 4]).unwrap();
    let stale = pool.allocate(8).unwrap();
    pool.reset(&[1]).unwrap();

    assert_eq!(pool.block(stale), None);
    assert!(pool.try_release(stale).unwrap_err().is_stale_handle());
    assert_eq!(drain(&mut pool, 1).len(), 16384);
}

#[test]
fn try_release_refuses_handle_from_other_pool() {
    let mut a = PoolAllocator::new(&[8, 4]).unwrap();
    let mut b = PoolAllocator::new(&[8, 4]).unwrap();
    let b1 = b.allocate(8).unwrap();
    let a1 = a.allocate(8).unwrap();
    assert_eq!(a1.offset(), b1.offset());

    assert!(b.try_release(a1).unwrap_err().is_stale_handle());
    assert_eq!(b.block(a1), None);
    assert_eq!(b.block_size(a1), None);

    // b1 is still allocated, so b must not hand its block out again.
    let b2 = b.allocate(8).unwrap();
    assert_ne!(b2.offset(), b1.offset());
    assert_eq!(a.try_release(a1), Ok(()));
    assert_eq!(b.try_release(b1), Ok(()));
}
