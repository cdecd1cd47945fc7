//! Fixed-capacity, segregated-size pool allocator.
//!
//! This crate provides an allocator for environments without a
//! general-purpose heap. A single statically sized buffer is carved into one
//! partition per requested block size, and each partition keeps its free
//! blocks on an intrusive singly linked list stored inside the buffer itself.
//! The crate is `no_std`, does not allocate, and contains no `unsafe` code.
//!
//! # Memory Layout
//!
//! Partitions are laid out largest block size first. Every block is
//! preceded by a 3-byte header holding the free-list link (a 16-bit data
//! offset) and the index of the owning size class:
//!
//! ```text
//! Pool initialized with block sizes [8, 4]:
//!
//! 0                    32758                   65532  65536
//! ├─ class 0 ──────────┼─ class 1 ─────────────┼──────┤
//! │ hdr│data │hdr│data │ hdr│data│hdr│data│... │unused│
//! │  3 │  8  │ 3 │  8  │  3 │ 4  │ 3 │ 4  │    │      │
//! ```
//!
//! See [`layout`] for how partition sizes are chosen.
//!
//! # Allocation Policy
//!
//! | Operation | Cost | Behavior |
//! |-----------|------|----------|
//! | [`Pool::new`] / [`Pool::reset`] | O(k log k + buffer) | lays out every size class or none |
//! | [`Pool::allocate`] | O(k) | smallest non-exhausted class that fits |
//! | [`Pool::release`] | O(1) | LIFO push onto the owning class |
//! | [`Pool::try_release`] | O(k + free blocks) | validated release |
//!
//! *k is the number of size classes, at most
//! [`MAX_BLOCK_SIZE_COUNT`](config::MAX_BLOCK_SIZE_COUNT).*
//!
//! # Usage Examples
//!
//! ```rust
//! use pool_alloc::PoolAllocator;
//!
//! let mut pool = PoolAllocator::new(&[1, 2, 6]).unwrap();
//!
//! // No 4-byte class exists, so the 6-byte class serves the request.
//! let handle = pool.allocate(4).unwrap();
//! assert_eq!(pool.block_size(handle), Some(6));
//!
//! let block = pool.block_mut(handle).unwrap();
//! block[..4].copy_from_slice(&0x0ABC_DEFF_u32.to_le_bytes());
//! assert_eq!(&pool.block(handle).unwrap()[..4], &0x0ABC_DEFF_u32.to_le_bytes());
//!
//! pool.release(handle);
//! ```
//!
//! # Thread Safety
//!
//! [`Pool`] is `Send` but performs no synchronization. Use [`SpinPool`] to
//! share a pool, for example from a `static`.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
mod error;
mod header;
pub mod layout;
mod pool;
mod sync;

pub use self::{
    error::{InitError, ReleaseError},
    header::BlockOffset,
    layout::SizeClass,
    pool::{BlockHandle, Pool},
    sync::SpinPool,
};

/// A pool over a buffer of [`DEFAULT_HEAP_SIZE`](config::DEFAULT_HEAP_SIZE)
/// bytes.
pub type PoolAllocator = Pool<{ config::DEFAULT_HEAP_SIZE }>;
