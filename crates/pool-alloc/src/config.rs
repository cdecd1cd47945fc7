//! Compile-time configuration of the pool layout.
//!
//! The three constants below are coupled through the block header encoding:
//! the free-list link is a 16-bit offset, so no buffer may be larger than
//! [`MAX_HEAP_SIZE`], and the owning size class is an 8-bit index, so no more
//! than [`MAX_BLOCK_SIZE_COUNT`] size classes may exist. The couplings are
//! checked at compile time.

/// Width of the free-list link stored in every block header, in bytes.
pub(crate) const LINK_LENGTH: usize = size_of::<u16>();

/// Width of the owning size class index stored in every block header, in
/// bytes.
pub(crate) const CLASS_INDEX_LENGTH: usize = size_of::<u8>();

/// Per-block metadata overhead in bytes.
///
/// Every block's data region is preceded by a header of this length.
pub const METADATA_LENGTH: usize = LINK_LENGTH + CLASS_INDEX_LENGTH;

/// Largest backing buffer the 16-bit free-list link can address.
pub const MAX_HEAP_SIZE: usize = 1 << (u16::BITS as usize);

/// Backing buffer capacity used by [`PoolAllocator`](crate::PoolAllocator).
pub const DEFAULT_HEAP_SIZE: usize = 65536;

/// Maximum number of size classes a pool can be initialized with.
pub const MAX_BLOCK_SIZE_COUNT: usize = 255;

const _: () = assert!(METADATA_LENGTH == 3);
const _: () = assert!(MAX_BLOCK_SIZE_COUNT <= u8::MAX as usize + 1);
const _: () = assert!(DEFAULT_HEAP_SIZE <= MAX_HEAP_SIZE);
const _: () = assert!(DEFAULT_HEAP_SIZE > METADATA_LENGTH);

/// Returns the largest block size a pool of `heap_size` bytes can hold.
///
/// A block must fit in the buffer together with its header.
#[must_use]
pub const fn max_block_size(heap_size: usize) -> usize {
    heap_size.saturating_sub(METADATA_LENGTH)
}
