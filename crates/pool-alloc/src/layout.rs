//! Partitioning of the backing buffer into size classes.
//!
//! The buffer is split into one contiguous partition per requested block
//! size, largest block size first. Each partition aims for an equal share of
//! the heap that is still unassigned:
//!
//! ```text
//! equal_share    = remaining / classes_left
//! partition_size = max(stride, equal_share - equal_share % stride)
//! ```
//!
//! where `stride = block_size + METADATA_LENGTH`. A class whose block does
//! not fit its equal share still gets exactly one block. Whatever a class's
//! share cannot use (the remainder of the rounding) stays in `remaining` and
//! is absorbed by the smaller classes laid out after it.
//!
//! Planning is separated from writing headers, so a layout that fails
//! validation never touches the buffer.

use core::ops::Range;

use arrayvec::ArrayVec;

use crate::{
    config::{MAX_BLOCK_SIZE_COUNT, METADATA_LENGTH, max_block_size},
    error::InitError,
    header::{BlockHeader, BlockOffset},
};

/// One size class: a partition of the buffer and its free list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeClass {
    block_size: usize,
    partition_start: usize,
    partition_size: usize,
    pub(crate) free_head: Option<BlockOffset>,
}

impl SizeClass {
    /// Returns the number of bytes available to the caller in each block.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the distance between consecutive block headers.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.block_size + METADATA_LENGTH
    }

    /// Returns the byte range of the buffer owned by this class.
    #[must_use]
    pub fn partition(&self) -> Range<usize> {
        self.partition_start..self.partition_start + self.partition_size
    }

    /// Returns the number of bytes owned by this class, headers included.
    #[must_use]
    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    /// Returns the number of blocks in the partition.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.partition_size / self.stride()
    }

    /// Returns `true` if no block of this class is currently free.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.free_head.is_none()
    }

    /// Returns the data offset of the first block of the partition.
    #[must_use]
    pub fn first_block(&self) -> usize {
        self.partition_start + METADATA_LENGTH
    }

    /// Returns `true` if `data` falls inside the partition.
    pub(crate) fn contains(&self, data: BlockOffset) -> bool {
        self.partition().contains(&data.header_offset()) && data.get() >= METADATA_LENGTH
    }

    /// Returns `true` if `data` is the data offset of one of the partition's
    /// blocks.
    pub(crate) fn is_block_boundary(&self, data: BlockOffset) -> bool {
        self.contains(data)
            && (data.header_offset() - self.partition_start).is_multiple_of(self.stride())
    }
}

/// Table of size classes, ordered by descending block size.
pub(crate) type SizeClasses = ArrayVec<SizeClass, MAX_BLOCK_SIZE_COUNT>;

/// Computes the partition of a `heap_size`-byte buffer for `block_sizes`.
///
/// The returned classes are sorted by descending block size and occupy
/// disjoint, contiguous ranges starting at offset `0`. Their free lists
/// point at the first block of each partition; the headers themselves are
/// written by [`write_headers`].
///
/// # Errors
///
/// Returns an [`InitError`] if `block_sizes` is empty or longer than
/// [`MAX_BLOCK_SIZE_COUNT`], if any size is `0` or does not fit the heap
/// together with its header, or if a class does not fit into the space left
/// by the classes before it.
pub(crate) fn plan(block_sizes: &[usize], heap_size: usize) -> Result<SizeClasses, InitError> {
    if block_sizes.is_empty() {
        return Err(InitError::EmptySizes);
    }
    let Ok(mut sorted) = ArrayVec::<usize, MAX_BLOCK_SIZE_COUNT>::try_from(block_sizes) else {
        return Err(InitError::TooManySizes {
            count: block_sizes.len(),
            max: MAX_BLOCK_SIZE_COUNT,
        });
    };
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let max = max_block_size(heap_size);
    let class_count = sorted.len();
    let mut classes = SizeClasses::new();
    let mut remaining = heap_size;
    let mut partition_start = 0;

    for (i, &block_size) in sorted.iter().enumerate() {
        if block_size == 0 {
            let index = block_sizes.iter().position(|&s| s == 0).unwrap_or(i);
            return Err(InitError::ZeroBlockSize { index });
        }
        if block_size > max {
            return Err(InitError::BlockTooLarge { block_size, max });
        }

        let stride = block_size + METADATA_LENGTH;
        let equal_share = remaining / (class_count - i);
        let partition_size = usize::max(stride, equal_share - equal_share % stride);
        if partition_size > remaining {
            return Err(InitError::PartitionOverflow {
                block_size,
                needed: partition_size,
                remaining,
            });
        }

        classes.push(SizeClass {
            block_size,
            partition_start,
            partition_size,
            free_head: BlockOffset::from_usize(partition_start + METADATA_LENGTH),
        });
        partition_start += partition_size;
        remaining -= partition_size;
    }

    Ok(classes)
}

/// Threads the free list of `class` through the headers of its partition.
///
/// Every header is tagged with `class_index`; each links to the block after
/// it, and the last block of the partition ends the list.
pub(crate) fn write_headers(heap: &mut [u8], class_index: u8, class: &SizeClass) {
    let partition = class.partition();
    let stride = class.stride();
    for header in partition.clone().step_by(stride) {
        let next_data = header + stride + METADATA_LENGTH;
        let next_free = if next_data < partition.end {
            BlockOffset::from_usize(next_data)
        } else {
            None
        };
        let Some(data) = BlockOffset::from_usize(header + METADATA_LENGTH) else {
            break;
        };
        BlockHeader {
            next_free,
            class_index,
        }
        .write(heap, data);
    }
}
