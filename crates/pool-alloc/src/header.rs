//! Block offsets and the in-buffer block header encoding.
//!
//! Every block in the pool is preceded by a [`METADATA_LENGTH`]-byte header:
//!
//! ```text
//! header offset                      data offset
//! │                                  │
//! ▼                                  ▼
//! ┌───────────┬───────────┬──────────┬──────────────────────────────┐
//! │ link (lo) │ link (hi) │ class    │ block data (block_size bytes) │
//! └───────────┴───────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! The link is the data offset of the next free block of the same size
//! class, or `0` when the block is the last free one. Because a data offset
//! is always at least [`METADATA_LENGTH`], `0` never names a real block and
//! the link decodes directly into `Option<BlockOffset>`.

use core::num::NonZeroU16;

use crate::config::{LINK_LENGTH, METADATA_LENGTH};

/// Byte offset of a block's data region from the start of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{:#06x}", _0.get())]
pub struct BlockOffset(NonZeroU16);
const _: () = assert!(size_of::<Option<BlockOffset>>() == LINK_LENGTH);

impl BlockOffset {
    /// Creates an offset from its raw 16-bit encoding.
    ///
    /// Returns `None` for `0`, which is the end-of-list encoding.
    #[must_use]
    pub const fn new(raw: u16) -> Option<Self> {
        match NonZeroU16::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Creates an offset from a buffer index.
    ///
    /// Returns `None` if `offset` is `0` or does not fit in the link field.
    #[must_use]
    pub fn from_usize(offset: usize) -> Option<Self> {
        u16::try_from(offset).ok().and_then(Self::new)
    }

    /// Returns the offset as a buffer index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get() as usize
    }

    /// Returns the offset of the header preceding this data region.
    ///
    /// Saturates at `0` for offsets that cannot have a header in front of
    /// them; such offsets are never produced by a pool.
    #[must_use]
    pub const fn header_offset(self) -> usize {
        self.get().saturating_sub(METADATA_LENGTH)
    }

    const fn to_raw(link: Option<Self>) -> u16 {
        match link {
            Some(offset) => offset.0.get(),
            None => 0,
        }
    }
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    /// Data offset of the next free block in the same size class.
    pub(crate) next_free: Option<BlockOffset>,
    /// Index of the size class that owns the block.
    pub(crate) class_index: u8,
}

impl BlockHeader {
    /// Reads the header preceding the data region at `data`.
    ///
    /// # Panics
    ///
    /// Panics if the header does not lie inside `heap`.
    pub(crate) fn read(heap: &[u8], data: BlockOffset) -> Self {
        let bytes = header_bytes(heap, data);
        let (link, class) = bytes.split_at(LINK_LENGTH);
        Self {
            next_free: BlockOffset::new(u16::from_le_bytes([link[0], link[1]])),
            class_index: class[0],
        }
    }

    /// Writes this header in front of the data region at `data`.
    ///
    /// # Panics
    ///
    /// Panics if the header does not lie inside `heap`.
    pub(crate) fn write(self, heap: &mut [u8], data: BlockOffset) {
        let bytes = header_bytes_mut(heap, data);
        let (link, class) = bytes.split_at_mut(LINK_LENGTH);
        link.copy_from_slice(&BlockOffset::to_raw(self.next_free).to_le_bytes());
        class[0] = self.class_index;
    }

    /// Rewrites only the free-list link of the header at `data`.
    pub(crate) fn write_next_free(heap: &mut [u8], data: BlockOffset, next: Option<BlockOffset>) {
        let bytes = header_bytes_mut(heap, data);
        bytes[..LINK_LENGTH].copy_from_slice(&BlockOffset::to_raw(next).to_le_bytes());
    }
}

/// Returns the buffer range holding the header of the block at `data`.
///
/// # Panics
///
/// Panics if `data` is smaller than [`METADATA_LENGTH`].
fn header_range(data: BlockOffset) -> core::ops::Range<usize> {
    assert!(
        data.get() >= METADATA_LENGTH,
        "data offset {data} has no room for a header"
    );
    data.header_offset()..data.get()
}

/// Returns the header bytes of the block at `data`.
///
/// # Panics
///
/// Panics if the header does not lie inside `heap`.
fn header_bytes(heap: &[u8], data: BlockOffset) -> &[u8] {
    &heap[header_range(data)]
}

/// Mutable counterpart of [`header_bytes`].
fn header_bytes_mut(heap: &mut [u8], data: BlockOffset) -> &mut [u8] {
    &mut heap[header_range(data)]
}
