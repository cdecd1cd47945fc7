//! The pool allocator instance.
//!
//! A [`Pool`] owns its backing buffer, the size class table computed by
//! [`layout`](crate::layout) and one free list per size class. All
//! operations except construction and [`reset`](Pool::reset) run in time
//! bounded by the number of size classes.
//!
//! # Handles
//!
//! Blocks are identified by [`BlockHandle`]s instead of raw addresses. A
//! handle carries the data offset of the block and the generation of the
//! pool layout that produced it. Generations are drawn from a process-wide
//! counter, so no two layouts share one: a handle gives access only to the
//! pool that issued it, and [`reset`](Pool::reset) makes every earlier
//! handle stale.
//!
//! # Examples
//!
//! ```
//! use pool_alloc::PoolAllocator;
//!
//! let mut pool = PoolAllocator::new(&[8, 4]).unwrap();
//!
//! let handle = pool.allocate(6).unwrap();
//! assert_eq!(pool.block_size(handle), Some(8));
//! pool.block_mut(handle).unwrap()[..6].copy_from_slice(b"pooled");
//! assert_eq!(&pool.block(handle).unwrap()[..6], b"pooled");
//!
//! pool.release(handle);
//! assert_eq!(pool.allocate(6), Some(handle));
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use crate::{
    config::{MAX_BLOCK_SIZE_COUNT, MAX_HEAP_SIZE, METADATA_LENGTH},
    error::{InitError, ReleaseError},
    header::{BlockHeader, BlockOffset},
    layout::{self, SizeClass, SizeClasses},
};

/// Handle to a block handed out by a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    offset: BlockOffset,
    generation: u32,
}

impl BlockHandle {
    /// Returns the data offset of the block within the pool's buffer.
    #[must_use]
    pub fn offset(self) -> BlockOffset {
        self.offset
    }

    /// Returns the generation of the pool layout that issued the handle.
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Returns a generation that no other pool layout has used.
///
/// The counter wraps after `u32::MAX` layouts; a handle kept alive across a
/// full wrap could be accepted again.
fn next_generation() -> u32 {
    static NEXT_GENERATION: AtomicU32 = AtomicU32::new(0);
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// A fixed-capacity pool allocator over a `HEAP_SIZE`-byte buffer.
///
/// The buffer is carved into one partition per requested block size. Each
/// partition is an array of blocks, each preceded by a
/// [`METADATA_LENGTH`]-byte header holding the free-list link and the index
/// of the owning size class.
///
/// `HEAP_SIZE` must be larger than [`METADATA_LENGTH`] and at most
/// [`MAX_HEAP_SIZE`]; other capacities are rejected at compile time.
///
/// # Thread Safety
///
/// `Pool` performs no synchronization. Wrap it in a lock (for example
/// [`SpinPool`](crate::SpinPool)) to share it between execution contexts.
#[derive(derive_more::Debug)]
pub struct Pool<const HEAP_SIZE: usize> {
    #[debug(skip)]
    heap: [u8; HEAP_SIZE],
    classes: SizeClasses,
    generation: u32,
}

impl<const HEAP_SIZE: usize> Pool<HEAP_SIZE> {
    const VALID_CAPACITY: () = assert!(
        HEAP_SIZE > METADATA_LENGTH && HEAP_SIZE <= MAX_HEAP_SIZE,
        "heap size must fit the 16-bit free-list link"
    );

    /// Creates a pool with one size class per entry of `block_sizes`.
    ///
    /// Duplicate sizes are kept as separate size classes.
    ///
    /// # Errors
    ///
    /// Returns an [`InitError`] if the sizes cannot be laid out in the buffer;
    /// see [`InitError`] for the conditions.
    pub fn new(block_sizes: &[usize]) -> Result<Self, InitError> {
        let () = Self::VALID_CAPACITY;
        let classes = layout::plan(block_sizes, HEAP_SIZE).inspect_err(|e| {
            log::debug!("rejected pool layout: {e}");
        })?;
        let mut pool = Self {
            heap: [0; HEAP_SIZE],
            classes: SizeClasses::new(),
            generation: next_generation(),
        };
        pool.install(classes);
        Ok(pool)
    }

    /// Lays the pool out again for `block_sizes`.
    ///
    /// On success every block becomes free and the pool enters a new
    /// generation: handles issued before the reset are stale, and
    /// [`block`](Self::block), [`block_mut`](Self::block_mut) and
    /// [`try_release`](Self::try_release) refuse them. Block contents are not
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns an [`InitError`] if the sizes cannot be laid out. The pool is
    /// left unchanged in that case.
    pub fn reset(&mut self, block_sizes: &[usize]) -> Result<(), InitError> {
        let classes = layout::plan(block_sizes, HEAP_SIZE).inspect_err(|e| {
            log::debug!("rejected pool layout: {e}");
        })?;
        self.generation = next_generation();
        self.install(classes);
        Ok(())
    }

    /// Writes the headers of every planned class into the buffer and makes
    /// `classes` the pool's size class table.
    ///
    /// Every block of the new layout is free afterwards. `classes` must come
    /// from [`layout::plan`] for this `HEAP_SIZE`.
    fn install(&mut self, classes: SizeClasses) {
        for (index, class) in classes.iter().enumerate() {
            let Ok(class_index) = u8::try_from(index) else {
                unreachable!("at most {MAX_BLOCK_SIZE_COUNT} size classes are planned");
            };
            layout::write_headers(&mut self.heap, class_index, class);
            log::trace!(
                "size class {index}: block_size={}, partition={:?}, blocks={}",
                class.block_size(),
                class.partition(),
                class.block_count(),
            );
        }
        self.classes = classes;
        log::debug!(
            "pool laid out: classes={}, used={}/{} bytes, generation={}",
            self.classes.len(),
            self.used_bytes(),
            HEAP_SIZE,
            self.generation,
        );
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// The smallest size class that has a free block and whose block size is
    /// at least `size` is chosen. If the best fitting class is exhausted, a
    /// block from the next larger class with free blocks is returned instead.
    ///
    /// Returns `None` if `size` is `0`, larger than the largest block size, or
    /// no sufficiently large class has a free block left.
    #[must_use]
    pub fn allocate(&mut self, size: usize) -> Option<BlockHandle> {
        if size == 0 || size > self.largest_block_size() {
            return None;
        }

        let class = self
            .classes
            .iter_mut()
            .rev()
            .find(|class| class.free_head.is_some() && class.block_size() >= size)?;
        let offset = class.free_head?;
        class.free_head = BlockHeader::read(&self.heap, offset).next_free;

        Some(BlockHandle {
            offset,
            generation: self.generation,
        })
    }

    /// Returns a block to the free list of its size class.
    ///
    /// The block becomes the next one handed out for its class. Its contents
    /// are left as they are.
    ///
    /// No validation is performed: `handle` must come from this pool's
    /// current layout and must not have been released since it was
    /// allocated. Releasing a block twice corrupts the free list so that
    /// later allocations can return the same block twice. Use
    /// [`try_release`](Self::try_release) to have these conditions checked.
    pub fn release(&mut self, handle: BlockHandle) {
        debug_assert_eq!(
            handle.generation, self.generation,
            "released a handle not issued by this pool layout"
        );
        let offset = handle.offset;
        let class_index = BlockHeader::read(&self.heap, offset).class_index;
        let class = &mut self.classes[usize::from(class_index)];
        BlockHeader::write_next_free(&mut self.heap, offset, class.free_head);
        class.free_head = Some(offset);
    }

    /// Returns a block to its free list after checking that `handle` is live.
    ///
    /// This walks the free list of the owning size class to detect double
    /// frees, so it costs time proportional to the number of free blocks in
    /// that class.
    ///
    /// # Errors
    ///
    /// Returns a [`ReleaseError`] and leaves the pool unchanged if the handle
    /// was issued by another pool or before the last reset, does not point at
    /// a block boundary of any partition, points at a block whose header has
    /// been overwritten with another class index, or points at a block that
    /// is already free.
    pub fn try_release(&mut self, handle: BlockHandle) -> Result<(), ReleaseError> {
        self.check_live(handle).inspect_err(|e| {
            log::warn!("refused to release block: {e}");
        })?;
        self.release(handle);
        Ok(())
    }

    /// Checks that `handle` names a block of the current layout that is
    /// currently allocated.
    ///
    /// The header's class index is compared against the partition holding
    /// the offset. The pool itself always writes matching indices, so a
    /// mismatch means the header bytes were corrupted; releasing such a block
    /// would push it onto the wrong free list.
    fn check_live(&self, handle: BlockHandle) -> Result<(), ReleaseError> {
        self.check_generation(handle)?;

        let offset = handle.offset;
        let Some(class_index) = self.classes.iter().position(|c| c.contains(offset)) else {
            return Err(ReleaseError::OutOfBounds { offset });
        };
        let class = &self.classes[class_index];
        if !class.is_block_boundary(offset) {
            return Err(ReleaseError::Misaligned {
                offset,
                class_index,
            });
        }

        let found = usize::from(BlockHeader::read(&self.heap, offset).class_index);
        if found != class_index {
            return Err(ReleaseError::ClassMismatch {
                offset,
                expected: class_index,
                found,
            });
        }

        if self.free_list(class).any(|free| free == offset) {
            return Err(ReleaseError::DoubleFree { offset });
        }
        Ok(())
    }

    /// Refuses handles issued by another pool or by a previous layout of
    /// this one.
    fn check_generation(&self, handle: BlockHandle) -> Result<(), ReleaseError> {
        if handle.generation != self.generation {
            return Err(ReleaseError::StaleHandle {
                handle_generation: handle.generation,
                pool_generation: self.generation,
            });
        }
        Ok(())
    }

    /// Iterates over the data offsets of the free blocks of `class`, starting
    /// with the one handed out next.
    ///
    /// Yields at most [`SizeClass::block_count`] offsets.
    fn free_list(&self, class: &SizeClass) -> impl Iterator<Item = BlockOffset> + '_ {
        let mut cursor = class.free_head;
        // A corrupted list may contain a cycle; never walk past the partition.
        let limit = class.block_count();
        core::iter::from_fn(move || {
            let offset = cursor?;
            cursor = BlockHeader::read(&self.heap, offset).next_free;
            Some(offset)
        })
        .take(limit)
    }

    /// Looks up the size class named by the header of `handle`'s block.
    ///
    /// Returns `None` if the handle was not issued by the current layout or
    /// the header lies outside the buffer.
    fn class_of(&self, handle: BlockHandle) -> Option<&SizeClass> {
        self.check_generation(handle).ok()?;
        let header = BlockHeader::read(self.heap.get(..handle.offset.get())?, handle.offset);
        self.classes.get(usize::from(header.class_index))
    }

    /// Returns the block size of the class that owns `handle`.
    ///
    /// Returns `None` for a handle not issued by the current layout.
    #[must_use]
    pub fn block_size(&self, handle: BlockHandle) -> Option<usize> {
        self.class_of(handle).map(SizeClass::block_size)
    }

    /// Returns the data region of the block identified by `handle`.
    ///
    /// The slice is exactly as long as the owning class's block size. Returns
    /// `None` for a handle not issued by the current layout.
    #[must_use]
    pub fn block(&self, handle: BlockHandle) -> Option<&[u8]> {
        let size = self.block_size(handle)?;
        let start = handle.offset.get();
        self.heap.get(start..start + size)
    }

    /// Returns the data region of the block identified by `handle` for
    /// writing.
    ///
    /// Returns `None` for a handle not issued by the current layout.
    #[must_use]
    pub fn block_mut(&mut self, handle: BlockHandle) -> Option<&mut [u8]> {
        let size = self.block_size(handle)?;
        let start = handle.offset.get();
        self.heap.get_mut(start..start + size)
    }

    /// Returns the capacity of the backing buffer in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        HEAP_SIZE
    }

    /// Returns the current generation of the pool layout.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns the size classes, ordered by descending block size.
    #[must_use]
    pub fn size_classes(&self) -> &[SizeClass] {
        &self.classes
    }

    /// Returns the largest block size the pool can hand out.
    #[must_use]
    pub fn largest_block_size(&self) -> usize {
        self.classes.first().map_or(0, SizeClass::block_size)
    }

    /// Returns the number of buffer bytes assigned to partitions.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.classes.iter().map(SizeClass::partition_size).sum()
    }

    /// Returns the number of free blocks in the size class at `class_index`.
    ///
    /// Returns `None` if there is no such class.
    #[must_use]
    pub fn free_blocks(&self, class_index: usize) -> Option<usize> {
        let class = self.classes.get(class_index)?;
        Some(self.free_list(class).count())
    }
}
