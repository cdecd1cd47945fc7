use crate::header::BlockOffset;

/// The error type returned when a pool cannot be initialized.
///
/// Initialization is all-or-nothing: when any of these is returned, no size
/// class has been laid out and the buffer is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
#[non_exhaustive]
pub enum InitError {
    #[display("no block sizes given")]
    EmptySizes,
    #[display("too many block sizes: count={count}, max={max}")]
    TooManySizes { count: usize, max: usize },
    #[display("zero block size given at position {index}")]
    ZeroBlockSize { index: usize },
    #[display("block size too large for the heap: block_size={block_size}, max={max}")]
    BlockTooLarge { block_size: usize, max: usize },
    #[display(
        "not enough heap left for size class: block_size={block_size}, \
         needed={needed}, remaining={remaining}"
    )]
    PartitionOverflow {
        block_size: usize,
        needed: usize,
        remaining: usize,
    },
    #[display("pool is already initialized")]
    AlreadyInitialized,
}

/// The error type returned by [`Pool::try_release`](crate::Pool::try_release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
#[non_exhaustive]
pub enum ReleaseError {
    #[display("pool is not initialized")]
    Uninitialized,
    /// The handle was issued by another pool, or by this pool before its
    /// last reset.
    #[display(
        "handle was not issued by this pool layout: handle_generation={handle_generation}, \
         pool_generation={pool_generation}"
    )]
    StaleHandle {
        handle_generation: u32,
        pool_generation: u32,
    },
    #[display("offset {offset} is not inside any size class partition")]
    OutOfBounds {
        #[error(not(source))]
        offset: BlockOffset,
    },
    #[display("offset {offset} is not a block boundary of size class {class_index}")]
    Misaligned {
        #[error(not(source))]
        offset: BlockOffset,
        class_index: usize,
    },
    /// The block's header no longer names the size class whose partition
    /// holds it. The pool never writes such a header, so this means the
    /// buffer was corrupted.
    #[display("header at {offset} names size class {found}, expected {expected}")]
    ClassMismatch {
        #[error(not(source))]
        offset: BlockOffset,
        expected: usize,
        found: usize,
    },
    #[display("block at {offset} is already free")]
    DoubleFree {
        #[error(not(source))]
        offset: BlockOffset,
    },
}
