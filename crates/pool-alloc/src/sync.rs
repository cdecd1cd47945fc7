//! A pool that can be placed in a `static`.
//!
//! [`Pool`] itself does no locking. [`SpinPool`] serializes access to a
//! single pool with a spin lock and makes initialization a one-time event:
//! once a layout has been installed it cannot be replaced, so handles given
//! out through a `SpinPool` never go stale.
//!
//! ```
//! use pool_alloc::{InitError, SpinPool, config::DEFAULT_HEAP_SIZE};
//!
//! static POOL: SpinPool<DEFAULT_HEAP_SIZE> = SpinPool::new();
//!
//! assert_eq!(POOL.allocate(4), None);
//! POOL.init(&[16, 4]).unwrap();
//! assert_eq!(POOL.init(&[8]), Err(InitError::AlreadyInitialized));
//!
//! let handle = POOL.allocate(4).unwrap();
//! POOL.with_block_mut(handle, |block| block.fill(0x5A));
//! assert_eq!(POOL.with_block(handle, |block| block[0]), Some(0x5A));
//! POOL.release(handle);
//! ```

use spin::{Mutex, MutexGuard, Once};

use crate::{
    error::{InitError, ReleaseError},
    pool::{BlockHandle, Pool},
};

/// A lazily initialized [`Pool`] behind a spin lock.
pub struct SpinPool<const HEAP_SIZE: usize> {
    inner: Once<Mutex<Pool<HEAP_SIZE>>>,
}

impl<const HEAP_SIZE: usize> Default for SpinPool<HEAP_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const HEAP_SIZE: usize> core::fmt::Debug for SpinPool<HEAP_SIZE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpinPool")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl<const HEAP_SIZE: usize> SpinPool<HEAP_SIZE> {
    /// Creates an uninitialized pool.
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: Once::new() }
    }

    /// Lays out the pool for `block_sizes`.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::AlreadyInitialized`] if the pool has already been
    /// initialized, or the layout error from [`Pool::new`]. After a layout
    /// error the pool stays uninitialized and `init` may be called again.
    pub fn init(&self, block_sizes: &[usize]) -> Result<(), InitError> {
        let mut initialized_here = false;
        self.inner.try_call_once(|| {
            initialized_here = true;
            Pool::new(block_sizes).map(Mutex::new)
        })?;
        if !initialized_here {
            return Err(InitError::AlreadyInitialized);
        }
        Ok(())
    }

    /// Returns `true` once [`init`](Self::init) has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.is_completed()
    }

    /// Locks the pool for direct access.
    ///
    /// Returns `None` if the pool is not initialized.
    pub fn lock(&self) -> Option<MutexGuard<'_, Pool<HEAP_SIZE>>> {
        self.inner.get().map(Mutex::lock)
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// See [`Pool::allocate`]. Returns `None` if the pool is not initialized.
    #[must_use]
    pub fn allocate(&self, size: usize) -> Option<BlockHandle> {
        self.lock()?.allocate(size)
    }

    /// Returns a block to its free list without validation.
    ///
    /// See [`Pool::release`]. Does nothing if the pool is not initialized,
    /// since no handle can have been issued.
    pub fn release(&self, handle: BlockHandle) {
        if let Some(mut pool) = self.lock() {
            pool.release(handle);
        }
    }

    /// Returns a block to its free list after validating `handle`.
    ///
    /// # Errors
    ///
    /// See [`Pool::try_release`]. An uninitialized pool refuses every handle
    /// with [`ReleaseError::Uninitialized`].
    pub fn try_release(&self, handle: BlockHandle) -> Result<(), ReleaseError> {
        let Some(mut pool) = self.lock() else {
            return Err(ReleaseError::Uninitialized);
        };
        pool.try_release(handle)
    }

    /// Runs `f` on the data region of `handle` while holding the lock.
    ///
    /// Returns `None` if the pool is not initialized or the handle is stale.
    pub fn with_block<F, T>(&self, handle: BlockHandle, f: F) -> Option<T>
    where
        F: FnOnce(&[u8]) -> T,
    {
        let pool = self.lock()?;
        pool.block(handle).map(f)
    }

    /// Runs `f` on the data region of `handle` for writing while holding the
    /// lock.
    ///
    /// Returns `None` if the pool is not initialized or the handle is stale.
    pub fn with_block_mut<F, T>(&self, handle: BlockHandle, f: F) -> Option<T>
    where
        F: FnOnce(&mut [u8]) -> T,
    {
        let mut pool = self.lock()?;
        pool.block_mut(handle).map(f)
    }
}
