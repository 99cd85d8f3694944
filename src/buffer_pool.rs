//! Fixed-size buffer pool shared across connections.
//!
//! Avoids a per-request heap allocation for the data each connection reads
//! into and writes out of: connections acquire a [`Buffer`] on accept and
//! release it on close, instead of allocating a fresh `Vec<u8>` each time.
//!
//! Buffers are individually heap-allocated (`Vec<Mutex<Buffer>>` of boxed
//! slices addressed through a stable index) so their addresses never move
//! on pool growth — a single reallocating `Vec<Vec<u8>>` would invalidate
//! any pointer held across a `.await` point.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// A reusable fixed-capacity byte buffer.
///
/// `valid_len` marks the readable prefix of `storage`; `reset()` zeroes
/// `valid_len` but never shrinks or frees `storage`.
#[derive(Debug)]
pub struct Buffer {
    storage: Box<[u8]>,
    valid_len: usize,
}

impl Buffer {
    fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            valid_len: 0,
        }
    }

    /// Total capacity of the underlying storage.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The readable prefix of the buffer.
    #[inline(always)]
    pub fn filled(&self) -> &[u8] {
        &self.storage[..self.valid_len]
    }

    /// Mutable access to the readable prefix.
    #[inline(always)]
    pub fn filled_mut(&mut self) -> &mut [u8] {
        &mut self.storage[..self.valid_len]
    }

    /// Mutable access to the entire backing storage, for filling via a read syscall.
    #[inline(always)]
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Number of valid bytes currently held.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.valid_len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }

    /// Sets the length of the readable prefix. Caller guarantees the first
    /// `len` bytes of `storage` have been written.
    #[inline(always)]
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.storage.len());
        self.valid_len = len;
    }

    fn reset(&mut self) {
        self.valid_len = 0;
    }
}

/// Point-in-time snapshot of [`BufferPool`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of buffers that have ever been allocated.
    pub total: usize,
    /// Number of buffers currently sitting in the free stack.
    pub free: usize,
    /// Number of buffers currently checked out.
    pub in_use: usize,
    /// Lifetime count of successful `acquire` calls.
    pub acquired: u64,
    /// Lifetime count of successful `release` calls.
    pub released: u64,
    /// Historical maximum of `in_use`.
    pub peak: usize,
}

/// Failure modes for [`BufferPool::acquire`] and [`BufferPool::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool has reached `max_buffers` and none are free.
    #[error("buffer pool exhausted (max_buffers reached)")]
    Exhausted,
    /// The handle passed to `release` was not produced by this pool.
    #[error("buffer handle does not belong to this pool")]
    NotInPool,
    /// The handle passed to `release` is already in the free stack.
    #[error("buffer handle was already released")]
    AlreadyReleased,
}

struct Slot {
    buffer: Mutex<Buffer>,
}

/// A pool of fixed-size [`Buffer`]s shared across connections.
///
/// Buffers are acquired by index (a [`BufferHandle`]) rather than by
/// reference, so the pool can be shared behind an `Arc` and used from many
/// tasks without borrowing it for the buffer's entire lifetime.
pub struct BufferPool {
    buffer_size: usize,
    max_buffers: usize,
    slots: Mutex<Vec<Slot>>,
    free_stack: Mutex<Vec<usize>>,

    total_acquired: AtomicUsize,
    total_released: AtomicUsize,
    peak_usage: AtomicUsize,
}

/// An index into a [`BufferPool`], returned by [`BufferPool::acquire`].
///
/// Carries no borrow of the pool; identity for double-release detection is
/// the index itself, matched against entries already sitting in the free
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle(usize);

impl BufferPool {
    /// Creates a pool that lazily allocates up to `max_buffers` buffers of
    /// `buffer_size` bytes each.
    pub fn new(buffer_size: usize, max_buffers: usize) -> Self {
        Self {
            buffer_size,
            max_buffers,
            slots: Mutex::new(Vec::new()),
            free_stack: Mutex::new(Vec::new()),
            total_acquired: AtomicUsize::new(0),
            total_released: AtomicUsize::new(0),
            peak_usage: AtomicUsize::new(0),
        }
    }

    /// Acquires a buffer, growing the pool if it has not yet reached
    /// `max_buffers`.
    pub fn acquire(&self) -> Result<BufferHandle, PoolError> {
        self.total_acquired.fetch_add(1, Ordering::Relaxed);

        let mut free_stack = self.free_stack.lock().unwrap();
        let index = if let Some(index) = free_stack.pop() {
            let mut slots = self.slots.lock().unwrap();
            slots[index].buffer.lock().unwrap().reset();
            index
        } else {
            let mut slots = self.slots.lock().unwrap();
            if slots.len() >= self.max_buffers {
                return Err(PoolError::Exhausted);
            }
            slots.push(Slot {
                buffer: Mutex::new(Buffer::new(self.buffer_size)),
            });
            slots.len() - 1
        };
        drop(free_stack);

        self.bump_peak();
        Ok(BufferHandle(index))
    }

    fn bump_peak(&self) {
        let slots_len = self.slots.lock().unwrap().len();
        let free_len = self.free_stack.lock().unwrap().len();
        let in_use = slots_len.saturating_sub(free_len);

        let mut current = self.peak_usage.load(Ordering::Relaxed);
        while in_use > current {
            match self.peak_usage.compare_exchange_weak(
                current,
                in_use,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns a buffer to the pool, resetting it.
    pub fn release(&self, handle: BufferHandle) -> Result<(), PoolError> {
        self.total_released.fetch_add(1, Ordering::Relaxed);

        let slots = self.slots.lock().unwrap();
        if handle.0 >= slots.len() {
            return Err(PoolError::NotInPool);
        }
        drop(slots);

        let mut free_stack = self.free_stack.lock().unwrap();
        if free_stack.contains(&handle.0) {
            return Err(PoolError::AlreadyReleased);
        }
        free_stack.push(handle.0);
        Ok(())
    }

    /// Moves the buffer behind `handle` out of the pool, leaving an empty
    /// placeholder in its slot.
    ///
    /// Lets a caller hold the buffer across an `.await` point (an async
    /// socket read, for instance) without keeping the slot's mutex locked
    /// for the duration — the engines are the only callers, and each one
    /// holds exclusive use of its own handle until [`Self::put_back`].
    /// Moving the returned [`Buffer`] only moves its `Box<[u8]>` pointer,
    /// never the heap allocation itself, so addresses handed out earlier
    /// stay valid.
    pub fn take(&self, handle: BufferHandle) -> Buffer {
        let slots = self.slots.lock().unwrap();
        let mut guard = slots[handle.0].buffer.lock().unwrap();
        std::mem::replace(&mut *guard, Buffer::new(0))
    }

    /// Returns a buffer taken via [`Self::take`] to its slot.
    pub fn put_back(&self, handle: BufferHandle, buffer: Buffer) {
        let slots = self.slots.lock().unwrap();
        *slots[handle.0].buffer.lock().unwrap() = buffer;
    }

    /// Runs `f` with shared access to the buffer behind `handle`.
    pub fn with_buffer<R>(&self, handle: BufferHandle, f: impl FnOnce(&Buffer) -> R) -> R {
        let slots = self.slots.lock().unwrap();
        let buffer = slots[handle.0].buffer.lock().unwrap();
        f(&buffer)
    }

    /// Runs `f` with exclusive access to the buffer behind `handle`.
    pub fn with_buffer_mut<R>(&self, handle: BufferHandle, f: impl FnOnce(&mut Buffer) -> R) -> R {
        let slots = self.slots.lock().unwrap();
        let mut buffer = slots[handle.0].buffer.lock().unwrap();
        f(&mut buffer)
    }

    /// A snapshot of pool counters.
    pub fn stats(&self) -> PoolStats {
        let total = self.slots.lock().unwrap().len();
        let free = self.free_stack.lock().unwrap().len();

        PoolStats {
            total,
            free,
            in_use: total.saturating_sub(free),
            acquired: self.total_acquired.load(Ordering::Relaxed) as u64,
            released: self.total_released.load(Ordering::Relaxed) as u64,
            peak: self.peak_usage.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_fills_pool_then_exhausts() {
        let pool = BufferPool::new(64, 2);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Exhausted);

        pool.release(a).unwrap();
        let c = pool.acquire().unwrap();
        assert_eq!(c, a);

        pool.release(b).unwrap();
        pool.release(c).unwrap();
    }

    #[test]
    fn release_rejects_double_release() {
        let pool = BufferPool::new(64, 1);
        let handle = pool.acquire().unwrap();

        pool.release(handle).unwrap();
        assert_eq!(pool.release(handle).unwrap_err(), PoolError::AlreadyReleased);
    }

    #[test]
    fn release_rejects_foreign_handle() {
        let pool = BufferPool::new(64, 1);
        let foreign = BufferHandle(99);
        assert_eq!(pool.release(foreign).unwrap_err(), PoolError::NotInPool);
    }

    #[test]
    fn reset_clears_filled_region_but_keeps_capacity() {
        let pool = BufferPool::new(16, 1);
        let handle = pool.acquire().unwrap();

        pool.with_buffer_mut(handle, |buf| {
            buf.storage_mut()[..5].copy_from_slice(b"hello");
            buf.set_len(5);
        });
        pool.release(handle).unwrap();

        let reacquired = pool.acquire().unwrap();
        assert_eq!(reacquired, handle);
        pool.with_buffer(reacquired, |buf| {
            assert_eq!(buf.len(), 0);
            assert_eq!(buf.capacity(), 16);
        });
    }

    #[test]
    fn peak_usage_tracks_historical_maximum() {
        let pool = BufferPool::new(16, 4);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();
        assert_eq!(pool.stats().peak, 3);

        pool.release(a).unwrap();
        pool.release(b).unwrap();
        assert_eq!(pool.stats().peak, 3);

        pool.release(c).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.peak, 3);
        assert_eq!(stats.acquired, 3);
        assert_eq!(stats.released, 3);
    }

    #[test]
    fn take_and_put_back_round_trips_without_moving_storage() {
        let pool = BufferPool::new(16, 1);
        let handle = pool.acquire().unwrap();

        let mut buffer = pool.take(handle);
        buffer.storage_mut()[..3].copy_from_slice(b"abc");
        buffer.set_len(3);
        pool.put_back(handle, buffer);

        pool.with_buffer(handle, |buf| {
            assert_eq!(buf.filled(), b"abc");
            assert_eq!(buf.capacity(), 16);
        });
    }
}
