//! Single-producer / single-consumer ring.
//!
//! Index protocol: the producer owns `head`, the consumer owns `tail`.
//! A slot's data is published by the release store of `head` and observed
//! through the matching acquire load on the consumer side; the mirror
//! holds for slot reuse via `tail`. Wait-free on both ends.

use super::{assert_capacity, CacheAligned};
use std::cell::UnsafeCell;
use std::hint;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct SpscRing<T> {
    /// Producer index: next slot to write.
    head: CacheAligned<AtomicUsize>,
    /// Consumer index: next slot to read.
    tail: CacheAligned<AtomicUsize>,
    buffer: Box<[UnsafeCell<T>]>,
    mask: usize,
}

// One producer thread and one consumer thread may hold &SpscRing
// concurrently; the index protocol keeps their slot accesses disjoint.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T: Copy + Default> SpscRing<T> {
    /// All slots are allocated and default-initialized up front; nothing
    /// allocates after this.
    ///
    /// # Panics
    /// If `capacity` is not a power of two >= 2.
    pub fn with_capacity(capacity: usize) -> Self {
        assert_capacity(capacity);
        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            head: CacheAligned(AtomicUsize::new(0)),
            tail: CacheAligned(AtomicUsize::new(0)),
            buffer,
            mask: capacity - 1,
        }
    }

    /// Effective capacity: one slot is reserved for full detection.
    pub fn capacity(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Producer side. Returns the value back when the ring is full.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let head = self.head.0.load(Ordering::Relaxed);
        let next = (head + 1) & self.mask;
        if next == self.tail.0.load(Ordering::Acquire) {
            return Err(value);
        }

        unsafe { *self.buffer[head].get() = value };
        self.head.0.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        if tail == self.head.0.load(Ordering::Acquire) {
            return None;
        }

        let value = unsafe { *self.buffer[tail].get() };
        self.tail.0.store((tail + 1) & self.mask, Ordering::Release);
        Some(value)
    }

    /// Producer side, writing in place: stages the next free slot, hands
    /// it to `fill`, and publishes only when `fill` returns true. This is
    /// how the ingress receives datagrams straight into ring storage
    /// without an intermediate copy.
    ///
    /// Returns `None` when the ring is full, otherwise whether the slot
    /// was published.
    #[inline]
    pub fn try_produce_with<F>(&self, fill: F) -> Option<bool>
    where
        F: FnOnce(&mut T) -> bool,
    {
        let head = self.head.0.load(Ordering::Relaxed);
        let next = (head + 1) & self.mask;
        if next == self.tail.0.load(Ordering::Acquire) {
            return None;
        }

        let slot = unsafe { &mut *self.buffer[head].get() };
        if fill(slot) {
            self.head.0.store(next, Ordering::Release);
            Some(true)
        } else {
            Some(false)
        }
    }

    /// Consumer side, reading in place: the slot is borrowed for the
    /// duration of `read` and released when it returns, so large elements
    /// are never copied out.
    #[inline]
    pub fn try_consume_with<F, R>(&self, read: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let tail = self.tail.0.load(Ordering::Relaxed);
        if tail == self.head.0.load(Ordering::Acquire) {
            return None;
        }

        let result = read(unsafe { &*self.buffer[tail].get() });
        self.tail.0.store((tail + 1) & self.mask, Ordering::Release);
        Some(result)
    }

    /// Blocking push: spins with a CPU pause hint until a slot frees up.
    pub fn push_spin(&self, mut value: T) {
        loop {
            match self.try_push(value) {
                Ok(()) => return,
                Err(v) => value = v,
            }
            hint::spin_loop();
        }
    }

    /// Blocking pop: spins with a CPU pause hint until an element arrives.
    pub fn pop_spin(&self) -> T {
        loop {
            if let Some(value) = self.try_pop() {
                return value;
            }
            hint::spin_loop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tail.0.load(Ordering::Acquire) == self.head.0.load(Ordering::Acquire)
    }

    /// Approximate occupancy; may be stale by the time it returns.
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Acquire);
        let tail = self.tail.0.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.mask
    }
}
