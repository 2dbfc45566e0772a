//! Multi-producer / single-consumer ring.
//!
//! Each slot carries an atomic sequence tag. A producer claims the tail
//! with a CAS once the slot's tag says it is free, writes the element and
//! release-stores `tail + 1` into the tag; the consumer waits for the tag
//! to reach `head + 1` and frees the slot by storing `head + N`. Indices
//! grow without bound and are masked on use.

use super::{assert_capacity, CacheAligned};
use std::cell::UnsafeCell;
use std::hint;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<T>,
}

pub struct MpscRing<T> {
    /// Producer claim index.
    head: CacheAligned<AtomicUsize>,
    /// Consumer index.
    tail: CacheAligned<AtomicUsize>,
    slots: Box<[Slot<T>]>,
    mask: usize,
}

unsafe impl<T: Send> Send for MpscRing<T> {}
unsafe impl<T: Send> Sync for MpscRing<T> {}

impl<T: Copy + Default> MpscRing<T> {
    /// # Panics
    /// If `capacity` is not a power of two >= 2.
    pub fn with_capacity(capacity: usize) -> Self {
        assert_capacity(capacity);
        let slots = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(T::default()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            head: CacheAligned(AtomicUsize::new(0)),
            tail: CacheAligned(AtomicUsize::new(0)),
            slots,
            mask: capacity - 1,
        }
    }

    /// Effective capacity: one slot is reserved for full detection.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Any thread may push. Returns the value back when the ring is full.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut head = self.head.0.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[head & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - head as isize;

            if diff == 0 {
                // Slot is free; try to claim it.
                match self.head.0.compare_exchange_weak(
                    head,
                    head + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { *slot.value.get() = value };
                        slot.sequence.store(head + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => head = current,
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                // Lost the race; another producer advanced the tail.
                head = self.head.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Single consumer only.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let slot = &self.slots[tail & self.mask];
        let seq = slot.sequence.load(Ordering::Acquire);

        if seq as isize - (tail + 1) as isize == 0 {
            let value = unsafe { *slot.value.get() };
            // Free the slot for the producer one lap ahead.
            slot.sequence
                .store(tail + self.slots.len(), Ordering::Release);
            self.tail.0.store(tail + 1, Ordering::Release);
            Some(value)
        } else {
            None
        }
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
        let tail = self.tail.0.load(Ordering::Acquire);
        let seq = self.slots[tail & self.mask].sequence.load(Ordering::Acquire);
        (seq as isize - (tail + 1) as isize) < 0
    }

    /// Approximate occupancy; may be stale by the time it returns.
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Acquire);
        let tail = self.tail.0.load(Ordering::Acquire);
        head.saturating_sub(tail).min(self.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two() {
        MpscRing::<u64>::with_capacity(6);
    }

    #[test]
    fn push_pop_fifo_single_producer() {
        let ring = MpscRing::with_capacity(8);
        for i in 0..5u64 {
            ring.try_push(i).unwrap();
        }
        for i in 0..5u64 {
            assert_eq!(ring.try_pop(), Some(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn full_ring_rejects_push() {
        let ring = MpscRing::with_capacity(4);
        for i in 0..3u64 {
            ring.try_push(i).unwrap();
        }
        assert_eq!(ring.try_push(9), Err(9));
        assert_eq!(ring.try_pop(), Some(0));
        ring.try_push(9).unwrap();
    }

    #[test]
    fn four_producers_multiset_union() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 10_000;
        let ring = Arc::new(MpscRing::with_capacity(1024));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        // Tag each value with its producer.
                        ring.push_spin(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..PRODUCERS * PER_PRODUCER {
            assert!(seen.insert(ring.pop_spin()));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seen.len() as u64, PRODUCERS * PER_PRODUCER);
        assert!((0..PRODUCERS * PER_PRODUCER).all(|v| seen.contains(&v)));
        assert!(ring.is_empty());
    }

    #[test]
    fn per_producer_order_is_preserved() {
        const PER_PRODUCER: u64 = 5_000;
        let ring = Arc::new(MpscRing::with_capacity(64));

        let handles: Vec<_> = (0..2u64)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        ring.push_spin((p, i));
                    }
                })
            })
            .collect();

        let mut last = [None::<u64>; 2];
        for _ in 0..2 * PER_PRODUCER {
            let (p, i) = ring.pop_spin();
            if let Some(prev) = last[p as usize] {
                assert!(i > prev, "producer {p} went backwards: {prev} -> {i}");
            }
            last[p as usize] = Some(i);
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
