//! Bounded lock-free ring buffers.
//!
//! Both rings require a power-of-two capacity of at least 2 and reserve
//! one slot to tell full from empty, so the effective capacity is N-1.
//! Neither allocates nor takes a lock after construction; a full ring
//! reports failure and leaves the drop/spin/backpressure decision to the
//! caller.

mod mpsc;
mod spsc;

pub use mpsc::MpscRing;
pub use spsc::SpscRing;

/// Independently mutated atomics live on their own cache lines so the
/// producer and consumer cores do not ping-pong ownership.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub(crate) struct CacheAligned<T>(pub T);

pub(crate) fn assert_capacity(capacity: usize) {
    assert!(
        capacity >= 2 && capacity.is_power_of_two(),
        "ring capacity must be a power of two >= 2, got {capacity}"
    );
}
