//! Monotonic nanosecond clock.

use once_cell::sync::Lazy;
use std::time::Instant;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds on a process-local monotonic clock.
///
/// The zero point is the first call in the process; values are comparable
/// across threads and never go backwards. This is the clock behind every
/// `local_timestamp` and latency aggregate in the pipeline.
#[inline]
pub fn monotonic_ns() -> u64 {
    EPOCH.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        let c = monotonic_ns();
        assert!(a <= b && b <= c);
    }
}
