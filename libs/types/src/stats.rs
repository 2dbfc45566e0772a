//! Pipeline statistics.
//!
//! Each stage increments its own counters with relaxed stores; readers
//! take acquire snapshots and may observe slightly stale but monotone
//! values. The latency aggregate has a single writer (the dispatcher), so
//! plain load/compare/store is race-free there.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter block shared between the pipeline stages.
#[derive(Debug)]
#[repr(C, align(64))]
pub struct Statistics {
    pub packets_received: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub messages_parsed: AtomicU64,
    pub messages_dispatched: AtomicU64,
    pub fanout_drops: AtomicU64,
    pub parse_errors: AtomicU64,
    pub min_latency_ns: AtomicU64,
    pub max_latency_ns: AtomicU64,
    pub total_latency_ns: AtomicU64,
    pub latency_samples: AtomicU64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            messages_parsed: AtomicU64::new(0),
            messages_dispatched: AtomicU64::new(0),
            fanout_drops: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            min_latency_ns: AtomicU64::new(u64::MAX),
            max_latency_ns: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one receipt-to-dispatch latency sample into the aggregate.
    /// Single writer: only the dispatcher thread calls this.
    #[inline]
    pub fn record_latency(&self, latency_ns: u64) {
        if latency_ns < self.min_latency_ns.load(Ordering::Relaxed) {
            self.min_latency_ns.store(latency_ns, Ordering::Relaxed);
        }
        if latency_ns > self.max_latency_ns.load(Ordering::Relaxed) {
            self.max_latency_ns.store(latency_ns, Ordering::Relaxed);
        }
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Acquire),
            packets_dropped: self.packets_dropped.load(Ordering::Acquire),
            messages_parsed: self.messages_parsed.load(Ordering::Acquire),
            messages_dispatched: self.messages_dispatched.load(Ordering::Acquire),
            fanout_drops: self.fanout_drops.load(Ordering::Acquire),
            parse_errors: self.parse_errors.load(Ordering::Acquire),
            min_latency_ns: self.min_latency_ns.load(Ordering::Acquire),
            max_latency_ns: self.max_latency_ns.load(Ordering::Acquire),
            total_latency_ns: self.total_latency_ns.load(Ordering::Acquire),
            latency_samples: self.latency_samples.load(Ordering::Acquire),
        }
    }
}

/// Plain-data copy of [`Statistics`] for reporting and serialization.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub messages_parsed: u64,
    pub messages_dispatched: u64,
    pub fanout_drops: u64,
    pub parse_errors: u64,
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
    pub total_latency_ns: u64,
    pub latency_samples: u64,
}

impl StatsSnapshot {
    /// Mean receipt-to-dispatch latency, 0.0 before the first sample.
    pub fn avg_latency_ns(&self) -> f64 {
        if self.latency_samples > 0 {
            self.total_latency_ns as f64 / self.latency_samples as f64
        } else {
            0.0
        }
    }
}
