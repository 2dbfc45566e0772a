//! Record fan-out and subscriber delivery.
//!
//! One dispatcher thread does both halves: it drains the decoder's
//! output ring into every live subscriber's private ring (dropping, never
//! blocking, when one is full), then drives each subscriber's callback
//! from its own ring. Delivery is therefore single-threaded per
//! subscriber and preserves decoder order; a slow or dead subscriber can
//! only ever lose its own records.

use crate::ring::SpscRing;
use crate::subscriber::Subscriber;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tickwire_types::{monotonic_ns, Record, Statistics};
use tracing::{debug, info, warn};

/// Records moved per ring per loop iteration. Keeps fan-out and delivery
/// interleaved under sustained load.
const DISPATCH_BURST: usize = 512;

struct SubscriberSlot {
    subscriber: Box<dyn Subscriber>,
    queue: SpscRing<Record>,
    alive: bool,
}

/// Owns the registered subscribers and their private rings.
pub struct Dispatcher {
    slots: Vec<SubscriberSlot>,
    queue_capacity: usize,
}

impl Dispatcher {
    pub(crate) fn new(queue_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            queue_capacity,
        }
    }

    /// Registers a subscriber with a freshly allocated private ring.
    pub(crate) fn add(&mut self, subscriber: Box<dyn Subscriber>) {
        info!(name = subscriber.name(), "subscriber registered");
        self.slots.push(SubscriberSlot {
            subscriber,
            queue: SpscRing::with_capacity(self.queue_capacity),
            alive: true,
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.slots.len()
    }

    /// Dispatcher thread body. Returns itself so live subscribers survive
    /// a stop/start cycle.
    pub(crate) fn run(
        mut self,
        records: Arc<SpscRing<Record>>,
        stats: Arc<Statistics>,
        running: Arc<AtomicBool>,
    ) -> Self {
        for slot in &mut self.slots {
            slot.subscriber.initialize();
        }
        debug!(subscribers = self.slots.len(), "dispatcher thread running");

        while running.load(Ordering::Relaxed) {
            let mut active = false;

            // Fan out a burst from the decoder's ring.
            for _ in 0..DISPATCH_BURST {
                let Some(record) = records.try_pop() else { break };
                active = true;
                self.fan_out(&record, &stats);
            }

            // Drive delivery per subscriber from its private ring.
            for slot in &mut self.slots {
                if !slot.alive {
                    continue;
                }
                for _ in 0..DISPATCH_BURST {
                    let Some(record) = slot.queue.try_pop() else { break };
                    active = true;
                    deliver(slot, &record);
                }
            }

            if !active {
                thread::yield_now();
            }
        }

        // Lifecycle end: shutdown for everyone still alive, dead slots
        // (already shut down at unsubscription) are released.
        for slot in &mut self.slots {
            if slot.alive {
                guarded_shutdown(slot);
            }
        }
        self.slots.retain(|slot| slot.alive);
        debug!("dispatcher thread exiting");
        self
    }

    fn fan_out(&mut self, record: &Record, stats: &Statistics) {
        let latency = monotonic_ns().saturating_sub(record.local_timestamp);

        for slot in &mut self.slots {
            if !slot.alive {
                continue;
            }
            if slot.queue.try_push(*record).is_err() {
                stats.fanout_drops.fetch_add(1, Ordering::Relaxed);
            }
        }

        stats.messages_dispatched.fetch_add(1, Ordering::Relaxed);
        stats.record_latency(latency);
    }
}

fn deliver(slot: &mut SubscriberSlot, record: &Record) {
    match catch_unwind(AssertUnwindSafe(|| slot.subscriber.on_record(record))) {
        Ok(true) => {}
        Ok(false) => {
            info!(name = slot.subscriber.name(), "subscriber unsubscribed");
            guarded_shutdown(slot);
            slot.alive = false;
        }
        Err(_) => {
            warn!(name = slot.subscriber.name(), "subscriber panicked, detaching");
            guarded_shutdown(slot);
            slot.alive = false;
        }
    }
}

fn guarded_shutdown(slot: &mut SubscriberSlot) {
    if catch_unwind(AssertUnwindSafe(|| slot.subscriber.shutdown())).is_err() {
        warn!(name = slot.subscriber.name(), "subscriber shutdown panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::subscriber_from_fn;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;
    use tickwire_types::EventKind;

    fn run_records(dispatcher: Dispatcher, records: Vec<Record>) -> (Dispatcher, Arc<Statistics>) {
        let count = records.len() as u64;
        let ring = Arc::new(SpscRing::with_capacity(1024));
        for record in records {
            ring.try_push(record).unwrap();
        }
        let stats = Arc::new(Statistics::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let ring = Arc::clone(&ring);
            let stats = Arc::clone(&stats);
            let running = Arc::clone(&running);
            thread::spawn(move || dispatcher.run(ring, stats, running))
        };
        // Wait for full fan-out, give delivery one more beat, then stop.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while stats.snapshot().messages_dispatched < count
            && std::time::Instant::now() < deadline
        {
            thread::yield_now();
        }
        thread::sleep(std::time::Duration::from_millis(100));
        running.store(false, Ordering::Release);
        (handle.join().unwrap(), stats)
    }

    fn record_with_seq(sequence: u32) -> Record {
        Record {
            kind: EventKind::Trade,
            sequence,
            local_timestamp: monotonic_ns(),
            ..Record::default()
        }
    }

    #[test]
    fn delivers_in_order_to_every_subscriber() {
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));

        let mut dispatcher = Dispatcher::new(256);
        for seen in [&seen_a, &seen_b] {
            let seen = Arc::clone(seen);
            dispatcher.add(subscriber_from_fn("collector", move |r| {
                seen.lock().unwrap().push(r.sequence);
                true
            }));
        }

        let records = (0..100).map(record_with_seq).collect();
        let (dispatcher, stats) = run_records(dispatcher, records);

        let expected: Vec<u32> = (0..100).collect();
        assert_eq!(*seen_a.lock().unwrap(), expected);
        assert_eq!(*seen_b.lock().unwrap(), expected);
        assert_eq!(stats.snapshot().messages_dispatched, 100);
        assert_eq!(stats.snapshot().fanout_drops, 0);
        assert_eq!(dispatcher.subscriber_count(), 2);
    }

    #[test]
    fn unsubscribe_after_ten_records() {
        let calls = Arc::new(AtomicU64::new(0));
        let shutdowns = Arc::new(AtomicU64::new(0));

        struct CountingSub {
            calls: Arc<AtomicU64>,
            shutdowns: Arc<AtomicU64>,
        }
        impl Subscriber for CountingSub {
            fn on_record(&mut self, _: &Record) -> bool {
                self.calls.fetch_add(1, Ordering::Relaxed) + 1 < 10
            }
            fn name(&self) -> &str {
                "ten-and-out"
            }
            fn shutdown(&mut self) {
                self.shutdowns.fetch_add(1, Ordering::Relaxed);
            }
        }

        let other = Arc::new(AtomicU64::new(0));
        let mut dispatcher = Dispatcher::new(64);
        dispatcher.add(Box::new(CountingSub {
            calls: Arc::clone(&calls),
            shutdowns: Arc::clone(&shutdowns),
        }));
        {
            let other = Arc::clone(&other);
            dispatcher.add(subscriber_from_fn("steady", move |_| {
                other.fetch_add(1, Ordering::Relaxed);
                true
            }));
        }

        let records = (0..25).map(record_with_seq).collect();
        let (dispatcher, _) = run_records(dispatcher, records);

        // Exactly ten callbacks, one shutdown, other subscriber untouched.
        assert_eq!(calls.load(Ordering::Relaxed), 10);
        assert_eq!(shutdowns.load(Ordering::Relaxed), 1);
        assert_eq!(other.load(Ordering::Relaxed), 25);
        // The dead slot is released at stop.
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[test]
    fn panicking_subscriber_is_detached_not_fatal() {
        let survivor = Arc::new(AtomicU64::new(0));

        let mut dispatcher = Dispatcher::new(64);
        dispatcher.add(subscriber_from_fn("bomb", |record| {
            if record.sequence == 3 {
                panic!("subscriber bug");
            }
            true
        }));
        {
            let survivor = Arc::clone(&survivor);
            dispatcher.add(subscriber_from_fn("survivor", move |_| {
                survivor.fetch_add(1, Ordering::Relaxed);
                true
            }));
        }

        let records = (0..20).map(record_with_seq).collect();
        let (dispatcher, _) = run_records(dispatcher, records);

        assert_eq!(survivor.load(Ordering::Relaxed), 20);
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[test]
    fn full_subscriber_ring_drops_are_isolated() {
        // A's ring (capacity 3 effective) is never drained; B's is
        // drained after every fan-out. A's overflow must cost B nothing.
        let mut dispatcher = Dispatcher::new(4);
        dispatcher.add(subscriber_from_fn("stuck", |_| true));
        dispatcher.add(subscriber_from_fn("fast", |_| true));

        let stats = Statistics::new();
        let mut b_records = Vec::new();
        for sequence in 0..10 {
            dispatcher.fan_out(&record_with_seq(sequence), &stats);
            while let Some(record) = dispatcher.slots[1].queue.try_pop() {
                b_records.push(record.sequence);
            }
        }

        let expected: Vec<u32> = (0..10).collect();
        assert_eq!(b_records, expected);

        let snap = stats.snapshot();
        assert_eq!(snap.messages_dispatched, 10);
        // A accepted 3 records and dropped the remaining 7.
        assert_eq!(snap.fanout_drops, 7);
        assert_eq!(dispatcher.slots[0].queue.len(), 3);
    }
}
