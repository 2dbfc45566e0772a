//! Subscriber contract.

use tickwire_types::Record;

/// A strategy or sink attached to the pipeline.
///
/// `on_record` runs on the dispatcher thread for every delivered record
/// and must be non-blocking; anything slow belongs on a queue the
/// subscriber drains on its own thread. Delivery is single-threaded per
/// subscriber, in decoder order. Returning `false` unsubscribes.
pub trait Subscriber: Send {
    fn on_record(&mut self, record: &Record) -> bool;

    /// Diagnostic name.
    fn name(&self) -> &str;

    /// Called once on the dispatcher thread before the first record.
    fn initialize(&mut self) {}

    /// Called once on pipeline stop or on unsubscription.
    fn shutdown(&mut self) {}
}

struct FnSubscriber<F> {
    name: String,
    callback: F,
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: FnMut(&Record) -> bool + Send,
{
    fn on_record(&mut self, record: &Record) -> bool {
        (self.callback)(record)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wraps a closure as a subscriber, for simple sinks and tests.
pub fn subscriber_from_fn<F>(name: impl Into<String>, callback: F) -> Box<dyn Subscriber>
where
    F: FnMut(&Record) -> bool + Send + 'static,
{
    Box::new(FnSubscriber {
        name: name.into(),
        callback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_subscriber_delivers_and_unsubscribes() {
        let mut count = 0u32;
        let mut sub = subscriber_from_fn("counter", move |_record| {
            count += 1;
            count < 3
        });

        let record = Record::default();
        assert!(sub.on_record(&record));
        assert!(sub.on_record(&record));
        assert!(!sub.on_record(&record));
        assert_eq!(sub.name(), "counter");
    }
}
