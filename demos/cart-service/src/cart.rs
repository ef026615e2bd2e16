use beacon_sdk::metrics::Gauge;
use std::sync::Mutex;
use tracing::warn;

/// The shared cart item count.
///
/// Updates are serialized by the mutex and the gauge is recorded while it is
/// held, so the last recorded value is always the current count.
#[derive(Debug)]
pub(crate) struct Cart {
    count: Mutex<i64>,
    gauge: Gauge<i64>,
}

impl Cart {
    pub(crate) fn new(gauge: Gauge<i64>) -> Self {
        Cart {
            count: Mutex::new(0),
            gauge,
        }
    }

    /// Adds one item and returns the new count.
    pub(crate) fn add(&self) -> i64 {
        self.update(|count| count + 1)
    }

    /// Removes one item, never going below zero, and returns the new count.
    pub(crate) fn remove(&self) -> i64 {
        self.update(|count| (count - 1).max(0))
    }

    fn update(&self, f: impl FnOnce(i64) -> i64) -> i64 {
        let mut count = self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *count = f(*count);
        if let Err(err) = self.gauge.record(*count, &[]) {
            warn!(name: "Cart.GaugeRecordFailed", error = %err);
        }
        *count
    }
}
