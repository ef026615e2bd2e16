//! Per attribute set aggregation of recorded measurements.
mod histogram;
mod last_value;
mod observable;
mod sum;

pub(crate) use histogram::HistogramAggregate;
pub(crate) use last_value::LastValueAggregate;
pub(crate) use observable::ObservableGaugeAggregate;
pub(crate) use sum::SumAggregate;

use crate::beacon_warn;
use crate::common::{Key, KeyValue, Value};
use crate::metrics::data::{AggregatedMetrics, MetricData};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Maximum number of distinct attribute sets per instrument, the overflow
/// series included.
pub(crate) const CARDINALITY_LIMIT: usize = 2000;

/// Attribute marking the series that absorbs measurements past the limit.
pub(crate) const OVERFLOW_KEY: Key = Key::from_static_str("otel.metric.overflow");

/// Receives measurements on the recording path.
pub(crate) trait Measure<T>: Send + Sync + 'static {
    fn call(&self, measurement: T, attributes: &[KeyValue]);
}

/// Produces the aggregated data of one instrument on the collection path.
///
/// Returns `None` when the instrument has no data point to report.
pub(crate) trait ComputeAggregation: Send + Sync + 'static {
    fn compute(&self, start_time: SystemTime, now: SystemTime) -> Option<AggregatedMetrics>;
}

/// Numeric types instruments can record.
pub(crate) trait Number: Copy + Default + PartialOrd + fmt::Debug + Send + Sync + 'static {
    type Atomic: AtomicNumber<Self>;

    fn is_finite(self) -> bool;

    fn wrap(data: MetricData<Self>) -> AggregatedMetrics;
}

/// Lock-free storage for a [`Number`].
pub(crate) trait AtomicNumber<T>: Send + Sync + 'static {
    fn new(value: T) -> Self;
    fn add(&self, value: T);
    fn store(&self, value: T);
    fn load(&self) -> T;
}

impl Number for i64 {
    type Atomic = AtomicI64;

    fn is_finite(self) -> bool {
        true
    }

    fn wrap(data: MetricData<Self>) -> AggregatedMetrics {
        AggregatedMetrics::I64(data)
    }
}

impl Number for f64 {
    type Atomic = AtomicF64;

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn wrap(data: MetricData<Self>) -> AggregatedMetrics {
        AggregatedMetrics::F64(data)
    }
}

impl AtomicNumber<i64> for AtomicI64 {
    fn new(value: i64) -> Self {
        AtomicI64::new(value)
    }

    fn add(&self, value: i64) {
        self.fetch_add(value, Ordering::Relaxed);
    }

    fn store(&self, value: i64) {
        AtomicI64::store(self, value, Ordering::Relaxed);
    }

    fn load(&self) -> i64 {
        AtomicI64::load(self, Ordering::Relaxed)
    }
}

/// An `f64` stored as its bit pattern.
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicNumber<f64> for AtomicF64 {
    fn new(value: f64) -> Self {
        AtomicF64(AtomicU64::new(value.to_bits()))
    }

    fn add(&self, value: f64) {
        // the closure always returns Some, so the update cannot fail
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// A sorted, de-duplicated set of attributes identifying one time series.
///
/// When a key is repeated the last value wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct AttributeSet(Vec<KeyValue>);

impl From<&[KeyValue]> for AttributeSet {
    fn from(values: &[KeyValue]) -> Self {
        let mut values = values.to_vec();
        values.sort_by(|a, b| a.key.cmp(&b.key));
        values.reverse();
        values.dedup_by(|a, b| a.key == b.key);
        values.reverse();
        AttributeSet(values)
    }
}

impl AttributeSet {
    fn overflow() -> Self {
        AttributeSet(vec![KeyValue {
            key: OVERFLOW_KEY,
            value: Value::Bool(true),
        }])
    }

    pub(crate) fn to_vec(&self) -> Vec<KeyValue> {
        self.0.clone()
    }
}

/// State kept for a single attribute set.
pub(crate) trait Aggregator: Send + Sync + 'static {
    type Config: Send + Sync + 'static;
    type Value;

    fn create(config: &Self::Config) -> Self;

    fn update(&self, value: Self::Value);
}

/// Maps attribute sets to their aggregator.
///
/// Lookups of known attribute sets only take the read lock. Once the map
/// holds `cardinality_limit - 1` attribute sets, measurements for new sets are
/// folded into a single overflow series.
pub(crate) struct ValueMap<A: Aggregator> {
    trackers: RwLock<HashMap<AttributeSet, Arc<A>>>,
    config: A::Config,
    cardinality_limit: usize,
}

impl<A: Aggregator> ValueMap<A> {
    pub(crate) fn new(config: A::Config) -> Self {
        Self::with_cardinality_limit(config, CARDINALITY_LIMIT)
    }

    pub(crate) fn with_cardinality_limit(config: A::Config, cardinality_limit: usize) -> Self {
        ValueMap {
            trackers: RwLock::new(HashMap::new()),
            config,
            cardinality_limit: cardinality_limit.max(2),
        }
    }

    pub(crate) fn measure(&self, value: A::Value, attributes: &[KeyValue]) {
        let attributes = AttributeSet::from(attributes);
        if let Ok(trackers) = self.trackers.read() {
            if let Some(tracker) = trackers.get(&attributes) {
                tracker.update(value);
                return;
            }
        }

        let Ok(mut trackers) = self.trackers.write() else {
            return;
        };
        // another thread may have inserted the set in between
        let key = if trackers.contains_key(&attributes)
            || trackers.len() < self.cardinality_limit - 1
        {
            attributes
        } else {
            let overflow = AttributeSet::overflow();
            if !trackers.contains_key(&overflow) {
                beacon_warn!(
                    name: "Metrics.CardinalityLimitReached",
                    cardinality_limit = self.cardinality_limit,
                    message = "Measurements for new attribute sets are folded into the overflow series."
                );
            }
            overflow
        };
        trackers
            .entry(key)
            .or_insert_with(|| Arc::new(A::create(&self.config)))
            .update(value);
    }

    /// Maps every tracked attribute set to an output value.
    pub(crate) fn collect<T>(&self, mut f: impl FnMut(&AttributeSet, &A) -> T) -> Vec<T> {
        match self.trackers.read() {
            Ok(trackers) => trackers
                .iter()
                .map(|(attributes, tracker)| f(attributes, tracker))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
