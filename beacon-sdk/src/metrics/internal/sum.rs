use super::{AtomicNumber, Aggregator, ComputeAggregation, Measure, Number, ValueMap};
use crate::common::KeyValue;
use crate::metrics::data::{AggregatedMetrics, MetricData, Sum, SumDataPoint};
use std::time::SystemTime;

struct Increment<T: Number> {
    value: T::Atomic,
}

impl<T: Number> Aggregator for Increment<T> {
    type Config = ();
    type Value = T;

    fn create(_: &()) -> Self {
        Increment {
            value: <T::Atomic as AtomicNumber<T>>::new(T::default()),
        }
    }

    fn update(&self, value: T) {
        self.value.add(value)
    }
}

/// Summarizes a set of measurements made as their arithmetic sum.
pub(crate) struct SumAggregate<T: Number> {
    value_map: ValueMap<Increment<T>>,
    monotonic: bool,
}

impl<T: Number> SumAggregate<T> {
    pub(crate) fn new(monotonic: bool) -> Self {
        SumAggregate {
            value_map: ValueMap::new(()),
            monotonic,
        }
    }
}

impl<T: Number> Measure<T> for SumAggregate<T> {
    fn call(&self, measurement: T, attributes: &[KeyValue]) {
        self.value_map.measure(measurement, attributes)
    }
}

impl<T: Number> ComputeAggregation for SumAggregate<T> {
    fn compute(&self, start_time: SystemTime, now: SystemTime) -> Option<AggregatedMetrics> {
        let data_points = self.value_map.collect(|attributes, tracker| SumDataPoint {
            attributes: attributes.to_vec(),
            value: tracker.value.load(),
        });
        if data_points.is_empty() {
            return None;
        }
        Some(T::wrap(MetricData::Sum(Sum {
            data_points,
            start_time,
            time: now,
            is_monotonic: self.monotonic,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_updates_are_not_lost() {
        let sum = Arc::new(SumAggregate::<i64>::new(false));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sum = sum.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        sum.call(if i % 2 == 0 { 3 } else { -1 }, &[]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let now = SystemTime::now();
        let Some(AggregatedMetrics::I64(MetricData::Sum(data))) = sum.compute(now, now) else {
            panic!("expected an i64 sum");
        };
        assert_eq!(data.data_points.len(), 1);
        assert_eq!(data.data_points[0].value, 4 * 3000 - 4 * 1000);
        assert!(!data.is_monotonic);
    }

    #[test]
    fn no_measurements_no_data() {
        let sum = SumAggregate::<f64>::new(true);
        let now = SystemTime::now();
        assert!(sum.compute(now, now).is_none());
    }
}
