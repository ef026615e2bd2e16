use super::{AtomicNumber, Aggregator, ComputeAggregation, Measure, Number, ValueMap};
use crate::common::KeyValue;
use crate::metrics::data::{AggregatedMetrics, Gauge, GaugeDataPoint, MetricData};
use std::time::SystemTime;

struct Assign<T: Number> {
    value: T::Atomic,
}

impl<T: Number> Aggregator for Assign<T> {
    type Config = ();
    type Value = T;

    fn create(_: &()) -> Self {
        Assign {
            value: <T::Atomic as AtomicNumber<T>>::new(T::default()),
        }
    }

    fn update(&self, value: T) {
        self.value.store(value)
    }
}

/// Summarizes a set of measurements as the last one made.
pub(crate) struct LastValueAggregate<T: Number> {
    value_map: ValueMap<Assign<T>>,
}

impl<T: Number> LastValueAggregate<T> {
    pub(crate) fn new() -> Self {
        LastValueAggregate {
            value_map: ValueMap::new(()),
        }
    }
}

impl<T: Number> Measure<T> for LastValueAggregate<T> {
    fn call(&self, measurement: T, attributes: &[KeyValue]) {
        self.value_map.measure(measurement, attributes)
    }
}

impl<T: Number> ComputeAggregation for LastValueAggregate<T> {
    fn compute(&self, start_time: SystemTime, now: SystemTime) -> Option<AggregatedMetrics> {
        let data_points = self.value_map.collect(|attributes, tracker| GaugeDataPoint {
            attributes: attributes.to_vec(),
            value: tracker.value.load(),
        });
        if data_points.is_empty() {
            return None;
        }
        Some(T::wrap(MetricData::Gauge(Gauge {
            data_points,
            start_time: Some(start_time),
            time: now,
        })))
    }
}
