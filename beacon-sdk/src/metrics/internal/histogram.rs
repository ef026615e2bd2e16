use super::{Aggregator, ComputeAggregation, Measure, ValueMap};
use crate::common::KeyValue;
use crate::metrics::data::{self, AggregatedMetrics, HistogramDataPoint, MetricData};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Clone, Debug, PartialEq)]
struct Buckets {
    counts: Vec<u64>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Buckets {
    fn new(size: usize) -> Buckets {
        Buckets {
            counts: vec![0; size],
            count: 0,
            sum: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }
}

struct HistogramTracker {
    bounds: Arc<[f64]>,
    buckets: Mutex<Buckets>,
}

impl Aggregator for HistogramTracker {
    type Config = Arc<[f64]>;
    type Value = f64;

    fn create(bounds: &Arc<[f64]>) -> Self {
        HistogramTracker {
            bounds: bounds.clone(),
            buckets: Mutex::new(Buckets::new(bounds.len() + 1)),
        }
    }

    fn update(&self, value: f64) {
        // bucket `i` holds values in (bounds[i - 1], bounds[i]]
        let index = self.bounds.partition_point(|&bound| bound < value);
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets.counts[index] += 1;
            buckets.count += 1;
            buckets.sum += value;
            if value < buckets.min {
                buckets.min = value;
            }
            if value > buckets.max {
                buckets.max = value;
            }
        }
    }
}

/// Summarizes a set of measurements as a histogram with explicitly defined
/// buckets.
pub(crate) struct HistogramAggregate {
    value_map: ValueMap<HistogramTracker>,
    bounds: Arc<[f64]>,
}

impl HistogramAggregate {
    /// `bounds` must be sorted, unique and finite.
    pub(crate) fn new(bounds: Vec<f64>) -> Self {
        let bounds: Arc<[f64]> = bounds.into();
        HistogramAggregate {
            value_map: ValueMap::new(bounds.clone()),
            bounds,
        }
    }
}

impl Measure<f64> for HistogramAggregate {
    fn call(&self, measurement: f64, attributes: &[KeyValue]) {
        self.value_map.measure(measurement, attributes)
    }
}

impl ComputeAggregation for HistogramAggregate {
    fn compute(&self, start_time: SystemTime, now: SystemTime) -> Option<AggregatedMetrics> {
        let data_points: Vec<_> = self
            .value_map
            .collect(|attributes, tracker| {
                let buckets = tracker.buckets.lock().ok()?.clone();
                Some(HistogramDataPoint {
                    attributes: attributes.to_vec(),
                    count: buckets.count,
                    bounds: self.bounds.to_vec(),
                    bucket_counts: buckets.counts,
                    min: (buckets.count > 0).then_some(buckets.min),
                    max: (buckets.count > 0).then_some(buckets.max),
                    sum: buckets.sum,
                })
            })
            .into_iter()
            .flatten()
            .collect();
        if data_points.is_empty() {
            return None;
        }
        Some(AggregatedMetrics::F64(MetricData::Histogram(data::Histogram {
            data_points,
            start_time,
            time: now,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(histogram: &HistogramAggregate) -> data::Histogram<f64> {
        let now = SystemTime::now();
        match histogram.compute(now, now) {
            Some(AggregatedMetrics::F64(MetricData::Histogram(data))) => data,
            other => panic!("unexpected aggregation {other:?}"),
        }
    }

    #[test]
    fn values_land_in_inclusive_upper_bound_buckets() {
        let histogram = HistogramAggregate::new(vec![1.0, 5.0, 10.0]);
        for value in [0.5, 1.0, 3.0, 5.0, 7.5, 10.0, 42.0] {
            histogram.call(value, &[]);
        }

        let data = compute(&histogram);
        let point = &data.data_points[0];
        assert_eq!(point.bucket_counts, vec![2, 2, 2, 1]);
        assert_eq!(point.count, 7);
        assert_eq!(point.sum, 69.0);
        assert_eq!(point.min, Some(0.5));
        assert_eq!(point.max, Some(42.0));
        assert_eq!(point.bounds, vec![1.0, 5.0, 10.0]);
    }

    #[test]
    fn attribute_sets_are_tracked_separately() {
        let histogram = HistogramAggregate::new(vec![1.0]);
        histogram.call(0.1, &[KeyValue::new("route", "/")]);
        histogram.call(2.0, &[KeyValue::new("route", "/cart/add")]);

        let data = compute(&histogram);
        assert_eq!(data.data_points.len(), 2);
        assert!(data.data_points.iter().all(|point| point.count == 1));
    }
}
