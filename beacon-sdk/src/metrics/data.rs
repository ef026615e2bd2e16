//! Snapshots handed to metric exporters.
//!
//! All sums and histograms are cumulative: every snapshot reports the total
//! since the provider was built, with the provider's build time as start time.
use crate::common::{InstrumentationScope, KeyValue};
use crate::resource::Resource;
use std::borrow::Cow;
use std::time::SystemTime;

/// One collection of a provider: its resource and every scope with data.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceMetrics {
    /// Resource of the provider.
    pub resource: Resource,
    /// Per meter scope, in registration order.
    pub scope_metrics: Vec<ScopeMetrics>,
}

impl Default for ResourceMetrics {
    fn default() -> Self {
        ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: Vec::new(),
        }
    }
}

impl ResourceMetrics {
    /// Finds the first metric with the given name across all scopes.
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.scope_metrics
            .iter()
            .flat_map(|scope| scope.metrics.iter())
            .find(|metric| metric.name == name)
    }
}

/// Metrics of the instruments registered through one meter.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct ScopeMetrics {
    /// Scope of the meter.
    pub scope: InstrumentationScope,
    /// One entry per instrument that had data.
    pub metrics: Vec<Metric>,
}

/// The series of one instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    /// Instrument name.
    pub name: Cow<'static, str>,
    /// Instrument description, possibly empty.
    pub description: Cow<'static, str>,
    /// Instrument unit, possibly empty.
    pub unit: Cow<'static, str>,
    /// Aggregated series.
    pub data: AggregatedMetrics,
}

/// Series of an instrument, by number type.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregatedMetrics {
    /// Floating point instrument.
    F64(MetricData<f64>),
    /// Integer instrument.
    I64(MetricData<i64>),
}

/// Series of an instrument, by aggregation.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricData<T> {
    /// Last recorded value, from gauges.
    Gauge(Gauge<T>),
    /// Running total, from counters.
    Sum(Sum<T>),
    /// Bucketed distribution, from histograms.
    Histogram(Histogram<T>),
}

/// Last value of one attribute set.
#[derive(Clone, Debug, PartialEq)]
pub struct GaugeDataPoint<T> {
    /// Attributes identifying the series.
    pub attributes: Vec<KeyValue>,
    /// Last recorded value.
    pub value: T,
}

/// Gauge series.
#[derive(Clone, Debug, PartialEq)]
pub struct Gauge<T> {
    /// One point per attribute set.
    pub data_points: Vec<GaugeDataPoint<T>>,
    /// Start of the series, when known.
    pub start_time: Option<SystemTime>,
    /// Collection time.
    pub time: SystemTime,
}

/// Total of one attribute set.
#[derive(Clone, Debug, PartialEq)]
pub struct SumDataPoint<T> {
    /// Attributes identifying the series.
    pub attributes: Vec<KeyValue>,
    /// Total since `start_time`.
    pub value: T,
}

/// Counter series.
#[derive(Clone, Debug, PartialEq)]
pub struct Sum<T> {
    /// One point per attribute set.
    pub data_points: Vec<SumDataPoint<T>>,
    /// Build time of the provider.
    pub start_time: SystemTime,
    /// Collection time.
    pub time: SystemTime,
    /// `false` for up-down counters.
    pub is_monotonic: bool,
}

/// Histogram series.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram<T> {
    /// One point per attribute set.
    pub data_points: Vec<HistogramDataPoint<T>>,
    /// Build time of the provider.
    pub start_time: SystemTime,
    /// Collection time.
    pub time: SystemTime,
}

/// Distribution of one attribute set.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramDataPoint<T> {
    /// Attributes identifying the series.
    pub attributes: Vec<KeyValue>,
    /// Number of recorded values.
    pub count: u64,
    /// Inclusive upper bounds; the last bucket is unbounded.
    pub bounds: Vec<f64>,
    /// `bounds.len() + 1` counts.
    pub bucket_counts: Vec<u64>,
    /// Smallest value, `None` before the first record.
    pub min: Option<T>,
    /// Largest value, `None` before the first record.
    pub max: Option<T>,
    /// Sum of the recorded values.
    pub sum: T,
}
