use super::ComputeAggregation;
use crate::metrics::data::{AggregatedMetrics, Gauge, GaugeDataPoint, MetricData};
use crate::metrics::GaugeSampler;
use crate::{beacon_error, beacon_warn};
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::time::SystemTime;

/// Polls a [`GaugeSampler`] on every collection.
///
/// A failing or panicking sampler only costs the data point of that
/// collection.
pub(crate) struct ObservableGaugeAggregate {
    name: Cow<'static, str>,
    sampler: Box<dyn GaugeSampler>,
}

impl ObservableGaugeAggregate {
    pub(crate) fn new(name: Cow<'static, str>, sampler: Box<dyn GaugeSampler>) -> Self {
        ObservableGaugeAggregate { name, sampler }
    }
}

impl ComputeAggregation for ObservableGaugeAggregate {
    fn compute(&self, start_time: SystemTime, now: SystemTime) -> Option<AggregatedMetrics> {
        let value = match panic::catch_unwind(AssertUnwindSafe(|| self.sampler.sample())) {
            Ok(Ok(value)) if value.is_finite() => value,
            Ok(Ok(value)) => {
                beacon_warn!(
                    name: "ObservableGauge.NonFiniteSample",
                    instrument = self.name.to_string(),
                    value = value.to_string()
                );
                return None;
            }
            Ok(Err(err)) => {
                beacon_warn!(
                    name: "ObservableGauge.SampleFailed",
                    instrument = self.name.to_string(),
                    error = format!("{err}")
                );
                return None;
            }
            Err(_) => {
                beacon_error!(
                    name: "ObservableGauge.SamplerPanicked",
                    instrument = self.name.to_string()
                );
                return None;
            }
        };

        Some(AggregatedMetrics::F64(MetricData::Gauge(Gauge {
            data_points: vec![GaugeDataPoint {
                attributes: Vec::new(),
                value,
            }],
            start_time: Some(start_time),
            time: now,
        })))
    }
}
