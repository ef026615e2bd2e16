use crate::transform::common::{attributes_to_tonic, resource_to_tonic, scope_to_tonic, to_nanos};
use beacon_sdk::metrics::data::{
    AggregatedMetrics, Gauge as SdkGauge, Histogram as SdkHistogram, Metric as SdkMetric,
    MetricData, ResourceMetrics, ScopeMetrics as SdkScopeMetrics, Sum as SdkSum,
};
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data as TonicMetricData, number_data_point::Value as TonicDataPointValue,
    AggregationTemporality, DataPointFlags as TonicDataPointFlags, Gauge as TonicGauge,
    Histogram as TonicHistogram, HistogramDataPoint as TonicHistogramDataPoint,
    Metric as TonicMetric, NumberDataPoint as TonicNumberDataPoint,
    ResourceMetrics as TonicResourceMetrics, ScopeMetrics as TonicScopeMetrics, Sum as TonicSum,
};

trait Numeric: Copy {
    // lossy at large values for i64 but otlp histograms only handle float values
    fn into_f64(self) -> f64;
    fn to_data_point_value(self) -> TonicDataPointValue;
}

impl Numeric for i64 {
    fn into_f64(self) -> f64 {
        self as f64
    }

    fn to_data_point_value(self) -> TonicDataPointValue {
        TonicDataPointValue::AsInt(self)
    }
}

impl Numeric for f64 {
    fn into_f64(self) -> f64 {
        self
    }

    fn to_data_point_value(self) -> TonicDataPointValue {
        TonicDataPointValue::AsDouble(self)
    }
}

/// Builds the export request for one snapshot.
pub fn resource_metrics_to_export_request(rm: &ResourceMetrics) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![TonicResourceMetrics {
            resource: Some(resource_to_tonic(&rm.resource)),
            scope_metrics: rm
                .scope_metrics
                .iter()
                .map(sdk_scope_metrics_to_tonic_scope_metrics)
                .collect(),
            schema_url: String::new(),
        }],
    }
}

fn sdk_scope_metrics_to_tonic_scope_metrics(sm: &SdkScopeMetrics) -> TonicScopeMetrics {
    TonicScopeMetrics {
        scope: Some(scope_to_tonic(&sm.scope)),
        metrics: sm.metrics.iter().map(sdk_metric_to_tonic_metric).collect(),
        schema_url: String::new(),
    }
}

/// Converts one metric.
pub fn sdk_metric_to_tonic_metric(metric: &SdkMetric) -> TonicMetric {
    TonicMetric {
        name: metric.name.to_string(),
        description: metric.description.to_string(),
        unit: metric.unit.to_string(),
        metadata: vec![],
        data: Some(match &metric.data {
            AggregatedMetrics::F64(data) => metric_data_to_tonic_metric_data(data),
            AggregatedMetrics::I64(data) => metric_data_to_tonic_metric_data(data),
        }),
    }
}

fn metric_data_to_tonic_metric_data<T: Numeric>(data: &MetricData<T>) -> TonicMetricData {
    match data {
        MetricData::Gauge(gauge) => TonicMetricData::Gauge(sdk_gauge_to_tonic_gauge(gauge)),
        MetricData::Sum(sum) => TonicMetricData::Sum(sdk_sum_to_tonic_sum(sum)),
        MetricData::Histogram(hist) => {
            TonicMetricData::Histogram(sdk_histogram_to_tonic_histogram(hist))
        }
    }
}

fn sdk_gauge_to_tonic_gauge<T: Numeric>(gauge: &SdkGauge<T>) -> TonicGauge {
    TonicGauge {
        data_points: gauge
            .data_points
            .iter()
            .map(|dp| TonicNumberDataPoint {
                attributes: attributes_to_tonic(&dp.attributes),
                start_time_unix_nano: gauge.start_time.map(to_nanos).unwrap_or_default(),
                time_unix_nano: to_nanos(gauge.time),
                exemplars: vec![],
                flags: TonicDataPointFlags::default() as u32,
                value: Some(dp.value.to_data_point_value()),
            })
            .collect(),
    }
}

fn sdk_sum_to_tonic_sum<T: Numeric>(sum: &SdkSum<T>) -> TonicSum {
    TonicSum {
        data_points: sum
            .data_points
            .iter()
            .map(|dp| TonicNumberDataPoint {
                attributes: attributes_to_tonic(&dp.attributes),
                start_time_unix_nano: to_nanos(sum.start_time),
                time_unix_nano: to_nanos(sum.time),
                exemplars: vec![],
                flags: TonicDataPointFlags::default() as u32,
                value: Some(dp.value.to_data_point_value()),
            })
            .collect(),
        aggregation_temporality: AggregationTemporality::Cumulative.into(),
        is_monotonic: sum.is_monotonic,
    }
}

fn sdk_histogram_to_tonic_histogram<T: Numeric>(hist: &SdkHistogram<T>) -> TonicHistogram {
    TonicHistogram {
        data_points: hist
            .data_points
            .iter()
            .map(|dp| TonicHistogramDataPoint {
                attributes: attributes_to_tonic(&dp.attributes),
                start_time_unix_nano: to_nanos(hist.start_time),
                time_unix_nano: to_nanos(hist.time),
                count: dp.count,
                sum: Some(dp.sum.into_f64()),
                bucket_counts: dp.bucket_counts.clone(),
                explicit_bounds: dp.bounds.clone(),
                exemplars: vec![],
                flags: TonicDataPointFlags::default() as u32,
                min: dp.min.map(Numeric::into_f64),
                max: dp.max.map(Numeric::into_f64),
            })
            .collect(),
        aggregation_temporality: AggregationTemporality::Cumulative.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_sdk::metrics::data::{HistogramDataPoint, SumDataPoint};
    use beacon_sdk::{InstrumentationScope, KeyValue, Resource};
    use std::time::{Duration, SystemTime};

    fn snapshot(data: AggregatedMetrics) -> ResourceMetrics {
        ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: vec![SdkScopeMetrics {
                scope: InstrumentationScope::new("cart"),
                metrics: vec![SdkMetric {
                    name: "metric".into(),
                    description: "a metric".into(),
                    unit: "{call}".into(),
                    data,
                }],
            }],
        }
    }

    fn only_metric(request: &ExportMetricsServiceRequest) -> &TonicMetric {
        &request.resource_metrics[0].scope_metrics[0].metrics[0]
    }

    #[test]
    fn cumulative_sum() {
        let start_time = SystemTime::now();
        let request = resource_metrics_to_export_request(&snapshot(AggregatedMetrics::I64(
            MetricData::Sum(SdkSum {
                data_points: vec![SumDataPoint {
                    attributes: vec![KeyValue::new("route", "/")],
                    value: 3,
                }],
                start_time,
                time: start_time + Duration::from_secs(3),
                is_monotonic: true,
            }),
        )));

        let metric = only_metric(&request);
        assert_eq!(metric.unit, "{call}");
        let Some(TonicMetricData::Sum(sum)) = &metric.data else {
            panic!("expected a sum");
        };
        assert!(sum.is_monotonic);
        assert_eq!(sum.aggregation_temporality, AggregationTemporality::Cumulative as i32);
        let dp = &sum.data_points[0];
        assert_eq!(dp.value, Some(TonicDataPointValue::AsInt(3)));
        assert_eq!(dp.time_unix_nano - dp.start_time_unix_nano, 3_000_000_000);
    }

    #[test]
    fn histogram_keeps_buckets() {
        let now = SystemTime::now();
        let request = resource_metrics_to_export_request(&snapshot(AggregatedMetrics::F64(
            MetricData::Histogram(SdkHistogram {
                data_points: vec![HistogramDataPoint {
                    attributes: vec![],
                    count: 4,
                    bounds: vec![0.1, 1.0],
                    bucket_counts: vec![1, 2, 1],
                    min: Some(0.05),
                    max: Some(3.0),
                    sum: 4.25,
                }],
                start_time: now,
                time: now,
            }),
        )));

        let Some(TonicMetricData::Histogram(hist)) = &only_metric(&request).data else {
            panic!("expected a histogram");
        };
        let dp = &hist.data_points[0];
        assert_eq!(dp.count, 4);
        assert_eq!(dp.explicit_bounds, vec![0.1, 1.0]);
        assert_eq!(dp.bucket_counts, vec![1, 2, 1]);
        assert_eq!(dp.sum, Some(4.25));
        assert_eq!(dp.min, Some(0.05));
        assert_eq!(dp.max, Some(3.0));
    }

    #[test]
    fn gauge_without_start_time() {
        let request = resource_metrics_to_export_request(&snapshot(AggregatedMetrics::F64(
            MetricData::Gauge(SdkGauge {
                data_points: vec![beacon_sdk::metrics::data::GaugeDataPoint {
                    attributes: vec![],
                    value: 12.5,
                }],
                start_time: None,
                time: SystemTime::now(),
            }),
        )));

        let Some(TonicMetricData::Gauge(gauge)) = &only_metric(&request).data else {
            panic!("expected a gauge");
        };
        assert_eq!(gauge.data_points[0].start_time_unix_nano, 0);
        assert_eq!(
            gauge.data_points[0].value,
            Some(TonicDataPointValue::AsDouble(12.5))
        );
    }
}
