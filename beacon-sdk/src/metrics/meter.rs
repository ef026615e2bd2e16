use crate::common::InstrumentationScope;
use crate::error::SdkResult;
use crate::metrics::instrument::{
    Counter, Gauge, HistogramBuilder, InstrumentBuilder, InstrumentDescriptor,
    ObservableGaugeBuilder, UpDownCounter,
};
use crate::metrics::internal::ComputeAggregation;
use crate::metrics::Pipeline;
use std::borrow::Cow;
use std::sync::Arc;

/// Creates instruments for one instrumentation scope.
///
/// Obtained from [`MeterProvider::meter`]. Instruments of every meter of a
/// provider share one registry, so an instrument name and unit can only be
/// registered once per provider.
///
/// ```
/// use beacon_sdk::metrics::MeterProvider;
/// use beacon_sdk::KeyValue;
///
/// let provider = MeterProvider::builder().build();
/// let meter = provider.meter("cart");
///
/// let latency = meter
///     .f64_histogram("api.request.latency_seconds")
///     .with_unit("{s}")
///     .with_description("Records the latency of requests in seconds")
///     .build()
///     .unwrap();
/// latency.record(0.25, &[KeyValue::new("route", "/")]).unwrap();
///
/// // a second registration of the same name and unit fails
/// assert!(meter
///     .f64_histogram("api.request.latency_seconds")
///     .with_unit("{s}")
///     .build()
///     .is_err());
/// ```
///
/// [`MeterProvider::meter`]: crate::metrics::MeterProvider::meter
#[derive(Clone, Debug)]
pub struct Meter {
    scope: InstrumentationScope,
    pipeline: Arc<Pipeline>,
}

impl Meter {
    pub(crate) fn new(scope: InstrumentationScope, pipeline: Arc<Pipeline>) -> Self {
        Meter { scope, pipeline }
    }

    /// The scope this meter was created for.
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Creates an instrument builder for recording increasing `i64` values.
    pub fn i64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an instrument builder for recording increasing `f64` values.
    pub fn f64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an instrument builder for recording changes of an `i64` value.
    pub fn i64_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an instrument builder for recording a distribution of values.
    pub fn f64_histogram(&self, name: impl Into<Cow<'static, str>>) -> HistogramBuilder<'_> {
        HistogramBuilder::new(self, name.into())
    }

    /// Creates an instrument builder for recording independent `i64` values.
    pub fn i64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an instrument builder for recording independent `f64` values.
    pub fn f64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates an instrument builder for an `f64` gauge sampled on collection.
    pub fn f64_observable_gauge(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableGaugeBuilder<'_> {
        ObservableGaugeBuilder::new(self, name.into())
    }

    pub(crate) fn register(
        &self,
        descriptor: InstrumentDescriptor,
        aggregate: Arc<dyn ComputeAggregation>,
    ) -> SdkResult<()> {
        self.pipeline.register(&self.scope, descriptor, aggregate)
    }
}
