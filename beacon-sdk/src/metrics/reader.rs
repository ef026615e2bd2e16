//! Interfaces for reading and producing metrics
use crate::error::SdkResult;
use crate::metrics::data::ResourceMetrics;
use crate::metrics::Pipeline;
use std::fmt;
use std::sync::Weak;
use std::time::Duration;

/// The interface used between the SDK and an exporter.
///
/// Control flow is bi-directional through the `MetricReader`, since the SDK
/// initiates `force_flush` and `shutdown` while the reader initiates
/// collection. The `register_pipeline` method here informs the metric reader
/// that it can begin reading, signaling the start of bi-directional control
/// flow.
///
/// Push-based exporters implement [`PushMetricExporter`] and are driven by a
/// [`PeriodicReader`].
///
/// [`PushMetricExporter`]: crate::metrics::PushMetricExporter
/// [`PeriodicReader`]: crate::metrics::PeriodicReader
pub trait MetricReader: fmt::Debug + Send + Sync + 'static {
    /// Registers a [MetricReader] with a [Pipeline].
    ///
    /// The pipeline argument allows the `MetricReader` to signal the sdk to collect
    /// and send aggregated metric measurements.
    fn register_pipeline(&self, pipeline: Weak<Pipeline>);

    /// Gathers and returns all metric data related to the [MetricReader] from the
    /// SDK and stores it in the provided [ResourceMetrics] reference.
    ///
    /// An error is returned if this is called after shutdown.
    fn collect(&self, rm: &mut ResourceMetrics) -> SdkResult<()>;

    /// Flushes all metric measurements held in an export pipeline.
    fn force_flush(&self) -> SdkResult<()>;

    /// Flushes all metric measurements held in an export pipeline and releases
    /// any held computational resources, within `timeout`.
    ///
    /// After shutdown, calls to `collect` return an error. Calling it more
    /// than once is not an error.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()>;

    /// Shutdown with the default timeout of 5 seconds.
    fn shutdown(&self) -> SdkResult<()> {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }
}

impl<T: MetricReader + ?Sized> MetricReader for std::sync::Arc<T> {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        (**self).register_pipeline(pipeline)
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> SdkResult<()> {
        (**self).collect(rm)
    }

    fn force_flush(&self) -> SdkResult<()> {
        (**self).force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()> {
        (**self).shutdown_with_timeout(timeout)
    }
}
