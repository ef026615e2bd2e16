//! Interfaces for exporting metrics
use crate::error::SdkResult;
use crate::metrics::data::ResourceMetrics;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

/// Exporter handles the delivery of metric data to external receivers.
///
/// This is the final component in the metric push pipeline. Retries are driven
/// by the [`PeriodicReader`]: an export that fails with
/// [`SdkError::ExportFailure`] is attempted again according to its
/// [`RetryPolicy`].
///
/// [`PeriodicReader`]: crate::metrics::PeriodicReader
/// [`SdkError::ExportFailure`]: crate::SdkError::ExportFailure
/// [`RetryPolicy`]: crate::export::RetryPolicy
pub trait PushMetricExporter: Send + Sync + Debug + 'static {
    /// Export serializes and transmits metric data to a receiver.
    ///
    /// Never called concurrently for the same exporter instance.
    fn export(&self, metrics: &ResourceMetrics) -> impl Future<Output = SdkResult<()>> + Send;

    /// Flushes any metric data held by an exporter.
    fn force_flush(&self) -> SdkResult<()> {
        Ok(())
    }

    /// Releases any held computational resources.
    ///
    /// After Shutdown is called, calls to Export will perform no operation and
    /// instead will return an error indicating the shutdown state.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()>;

    /// Shutdown with the default timeout of 5 seconds.
    fn shutdown(&self) -> SdkResult<()> {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }
}
