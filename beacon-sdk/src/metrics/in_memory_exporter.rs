use crate::error::SdkResult;
use crate::metrics::data::ResourceMetrics;
use crate::metrics::exporter::PushMetricExporter;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An in-memory metrics exporter that stores metrics data in memory.
///
/// This exporter is useful for testing and debugging purposes. Every export
/// appends one [`ResourceMetrics`] snapshot, retrieved with
/// [`get_finished_metrics`](InMemoryMetricExporter::get_finished_metrics).
/// Clones share the same storage, and the snapshots outlive shutdown so they
/// can be inspected afterwards.
///
/// # Example
///
/// ```
/// use beacon_sdk::metrics::{InMemoryMetricExporter, MeterProvider, PeriodicReader};
/// use beacon_sdk::KeyValue;
///
/// let exporter = InMemoryMetricExporter::default();
/// let provider = MeterProvider::builder()
///     .with_reader(PeriodicReader::builder(exporter.clone()).build())
///     .build();
///
/// let counter = provider.meter("example").i64_counter("my_counter").build().unwrap();
/// counter.add(1, &[KeyValue::new("key", "value")]).unwrap();
///
/// provider.force_flush().unwrap();
/// let finished_metrics = exporter.get_finished_metrics().unwrap();
/// assert!(finished_metrics[0].metric("my_counter").is_some());
/// # provider.shutdown().unwrap();
/// ```
#[derive(Clone, Default)]
pub struct InMemoryMetricExporter {
    metrics: Arc<Mutex<Vec<ResourceMetrics>>>,
}

impl fmt::Debug for InMemoryMetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetricExporter").finish()
    }
}

impl InMemoryMetricExporter {
    /// Returns the exported snapshots, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock cannot be acquired.
    pub fn get_finished_metrics(&self) -> SdkResult<Vec<ResourceMetrics>> {
        Ok(self.metrics.lock()?.clone())
    }

    /// Clears the internal storage of snapshots.
    pub fn reset(&self) {
        let _ = self.metrics.lock().map(|mut metrics| metrics.clear());
    }
}

impl PushMetricExporter for InMemoryMetricExporter {
    fn export(&self, metrics: &ResourceMetrics) -> impl Future<Output = SdkResult<()>> + Send {
        let result = self
            .metrics
            .lock()
            .map(|mut guard| guard.push(metrics.clone()))
            .map_err(Into::into);
        std::future::ready(result)
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult<()> {
        Ok(())
    }
}
