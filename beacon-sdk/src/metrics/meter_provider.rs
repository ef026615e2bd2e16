use crate::common::InstrumentationScope;
use crate::error::{combine_errors, SdkError, SdkResult};
use crate::metrics::exporter::PushMetricExporter;
use crate::metrics::reader::MetricReader;
use crate::metrics::{Meter, PeriodicReader, Pipeline};
use crate::resource::Resource;
use crate::{beacon_debug, beacon_info};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles the creation and coordination of [Meter]s.
///
/// All `Meter`s created by a `MeterProvider` will be associated with the same
/// [Resource] and have their produced metric telemetry passed to the
/// configured [MetricReader]s. This is a clonable handle to the provider
/// itself, and cloning it will create a new reference, not a new instance.
/// Dropping the last reference to it will trigger shutdown of the provider.
/// Shutdown can also be triggered manually by calling the `shutdown` method.
#[derive(Clone, Debug)]
pub struct MeterProvider {
    inner: Arc<MeterProviderInner>,
}

struct MeterProviderInner {
    pipeline: Arc<Pipeline>,
    readers: Vec<Box<dyn MetricReader>>,
    shutdown_invoked: AtomicBool,
}

impl fmt::Debug for MeterProviderInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterProvider")
            .field("pipeline", &self.pipeline)
            .field("readers", &self.readers)
            .field("shutdown_invoked", &self.shutdown_invoked)
            .finish()
    }
}

impl MeterProviderInner {
    fn shutdown(&self, timeout: Duration) -> SdkResult<()> {
        let errors = self
            .readers
            .iter()
            .filter_map(|reader| reader.shutdown_with_timeout(timeout).err())
            .inspect(|err| {
                beacon_debug!(name: "MeterProvider.ShutdownError", error = format!("{err}"))
            })
            .collect();
        combine_errors(errors)
    }
}

impl Drop for MeterProviderInner {
    fn drop(&mut self) {
        // If user has already shutdown the provider manually by calling
        // shutdown(), then we don't need to call shutdown again.
        if !self.shutdown_invoked.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        } else {
            beacon_debug!(name: "MeterProvider.Drop.AlreadyShutdown");
        }
    }
}

impl Default for MeterProvider {
    fn default() -> Self {
        MeterProvider::builder().build()
    }
}

impl MeterProvider {
    /// Return default [MeterProviderBuilder]
    pub fn builder() -> MeterProviderBuilder {
        MeterProviderBuilder::default()
    }

    /// The resource attached to every snapshot of this provider.
    pub fn resource(&self) -> &Resource {
        self.inner.pipeline.resource()
    }

    /// Returns a meter for the named instrumentation scope.
    pub fn meter(&self, name: impl Into<Cow<'static, str>>) -> Meter {
        self.meter_with_scope(InstrumentationScope::new(name))
    }

    /// Returns a meter for the given instrumentation scope.
    pub fn meter_with_scope(&self, scope: InstrumentationScope) -> Meter {
        if scope.name().is_empty() {
            beacon_info!(name: "MeterNameEmpty");
        }
        Meter::new(scope, self.inner.pipeline.clone())
    }

    /// Returns `true` once the provider has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown_invoked.load(Ordering::Relaxed)
    }

    /// Flushes all pending telemetry.
    ///
    /// There is no guaranteed that all telemetry be flushed or all resources have
    /// been released on error.
    pub fn force_flush(&self) -> SdkResult<()> {
        if self.is_shutdown() {
            return Err(SdkError::AlreadyShutdown);
        }
        let errors = self
            .inner
            .readers
            .iter()
            .filter_map(|reader| reader.force_flush().err())
            .collect();
        combine_errors(errors)
    }

    /// Shuts down with the default timeout of 5 seconds.
    pub fn shutdown(&self) -> SdkResult<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Shuts down every reader, each exporting one last snapshot within
    /// `timeout`.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    pub fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()> {
        beacon_debug!(name: "MeterProvider.Shutdown");
        if self
            .inner
            .shutdown_invoked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            beacon_debug!(name: "MeterProvider.AlreadyShutdown");
            return Ok(());
        }
        self.inner.shutdown(timeout)
    }
}

/// Configuration options for a [MeterProvider].
#[derive(Default)]
pub struct MeterProviderBuilder {
    resource: Option<Resource>,
    readers: Vec<Box<dyn MetricReader>>,
}

impl fmt::Debug for MeterProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterProviderBuilder")
            .field("resource", &self.resource)
            .field("readers", &self.readers)
            .finish()
    }
}

impl MeterProviderBuilder {
    /// Associates a [Resource] with a [MeterProvider].
    ///
    /// By default, if this option is not used, the default [Resource] will be used.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Associates a [MetricReader] with a [MeterProvider].
    ///
    /// By default, if this option is not used, the [MeterProvider] will perform no
    /// operations; no data will be exported without a reader.
    pub fn with_reader<T: MetricReader>(mut self, reader: T) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    /// Adds a [PeriodicReader] with the default configuration driving
    /// `exporter`.
    pub fn with_periodic_exporter<T: PushMetricExporter>(self, exporter: T) -> Self {
        self.with_reader(PeriodicReader::builder(exporter).build())
    }

    /// Construct a new [MeterProvider] with this configuration.
    pub fn build(self) -> MeterProvider {
        let pipeline = Arc::new(Pipeline::new(self.resource.unwrap_or_default()));
        for reader in &self.readers {
            reader.register_pipeline(Arc::downgrade(&pipeline));
        }
        beacon_debug!(
            name: "MeterProvider.Built",
            reader_count = self.readers.len()
        );

        MeterProvider {
            inner: Arc::new(MeterProviderInner {
                pipeline,
                readers: self.readers,
                shutdown_invoked: AtomicBool::new(false),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::ResourceMetrics;
    use crate::metrics::ManualReader;
    use crate::resource::SERVICE_NAME;
    use crate::{Key, Value};

    #[test]
    fn shutdown_twice_is_a_no_op() {
        let reader = Arc::new(ManualReader::new());
        let provider = MeterProvider::builder().with_reader(reader.clone()).build();

        assert!(provider.shutdown().is_ok());
        assert!(provider.is_shutdown());
        assert!(provider.shutdown().is_ok());
        assert_eq!(provider.force_flush(), Err(SdkError::AlreadyShutdown));

        let mut rm = ResourceMetrics::default();
        assert_eq!(reader.collect(&mut rm), Err(SdkError::AlreadyShutdown));
    }

    #[test]
    fn dropping_last_clone_shuts_readers_down() {
        let reader = Arc::new(ManualReader::new());
        let provider = MeterProvider::builder().with_reader(reader.clone()).build();
        let clone = provider.clone();

        drop(provider);
        let mut rm = ResourceMetrics::default();
        assert!(reader.collect(&mut rm).is_ok());

        drop(clone);
        assert_eq!(reader.collect(&mut rm), Err(SdkError::AlreadyShutdown));
    }

    #[test]
    fn snapshots_carry_the_provider_resource() {
        let resource = Resource::builder_empty()
            .with_service_name("cart-service")
            .build()
            .unwrap();
        let reader = Arc::new(ManualReader::new());
        let provider = MeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader.clone())
            .build();
        provider
            .meter("test")
            .i64_counter("requests")
            .build()
            .unwrap()
            .add(2, &[])
            .unwrap();

        let mut rm = ResourceMetrics::default();
        reader.collect(&mut rm).unwrap();
        assert_eq!(
            rm.resource.get(&Key::from_static_str(SERVICE_NAME)),
            Some(Value::from("cart-service"))
        );
        assert_eq!(rm.scope_metrics[0].scope.name(), "test");
    }

    #[test]
    fn duplicate_registration_spans_meters() {
        let provider = MeterProvider::builder().build();
        assert!(provider.meter("a").i64_counter("requests").build().is_ok());
        assert_eq!(
            provider.meter("b").f64_counter("requests").build().err(),
            Some(SdkError::DuplicateInstrument {
                name: "requests".into(),
                unit: "".into()
            })
        );
    }
}
