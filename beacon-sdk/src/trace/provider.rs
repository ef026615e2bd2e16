//! # Tracer Provider
//!
//! The [`TracerProvider`] creates [`Tracer`]s and owns the span processors they
//! share, together with the [`Resource`], id generator and span limits.
//!
//! Cloning a provider creates a new reference to the same provider. Dropping
//! the last reference shuts it down, flushing buffered spans. Shutdown can also
//! be triggered explicitly with [`shutdown`](TracerProvider::shutdown). After
//! shutdown, tracers created by the provider hand out non-recording spans.
use crate::common::InstrumentationScope;
use crate::error::{combine_errors, SdkError, SdkResult};
use crate::resource::Resource;
use crate::trace::{
    BatchSpanProcessor, IdGenerator, RandomIdGenerator, SimpleSpanProcessor, SpanExporter,
    SpanLimits, SpanProcessor, Tracer,
};
use crate::{beacon_debug, beacon_info};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) resource: Resource,
    pub(crate) id_generator: Box<dyn IdGenerator>,
    pub(crate) span_limits: SpanLimits,
}

#[derive(Debug)]
struct TracerProviderInner {
    processors: Vec<Box<dyn SpanProcessor>>,
    config: Config,
    is_shutdown: AtomicBool,
}

impl TracerProviderInner {
    fn shutdown(&self, timeout: Duration) -> Vec<SdkResult<()>> {
        let mut results = vec![];
        for processor in &self.processors {
            let result = processor.shutdown_with_timeout(timeout);
            if let Err(err) = &result {
                beacon_debug!(name: "TracerProvider.ShutdownError", error = format!("{err}"));
            }
            results.push(result);
        }
        results
    }
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        } else {
            beacon_debug!(name: "TracerProvider.Drop.AlreadyShutdown");
        }
    }
}

/// Creates [`Tracer`]s and routes their finished spans to span processors.
///
/// ```
/// use beacon_sdk::trace::TracerProvider;
/// use beacon_sdk::Context;
///
/// let provider = TracerProvider::builder().build();
/// let tracer = provider.tracer("cart");
/// let (_cx, mut span) = tracer.start("checkout", &Context::new());
/// span.end();
///
/// assert!(provider.shutdown().is_ok());
/// // A second shutdown is a no-op.
/// assert!(provider.shutdown().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct TracerProvider {
    inner: Arc<TracerProviderInner>,
}

impl Default for TracerProvider {
    fn default() -> Self {
        TracerProvider::builder().build()
    }
}

impl TracerProvider {
    /// Create a new [`TracerProviderBuilder`].
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    pub(crate) fn span_processors(&self) -> &[Box<dyn SpanProcessor>] {
        &self.inner.processors
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn span_limits(&self) -> SpanLimits {
        self.inner.config.span_limits
    }

    /// Returns `true` once the provider has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Relaxed)
    }

    /// The resource attached to every span of this provider.
    pub fn resource(&self) -> &Resource {
        &self.inner.config.resource
    }

    /// Returns a tracer for the named instrumentation scope.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> Tracer {
        self.tracer_with_scope(InstrumentationScope::new(name))
    }

    /// Returns a tracer for the given instrumentation scope.
    pub fn tracer_with_scope(&self, scope: InstrumentationScope) -> Tracer {
        if scope.name().is_empty() {
            beacon_info!(name: "TracerNameEmpty");
        }
        Tracer::new(scope, self.clone())
    }

    /// Exports all buffered spans and waits for the result.
    pub fn force_flush(&self) -> SdkResult<()> {
        if self.is_shutdown() {
            return Err(SdkError::AlreadyShutdown);
        }
        let errors: Vec<_> = self
            .span_processors()
            .iter()
            .filter_map(|processor| processor.force_flush().err())
            .collect();
        combine_errors(errors)
    }

    /// Shuts down with the default timeout of 5 seconds.
    pub fn shutdown(&self) -> SdkResult<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Flushes and stops every span processor, each bounded by `timeout`.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    pub fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()> {
        if self
            .inner
            .is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            beacon_debug!(name: "TracerProvider.AlreadyShutdown");
            return Ok(());
        }
        let errors = self
            .inner
            .shutdown(timeout)
            .into_iter()
            .filter_map(Result::err)
            .collect();
        combine_errors(errors)
    }
}

/// Builder for [`TracerProvider`].
#[derive(Debug, Default)]
pub struct TracerProviderBuilder {
    processors: Vec<Box<dyn SpanProcessor>>,
    resource: Option<Resource>,
    id_generator: Option<Box<dyn IdGenerator>>,
    span_limits: SpanLimits,
}

impl TracerProviderBuilder {
    /// Adds a [`SimpleSpanProcessor`] exporting each span as soon as it ends.
    ///
    /// Useful for debugging and tests. Use
    /// [`with_batch_exporter`](Self::with_batch_exporter) in production.
    pub fn with_simple_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(SimpleSpanProcessor::new(exporter))
    }

    /// Adds a [`BatchSpanProcessor`] with the default configuration.
    pub fn with_batch_exporter<T: SpanExporter + 'static>(self, exporter: T) -> Self {
        self.with_span_processor(BatchSpanProcessor::builder(exporter).build())
    }

    /// Adds a span processor. Processors are called in registration order.
    pub fn with_span_processor<T: SpanProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Sets the id generator for new traces and spans.
    pub fn with_id_generator<T: IdGenerator + 'static>(mut self, id_generator: T) -> Self {
        self.id_generator = Some(Box::new(id_generator));
        self
    }

    /// Sets the span limits.
    pub fn with_span_limits(mut self, span_limits: SpanLimits) -> Self {
        self.span_limits = span_limits;
        self
    }

    /// Sets the resource. Defaults to [`Resource::default`].
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Create a new provider from this configuration.
    pub fn build(self) -> TracerProvider {
        let resource = self.resource.unwrap_or_default();
        let mut processors = self.processors;
        for processor in &mut processors {
            processor.set_resource(&resource);
        }

        TracerProvider {
            inner: Arc::new(TracerProviderInner {
                processors,
                config: Config {
                    resource,
                    id_generator: self
                        .id_generator
                        .unwrap_or_else(|| Box::new(RandomIdGenerator::default())),
                    span_limits: self.span_limits,
                },
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}
