use crate::error::SdkResult;
use crate::resource::Resource;
use crate::trace::{SpanData, SpanExporter};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// An in-memory span exporter that stores span data in memory.
///
/// This exporter is useful for testing and debugging purposes. It stores
/// exported spans in a vector, which can be retrieved with
/// [`get_finished_spans`](InMemorySpanExporter::get_finished_spans). Clones
/// share the same storage.
///
/// # Example
/// ```
/// use beacon_sdk::trace::{InMemorySpanExporter, TracerProvider};
/// use beacon_sdk::Context;
///
/// let exporter = InMemorySpanExporter::default();
/// let provider = TracerProvider::builder()
///     .with_simple_exporter(exporter.clone())
///     .build();
///
/// let tracer = provider.tracer("example");
/// let (_, mut span) = tracer.start("say hello", &Context::new());
/// span.end();
///
/// let spans = exporter.get_finished_spans().unwrap();
/// assert_eq!(spans[0].name, "say hello");
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    resource: Arc<Mutex<Resource>>,
}

impl InMemorySpanExporter {
    /// Returns the finished spans as a vector of `SpanData`.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock cannot be acquired.
    pub fn get_finished_spans(&self) -> SdkResult<Vec<SpanData>> {
        Ok(self.spans.lock()?.clone())
    }

    /// Clears the internal storage of finished spans.
    pub fn reset(&self) {
        let _ = self.spans.lock().map(|mut spans_guard| spans_guard.clear());
    }

    /// The resource handed over by the provider.
    pub fn resource(&self) -> Resource {
        self.resource
            .lock()
            .map(|resource| resource.clone())
            .unwrap_or_else(|_| Resource::empty())
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&self, batch: &[SpanData]) -> impl Future<Output = SdkResult<()>> + Send {
        let result = self
            .spans
            .lock()
            .map(|mut spans_guard| spans_guard.extend_from_slice(batch))
            .map_err(Into::into);
        std::future::ready(result)
    }

    fn shutdown(&mut self) -> SdkResult<()> {
        self.reset();
        Ok(())
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut guard) = self.resource.lock() {
            *guard = resource.clone();
        }
    }
}
