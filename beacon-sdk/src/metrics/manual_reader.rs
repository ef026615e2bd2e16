use crate::error::{SdkError, SdkResult};
use crate::metrics::data::ResourceMetrics;
use crate::metrics::reader::MetricReader;
use crate::metrics::Pipeline;
use crate::beacon_debug;
use std::fmt;
use std::sync::{Mutex, Weak};
use std::time::Duration;

/// A simple [MetricReader] that allows an application to read metrics on demand.
///
/// # Example
///
/// ```
/// use beacon_sdk::metrics::{data::ResourceMetrics, ManualReader, MeterProvider, MetricReader};
/// use std::sync::Arc;
///
/// let reader = Arc::new(ManualReader::default());
/// let provider = MeterProvider::builder().with_reader(reader.clone()).build();
/// let counter = provider.meter("example").i64_counter("requests").build().unwrap();
/// counter.add(1, &[]).unwrap();
///
/// let mut rm = ResourceMetrics::default();
/// reader.collect(&mut rm).unwrap();
/// assert!(rm.metric("requests").is_some());
/// ```
#[derive(Default)]
pub struct ManualReader {
    inner: Mutex<ManualReaderInner>,
}

#[derive(Debug, Default)]
struct ManualReaderInner {
    pipeline: Option<Weak<Pipeline>>,
    is_shutdown: bool,
}

impl fmt::Debug for ManualReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ManualReader")
    }
}

impl ManualReader {
    /// Create a reader that is not yet registered with a provider.
    pub fn new() -> Self {
        ManualReader::default()
    }
}

impl MetricReader for ManualReader {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        let _ = self.inner.lock().map(|mut inner| {
            // Only register once.
            if inner.pipeline.is_none() {
                inner.pipeline = Some(pipeline);
            } else {
                beacon_debug!(
                    name: "ManualReader.DuplicateRegistration",
                    message = "The reader is already registered with a provider; ignoring."
                );
            }
        });
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> SdkResult<()> {
        let inner = self.inner.lock()?;
        if inner.is_shutdown {
            return Err(SdkError::AlreadyShutdown);
        }
        match inner.pipeline.as_ref().and_then(|w| w.upgrade()) {
            Some(pipeline) => pipeline.produce(rm),
            None => Err(SdkError::InternalFailure(
                "reader is not registered or its provider was dropped".into(),
            )),
        }
    }

    /// ForceFlush is a no-op, it always returns `Ok`.
    fn force_flush(&self) -> SdkResult<()> {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult<()> {
        let mut inner = self.inner.lock()?;

        // Any future call to collect will now return an error.
        inner.pipeline = None;
        inner.is_shutdown = true;
        Ok(())
    }
}
