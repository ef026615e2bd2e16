//! Trace exporters
use crate::common::{InstrumentationScope, KeyValue};
use crate::error::SdkResult;
use crate::resource::Resource;
use crate::trace::{SpanContext, SpanId, SpanKind, Status};
use std::borrow::Cow;
use std::fmt::Debug;
use std::future::Future;
use std::time::SystemTime;

/// `SpanExporter` defines the interface that protocol-specific exporters must
/// implement so that they can be plugged into the SDK.
///
/// The exporter is expected to be a simple encoder and transmitter. Batching
/// and retries are handled by the span processor driving it.
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of finished spans.
    ///
    /// This function will never be called concurrently for the same exporter
    /// instance. It must not block indefinitely: implementations are expected
    /// to time out and return [`SdkError::ExportFailure`].
    ///
    /// [`SdkError::ExportFailure`]: crate::SdkError::ExportFailure
    fn export(&self, batch: &[SpanData]) -> impl Future<Output = SdkResult<()>> + Send;

    /// Shuts down the exporter. Called once, after the final export.
    fn shutdown(&mut self) -> SdkResult<()> {
        Ok(())
    }

    /// Hint to complete any export the exporter is still holding on to.
    fn force_flush(&mut self) -> SdkResult<()> {
        Ok(())
    }

    /// Set the resource describing every span this exporter receives.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// `SpanData` contains all the information collected by a `Span` and is the
/// input handed to exporters.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// Exportable `SpanContext`
    pub span_context: SpanContext,
    /// Span parent id, [`SpanId::INVALID`] for root spans
    pub parent_span_id: SpanId,
    /// Whether the parent span was propagated from another process
    pub parent_span_is_remote: bool,
    /// Span kind
    pub span_kind: SpanKind,
    /// Span name
    pub name: Cow<'static, str>,
    /// Span start time
    pub start_time: SystemTime,
    /// Span end time, never earlier than `start_time`
    pub end_time: SystemTime,
    /// Span attributes
    pub attributes: Vec<KeyValue>,
    /// The number of attributes that were above the configured limit, and thus
    /// dropped.
    pub dropped_attributes_count: u32,
    /// Span status
    pub status: Status,
    /// Instrumentation scope that produced this span
    pub instrumentation_scope: InstrumentationScope,
}
