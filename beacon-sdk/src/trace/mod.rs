//! # Trace SDK
//!
//! The tracing SDK consists of a few main structs:
//!
//! * The [`Tracer`] struct which starts spans.
//! * The [`Span`] struct which is a mutable object storing information about the
//!   current operation execution.
//! * The [`TracerProvider`] struct which configures and produces [`Tracer`]s.
//!
//! Finished spans flow through [`SpanProcessor`]s to a [`SpanExporter`].
mod export;
mod id;
mod in_memory_exporter;
mod provider;
mod span;
mod span_processor;
mod tracer;

pub use export::{SpanData, SpanExporter};
pub use id::{IdGenerator, RandomIdGenerator, SpanContext, SpanId, TraceFlags, TraceId};
pub use in_memory_exporter::InMemorySpanExporter;
pub use provider::{TracerProvider, TracerProviderBuilder};
pub use span::{Span, SpanKind, Status};
pub use span_processor::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, BatchSpanProcessorBuilder,
    SimpleSpanProcessor, SpanProcessor,
};
pub use tracer::{SpanBuilder, Tracer};

/// Default maximum number of attributes a span records.
pub(crate) const DEFAULT_MAX_ATTRIBUTES_PER_SPAN: u32 = 128;

/// Limits applied to every span of a [`TracerProvider`].
///
/// Attributes added past the limit are counted in
/// [`SpanData::dropped_attributes_count`] instead of being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpanLimits {
    /// The max attributes that can be added to a `Span`.
    pub max_attributes_per_span: u32,
}

impl Default for SpanLimits {
    fn default() -> Self {
        SpanLimits {
            max_attributes_per_span: DEFAULT_MAX_ATTRIBUTES_PER_SPAN,
        }
    }
}
