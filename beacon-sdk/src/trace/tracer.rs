//! # Tracer
//!
//! A [`Tracer`] starts spans for one instrumentation scope. Parent/child
//! linkage comes from the [`Context`] passed to each call: the span active in
//! that context, local or remote, becomes the parent of the new span, and the
//! returned context carries the new span for its own children.
use crate::common::{InstrumentationScope, KeyValue};
use crate::context::Context;
use crate::trace::span::SpanRecord;
use crate::trace::{Span, SpanContext, SpanId, SpanKind, Status, TraceFlags, TracerProvider};
use std::borrow::Cow;
use std::fmt;
use std::time::{Instant, SystemTime};

/// Creates spans for one instrumentation scope.
#[derive(Clone)]
pub struct Tracer {
    scope: InstrumentationScope,
    provider: TracerProvider,
}

impl fmt::Debug for Tracer {
    /// Omitting `provider` here is necessary to avoid cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("name", &self.scope.name())
            .field("version", &self.scope.version())
            .finish()
    }
}

impl Tracer {
    pub(crate) fn new(scope: InstrumentationScope, provider: TracerProvider) -> Self {
        Tracer { scope, provider }
    }

    pub(crate) fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    pub(crate) fn instrumentation_scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Starts an internal span named `name` as a child of the span active in
    /// `parent_cx`.
    ///
    /// Returns a context carrying the new span, to be passed to nested
    /// operations, together with the span itself.
    pub fn start(&self, name: impl Into<Cow<'static, str>>, parent_cx: &Context) -> (Context, Span) {
        self.span_builder(name).start(parent_cx)
    }

    /// Creates a [`SpanBuilder`] to configure the span before starting it.
    pub fn span_builder(&self, name: impl Into<Cow<'static, str>>) -> SpanBuilder {
        SpanBuilder {
            tracer: self.clone(),
            name: name.into(),
            span_kind: SpanKind::Internal,
            attributes: Vec::new(),
        }
    }

    fn build(&self, builder: SpanBuilder, parent_cx: &Context) -> (Context, Span) {
        // no point starting a span if the provider has already been shut down
        if self.provider.is_shutdown() {
            return (parent_cx.clone(), Span::new(SpanContext::NONE, None, self.clone()));
        }

        let config = self.provider.config();
        let span_id = config.id_generator.new_span_id();
        let parent = parent_cx.span_context().filter(|sc| sc.is_valid());
        let (trace_id, parent_span_id, parent_span_is_remote) = match parent {
            Some(psc) => (psc.trace_id(), psc.span_id(), psc.is_remote()),
            None => (config.id_generator.new_trace_id(), SpanId::INVALID, false),
        };

        let span_context = SpanContext::new(trace_id, span_id, TraceFlags::SAMPLED, false);

        let SpanBuilder {
            name,
            span_kind,
            mut attributes,
            ..
        } = builder;
        let span_attributes_limit = config.span_limits.max_attributes_per_span as usize;
        let dropped_attributes_count = attributes.len().saturating_sub(span_attributes_limit);
        attributes.truncate(span_attributes_limit);

        let mut span = Span::new(
            span_context.clone(),
            Some(SpanRecord {
                parent_span_id,
                parent_span_is_remote,
                span_kind,
                name,
                start_time: SystemTime::now(),
                started: Instant::now(),
                attributes,
                dropped_attributes_count: dropped_attributes_count as u32,
                status: Status::Unset,
            }),
            self.clone(),
        );

        for processor in self.provider.span_processors() {
            processor.on_start(&mut span, parent_cx);
        }

        (parent_cx.with_span_context(span_context), span)
    }
}

/// Configures a span before it is started.
///
/// ```
/// use beacon_sdk::trace::{SpanKind, TracerProvider};
/// use beacon_sdk::{Context, KeyValue};
///
/// let provider = TracerProvider::builder().build();
/// let tracer = provider.tracer("http");
///
/// let (_cx, mut span) = tracer
///     .span_builder("router")
///     .with_kind(SpanKind::Server)
///     .with_attributes([KeyValue::new("http.route", "/cart/add")])
///     .start(&Context::new());
/// span.end();
/// ```
#[derive(Debug)]
pub struct SpanBuilder {
    tracer: Tracer,
    name: Cow<'static, str>,
    span_kind: SpanKind,
    attributes: Vec<KeyValue>,
}

impl SpanBuilder {
    /// Assign the span kind. Defaults to [`SpanKind::Internal`].
    pub fn with_kind(self, span_kind: SpanKind) -> Self {
        SpanBuilder { span_kind, ..self }
    }

    /// Assign initial attributes.
    pub fn with_attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        self.attributes.extend(attributes);
        self
    }

    /// Starts the span as a child of the span active in `parent_cx`.
    pub fn start(self, parent_cx: &Context) -> (Context, Span) {
        let tracer = self.tracer.clone();
        tracer.build(self, parent_cx)
    }
}
