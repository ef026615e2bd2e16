//! Request-scoped execution context.
//!
//! A [`Context`] is an immutable value passed explicitly down a call path. It
//! carries the active span (local or extracted from a remote parent) and the
//! baggage for the request. Deriving a new context never changes the original,
//! so contexts can be freely cloned across threads and tasks.
use crate::baggage::Baggage;
use crate::trace::SpanContext;

/// An immutable carrier of the active span and baggage.
///
/// ```
/// use beacon_sdk::{trace::TracerProvider, Context};
///
/// let provider = TracerProvider::builder().build();
/// let tracer = provider.tracer("example");
///
/// let root = Context::new();
/// let (cx, _span) = tracer.start("operation", &root);
///
/// assert!(root.span_context().is_none());
/// assert!(cx.span_context().is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    span: Option<SpanContext>,
    baggage: Baggage,
}

impl Context {
    /// Creates an empty context with no active span and no baggage.
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns a copy of this context with `span_context` as the active span.
    pub fn with_span_context(&self, span_context: SpanContext) -> Self {
        Context {
            span: Some(span_context),
            baggage: self.baggage.clone(),
        }
    }

    /// Returns a copy of this context whose active span is a remote parent.
    ///
    /// Used by propagators when a span context is extracted from a carrier.
    pub fn with_remote_span_context(&self, span_context: SpanContext) -> Self {
        self.with_span_context(span_context.into_remote())
    }

    /// The active span, if any.
    pub fn span_context(&self) -> Option<&SpanContext> {
        self.span.as_ref()
    }

    /// Returns `true` if the active span was created in another process.
    pub fn has_remote_parent(&self) -> bool {
        self.span.as_ref().is_some_and(SpanContext::is_remote)
    }

    /// Returns a copy of this context carrying `baggage`.
    pub fn with_baggage(&self, baggage: Baggage) -> Self {
        Context {
            span: self.span.clone(),
            baggage,
        }
    }

    /// The baggage carried by this context.
    pub fn baggage(&self) -> &Baggage {
        &self.baggage
    }
}
