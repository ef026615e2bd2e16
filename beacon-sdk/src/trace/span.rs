//! # Span
//!
//! `Span`s represent a single operation within a trace. `Span`s can be nested to form a trace
//! tree. Each trace contains a root span, which typically describes the end-to-end latency and,
//! optionally, one or more sub-spans for its sub-operations.
//!
//! A span's start time is taken from the wall clock when it is created. Its end time is the
//! start time plus the elapsed monotonic time, so it is never earlier than the start time even
//! if the wall clock steps backwards. Attributes and status can only change before the span ends.
use crate::common::KeyValue;
use crate::trace::{SpanContext, SpanData, SpanId, Tracer};
use crate::{beacon_debug, beacon_warn};
use std::borrow::Cow;
use std::time::{Instant, SystemTime};

/// `SpanKind` describes the relationship between the span, its parents, and
/// its children in a trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Handles an inbound request from a remote client.
    Server,
    /// Issues an outbound request to a remote service.
    Client,
    /// Internal operation within the application.
    #[default]
    Internal,
}

/// The status of a [`Span`].
///
/// The values form a total order, `Ok > Error > Unset`, and a span's status
/// can only move up that order. Once `Ok` is set it is final.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// The default status.
    #[default]
    Unset,
    /// The operation contains an error.
    Error {
        /// The description of the error
        description: Cow<'static, str>,
    },
    /// The operation has been validated by an application developer or
    /// operator to have completed successfully.
    Ok,
}

impl Status {
    /// Create a new error status with a given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// Mutable state of a recording span.
#[derive(Clone, Debug)]
pub(crate) struct SpanRecord {
    pub(crate) parent_span_id: SpanId,
    pub(crate) parent_span_is_remote: bool,
    pub(crate) span_kind: SpanKind,
    pub(crate) name: Cow<'static, str>,
    pub(crate) start_time: SystemTime,
    pub(crate) started: Instant,
    pub(crate) attributes: Vec<KeyValue>,
    pub(crate) dropped_attributes_count: u32,
    pub(crate) status: Status,
}

/// Single operation within a trace.
///
/// A span is owned by the call path that started it. Ending it (explicitly
/// with [`end`](Span::end) or implicitly on drop) hands an immutable
/// [`SpanData`] to every span processor of the provider.
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    data: Option<SpanRecord>,
    ended: bool,
    tracer: Tracer,
}

impl Span {
    pub(crate) fn new(span_context: SpanContext, data: Option<SpanRecord>, tracer: Tracer) -> Self {
        Span {
            span_context,
            data,
            ended: false,
            tracer,
        }
    }

    /// Returns the `SpanContext` for this span.
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns `true` while the span records attributes and status.
    ///
    /// Always `false` after [`end`](Span::end), and for spans started after the
    /// provider was shut down.
    pub fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    fn with_data<T, F>(&mut self, operation: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanRecord, usize) -> T,
    {
        let limit = self.tracer.provider().span_limits().max_attributes_per_span as usize;
        match self.data.as_mut() {
            Some(data) => Some(f(data, limit)),
            None => {
                if self.ended {
                    beacon_debug!(
                        name: "Span.UpdateAfterEnd",
                        operation = operation,
                        span_id = self.span_context.span_id().to_string()
                    );
                }
                None
            }
        }
    }

    /// Sets a single attribute.
    ///
    /// Attributes beyond the span limit are counted as dropped. Calling this on
    /// an ended span does nothing.
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        self.with_data("set_attribute", |data, limit| {
            data_set_attribute(data, attribute, limit)
        });
    }

    /// Sets multiple attributes, in order.
    pub fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        self.with_data("set_attributes", |data, limit| {
            for attribute in attributes {
                data_set_attribute(data, attribute, limit);
            }
        });
    }

    /// Sets the status of this span, unless it already holds a status that
    /// ranks higher.
    pub fn set_status(&mut self, status: Status) {
        self.with_data("set_status", |data, _| {
            if status > data.status {
                data.status = status;
            }
        });
    }

    /// Updates the span's name.
    pub fn update_name(&mut self, new_name: impl Into<Cow<'static, str>>) {
        self.with_data("update_name", |data, _| data.name = new_name.into());
    }

    /// Finishes the span and hands it to the span processors.
    ///
    /// Ending a span twice is a usage error: the second call logs a warning
    /// and does nothing else.
    pub fn end(&mut self) {
        if self.ended {
            beacon_warn!(
                name: "Span.DoubleEnd",
                span_id = self.span_context.span_id().to_string()
            );
            return;
        }
        self.ensure_ended_and_exported();
    }

    /// Returns a snapshot of the span as it would be exported right now.
    pub fn exported_data(&self) -> Option<SpanData> {
        self.data
            .as_ref()
            .map(|data| build_export_data(data.clone(), data.start_time, self))
    }

    fn ensure_ended_and_exported(&mut self) {
        self.ended = true;
        let Some(data) = self.data.take() else {
            return;
        };

        let provider = self.tracer.provider();
        if provider.is_shutdown() {
            return;
        }

        let end_time = data.start_time + data.started.elapsed();
        let span_data = build_export_data(data, end_time, self);

        match provider.span_processors() {
            [] => {}
            [processor] => processor.on_end(span_data),
            processors => {
                for processor in processors {
                    processor.on_end(span_data.clone());
                }
            }
        }
    }
}

impl Drop for Span {
    /// Report span on inner drop
    fn drop(&mut self) {
        if !self.ended {
            self.ensure_ended_and_exported();
        }
    }
}

fn build_export_data(data: SpanRecord, end_time: SystemTime, span: &Span) -> SpanData {
    SpanData {
        span_context: span.span_context.clone(),
        parent_span_id: data.parent_span_id,
        parent_span_is_remote: data.parent_span_is_remote,
        span_kind: data.span_kind,
        name: data.name,
        start_time: data.start_time,
        end_time,
        attributes: data.attributes,
        dropped_attributes_count: data.dropped_attributes_count,
        status: data.status,
        instrumentation_scope: span.tracer.instrumentation_scope().clone(),
    }
}

fn data_set_attribute(data: &mut SpanRecord, attribute: KeyValue, span_attribute_limit: usize) {
    if data.attributes.len() < span_attribute_limit {
        data.attributes.push(attribute);
    } else {
        data.dropped_attributes_count += 1;
    }
}
