use crate::transform::common::{attributes_to_tonic, resource_to_tonic, scope_to_tonic, to_nanos};
use beacon_sdk::trace::{SpanData, SpanId, SpanKind, Status};
use beacon_sdk::{InstrumentationScope, Resource};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::{
    span, status, ResourceSpans, ScopeSpans, Span as TonicSpan, Status as TonicStatus,
};

/// Maps the span kind.
pub fn span_kind_to_tonic(kind: SpanKind) -> span::SpanKind {
    match kind {
        SpanKind::Client => span::SpanKind::Client,
        SpanKind::Internal => span::SpanKind::Internal,
        SpanKind::Server => span::SpanKind::Server,
    }
}

/// Maps the span status.
pub fn status_to_tonic(status: &Status) -> TonicStatus {
    match status {
        Status::Unset => TonicStatus {
            code: status::StatusCode::Unset.into(),
            message: String::new(),
        },
        Status::Ok => TonicStatus {
            code: status::StatusCode::Ok.into(),
            message: String::new(),
        },
        Status::Error { description } => TonicStatus {
            code: status::StatusCode::Error.into(),
            message: description.to_string(),
        },
    }
}

/// Converts one finished span.
pub fn span_data_to_tonic_span(span: &SpanData) -> TonicSpan {
    TonicSpan {
        trace_id: span.span_context.trace_id().to_bytes().to_vec(),
        span_id: span.span_context.span_id().to_bytes().to_vec(),
        parent_span_id: if span.parent_span_id != SpanId::INVALID {
            span.parent_span_id.to_bytes().to_vec()
        } else {
            vec![]
        },
        flags: u32::from(span.span_context.trace_flags().to_u8()),
        name: span.name.to_string(),
        kind: span_kind_to_tonic(span.span_kind) as i32,
        start_time_unix_nano: to_nanos(span.start_time),
        end_time_unix_nano: to_nanos(span.end_time),
        attributes: attributes_to_tonic(&span.attributes),
        dropped_attributes_count: span.dropped_attributes_count,
        status: Some(status_to_tonic(&span.status)),
        ..Default::default()
    }
}

/// Builds one export request for a batch, grouping the spans by
/// instrumentation scope in order of first appearance.
pub fn group_spans_by_scope(resource: &Resource, batch: &[SpanData]) -> ExportTraceServiceRequest {
    let mut scopes: Vec<(&InstrumentationScope, Vec<TonicSpan>)> = Vec::new();
    for span in batch {
        let converted = span_data_to_tonic_span(span);
        match scopes
            .iter_mut()
            .find(|(scope, _)| *scope == &span.instrumentation_scope)
        {
            Some((_, spans)) => spans.push(converted),
            None => scopes.push((&span.instrumentation_scope, vec![converted])),
        }
    }

    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(resource_to_tonic(resource)),
            scope_spans: scopes
                .into_iter()
                .map(|(scope, spans)| ScopeSpans {
                    scope: Some(scope_to_tonic(scope)),
                    spans,
                    schema_url: String::new(),
                })
                .collect(),
            schema_url: String::new(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_sdk::trace::{SpanContext, TraceFlags, TraceId};
    use beacon_sdk::KeyValue;
    use std::time::{Duration, SystemTime};

    fn span_data(name: &'static str, scope: &'static str, parent: SpanId) -> SpanData {
        let start_time = SystemTime::now();
        SpanData {
            span_context: SpanContext::new(
                TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736),
                SpanId::from(0x00f0_67aa_0ba9_02b7),
                TraceFlags::SAMPLED,
                false,
            ),
            parent_span_id: parent,
            parent_span_is_remote: false,
            span_kind: SpanKind::Server,
            name: name.into(),
            start_time,
            end_time: start_time + Duration::from_millis(10),
            attributes: vec![KeyValue::new("http.status", 200_i64)],
            dropped_attributes_count: 0,
            status: Status::error("boom"),
            instrumentation_scope: InstrumentationScope::new(scope),
        }
    }

    #[test]
    fn converts_span_fields() {
        let span = span_data_to_tonic_span(&span_data("router", "cart", SpanId::INVALID));

        assert_eq!(span.name, "router");
        assert_eq!(
            span.trace_id,
            vec![0x4b, 0xf9, 0x2f, 0x35, 0x77, 0xb3, 0x4d, 0xa6, 0xa3, 0xce, 0x92, 0x9d, 0x0e, 0x0e, 0x47, 0x36]
        );
        assert_eq!(span.span_id, vec![0x00, 0xf0, 0x67, 0xaa, 0x0b, 0xa9, 0x02, 0xb7]);
        assert!(span.parent_span_id.is_empty());
        assert_eq!(span.kind, span::SpanKind::Server as i32);
        assert_eq!(span.end_time_unix_nano - span.start_time_unix_nano, 10_000_000);
        assert_eq!(span.attributes[0].key, "http.status");
        let status = span.status.unwrap();
        assert_eq!(status.code, status::StatusCode::Error as i32);
        assert_eq!(status.message, "boom");
    }

    #[test]
    fn groups_batch_by_scope() {
        let batch = vec![
            span_data("a", "cart", SpanId::INVALID),
            span_data("b", "router", SpanId::from(7)),
            span_data("c", "cart", SpanId::from(7)),
        ];
        let request = group_spans_by_scope(&Resource::empty(), &batch);

        assert_eq!(request.resource_spans.len(), 1);
        let scope_spans = &request.resource_spans[0].scope_spans;
        assert_eq!(scope_spans.len(), 2);
        assert_eq!(scope_spans[0].scope.as_ref().unwrap().name, "cart");
        let names: Vec<_> = scope_spans[0].spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(scope_spans[1].spans[0].parent_span_id, 7_u64.to_be_bytes().to_vec());
    }
}
