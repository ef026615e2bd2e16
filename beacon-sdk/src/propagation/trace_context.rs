//! # W3C Trace Context Propagator
use crate::context::Context;
use crate::propagation::{Extractor, FieldIter, Injector, TextMapPropagator};
use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId};
use crate::beacon_debug;
use std::sync::OnceLock;

const SUPPORTED_VERSION: u8 = 0;
const MAX_VERSION: u8 = 254;
const TRACEPARENT_HEADER: &str = "traceparent";

static TRACE_CONTEXT_HEADER_FIELDS: OnceLock<[String; 1]> = OnceLock::new();

fn trace_context_header_fields() -> &'static [String; 1] {
    TRACE_CONTEXT_HEADER_FIELDS.get_or_init(|| [TRACEPARENT_HEADER.to_owned()])
}

/// Propagates `SpanContext`s in [W3C TraceContext] format under the
/// `traceparent` header.
///
/// Here's an example of a `traceparent` header.
///
/// `traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`
///
/// It has four fields: version, trace-id, parent-id and trace-flags. Only
/// the `sampled` flag is kept. The `tracestate` header is neither read nor
/// written.
///
/// [W3C TraceContext]: https://www.w3.org/TR/trace-context/
#[derive(Clone, Debug, Default)]
pub struct TraceContextPropagator {
    _private: (),
}

impl TraceContextPropagator {
    /// Create a new `TraceContextPropagator`.
    pub fn new() -> Self {
        TraceContextPropagator { _private: () }
    }

    /// Extract span context from w3c trace-context header.
    fn extract_span_context(&self, extractor: &dyn Extractor) -> Result<SpanContext, ()> {
        let header_value = extractor.get(TRACEPARENT_HEADER).ok_or(())?;
        let parts = header_value.trim().split_terminator('-').collect::<Vec<&str>>();
        // Ensure parts are not out of range.
        if parts.len() < 4 {
            return Err(());
        }

        // Ensure version is within range, for version 0 there must be 4 parts.
        if !is_lower_hex(parts[0], 2) {
            return Err(());
        }
        let version = u8::from_str_radix(parts[0], 16).map_err(|_| ())?;
        if version > MAX_VERSION || version == 0 && parts.len() != 4 {
            return Err(());
        }

        if !is_lower_hex(parts[1], 32) || !is_lower_hex(parts[2], 16) || !is_lower_hex(parts[3], 2)
        {
            return Err(());
        }
        let trace_id = TraceId::from_hex(parts[1]).map_err(|_| ())?;
        let span_id = SpanId::from_hex(parts[2]).map_err(|_| ())?;
        let opts = u8::from_str_radix(parts[3], 16).map_err(|_| ())?;

        // Ensure opts are valid for version 0
        if version == 0 && opts > 2 {
            return Err(());
        }

        // Clear all flags other than the sampling bit.
        let trace_flags = TraceFlags::new(opts & TraceFlags::SAMPLED.to_u8());
        let span_context = SpanContext::new(trace_id, span_id, trace_flags, true);

        // Ensure span is valid
        if !span_context.is_valid() {
            return Err(());
        }

        Ok(span_context)
    }
}

fn is_lower_hex(part: &str, len: usize) -> bool {
    part.len() == len
        && part
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl TextMapPropagator for TraceContextPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let Some(span_context) = cx.span_context().filter(|sc| sc.is_valid()) else {
            return;
        };
        let header_value = format!(
            "{:02x}-{}-{}-{:02x}",
            SUPPORTED_VERSION,
            span_context.trace_id(),
            span_context.span_id(),
            span_context.trace_flags().to_u8() & TraceFlags::SAMPLED.to_u8()
        );
        injector.set(TRACEPARENT_HEADER, header_value);
    }

    /// If no `SpanContext` was retrieved OR if the retrieved SpanContext is
    /// invalid then `cx` is returned unchanged.
    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        match self.extract_span_context(extractor) {
            Ok(span_context) => cx.with_remote_span_context(span_context),
            Err(()) => {
                if extractor.get(TRACEPARENT_HEADER).is_some() {
                    beacon_debug!(name: "TraceContextPropagator.InvalidTraceparent");
                }
                cx.clone()
            }
        }
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(trace_context_header_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn carrier(traceparent: &str) -> HashMap<String, String> {
        let mut carrier = HashMap::new();
        carrier.set(TRACEPARENT_HEADER, traceparent.to_string());
        carrier
    }

    #[rstest]
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00", TraceFlags::NOT_SAMPLED)]
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", TraceFlags::SAMPLED)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09", TraceFlags::SAMPLED)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-08", TraceFlags::NOT_SAMPLED)]
    #[case("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09-XYZxsf09", TraceFlags::SAMPLED)]
    #[case("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-", TraceFlags::SAMPLED)]
    fn extract_valid(#[case] traceparent: &str, #[case] flags: TraceFlags) {
        let cx = TraceContextPropagator::new().extract(&carrier(traceparent));
        assert_eq!(
            cx.span_context(),
            Some(&SpanContext::new(
                TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736),
                SpanId::from(0x00f0_67aa_0ba9_02b7),
                flags,
                true
            ))
        );
        assert!(cx.has_remote_parent());
    }

    #[rstest]
    #[case::version_length("0000-00000000000000000000000000000000-0000000000000000-01")]
    #[case::trace_id_length("00-ab00000000000000000000000000000000-cd00000000000000-01")]
    #[case::short_trace_id("00-ab0000000000000000000000000000-cd00000000000000-01")]
    #[case::span_id_length("00-ab000000000000000000000000000000-cd0000000000000000-01")]
    #[case::flags_length("00-ab000000000000000000000000000000-cd00000000000000-0100")]
    #[case::bogus_version("qw-00000000000000000000000000000000-0000000000000000-01")]
    #[case::bogus_trace_id("00-qw000000000000000000000000000000-cd00000000000000-01")]
    #[case::bogus_span_id("00-ab000000000000000000000000000000-qw00000000000000-01")]
    #[case::bogus_flags("00-ab000000000000000000000000000000-cd00000000000000-qw")]
    #[case::signed_span_id("00-ab000000000000000000000000000000-+d00000000000000-01")]
    #[case::upper_case_version("A0-00000000000000000000000000000000-0000000000000000-01")]
    #[case::upper_case_trace_id("00-AB000000000000000000000000000000-cd00000000000000-01")]
    #[case::upper_case_span_id("00-ab000000000000000000000000000000-CD00000000000000-01")]
    #[case::upper_case_flags("00-ab000000000000000000000000000000-cd00000000000000-A1")]
    #[case::zero_ids("00-00000000000000000000000000000000-0000000000000000-01")]
    #[case::unused_flag_bits("00-ab000000000000000000000000000000-cd00000000000000-09")]
    #[case::missing_options("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7")]
    #[case::empty_options("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-")]
    #[case::version_ff("ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")]
    #[case::garbage("not a traceparent")]
    fn extract_invalid_yields_empty_context(#[case] traceparent: &str) {
        let cx = TraceContextPropagator::new().extract(&carrier(traceparent));
        assert_eq!(cx, Context::new());
    }

    #[test]
    fn missing_header_keeps_context() {
        let parent = Context::new().with_span_context(SpanContext::new(
            TraceId::from(1),
            SpanId::from(2),
            TraceFlags::SAMPLED,
            false,
        ));
        let cx = TraceContextPropagator::new().extract_with_context(&parent, &HashMap::new());
        assert_eq!(cx, parent);
    }

    #[test]
    fn inject_then_extract() {
        let span_context = SpanContext::new(
            TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736),
            SpanId::from(0x00f0_67aa_0ba9_02b7),
            TraceFlags::SAMPLED,
            false,
        );
        let propagator = TraceContextPropagator::new();
        let mut injector = HashMap::new();
        propagator.inject_context(&Context::new().with_span_context(span_context.clone()), &mut injector);

        assert_eq!(
            Extractor::get(&injector, TRACEPARENT_HEADER).as_deref(),
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        );
        let extracted = propagator.extract(&injector);
        assert_eq!(extracted.span_context(), Some(&span_context.into_remote()));
    }

    #[test]
    fn invalid_context_is_not_injected() {
        let mut injector: HashMap<String, String> = HashMap::new();
        TraceContextPropagator::new()
            .inject_context(&Context::new().with_span_context(SpanContext::NONE), &mut injector);
        assert!(injector.is_empty());
    }

    #[test]
    fn fields() {
        let propagator = TraceContextPropagator::new();
        assert_eq!(propagator.fields().collect::<Vec<_>>(), vec!["traceparent"]);
    }
}
