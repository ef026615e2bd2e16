use rand::{rngs, Rng, SeedableRng};
use std::cell::RefCell;
use std::fmt;
use std::num::ParseIntError;

/// The W3C trace flags byte. Only bit 0, `sampled`, has a meaning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Copy, Hash)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// No flag set.
    pub const NOT_SAMPLED: TraceFlags = TraceFlags(0x00);

    /// The `sampled` flag.
    pub const SAMPLED: TraceFlags = TraceFlags(0x01);

    /// Wraps a raw flags byte.
    pub const fn new(flags: u8) -> Self {
        TraceFlags(flags)
    }

    /// Whether bit 0 is set.
    pub fn is_sampled(&self) -> bool {
        self.0 & Self::SAMPLED.0 != 0
    }

    /// The raw byte.
    pub fn to_u8(self) -> u8 {
        self.0
    }
}

macro_rules! hex_id {
    ($(#[$doc:meta])* $name:ident($int:ty), $len:literal) => {
        $(#[$doc])*
        ///
        /// All zeros is the invalid id.
        #[derive(Clone, PartialEq, Eq, Copy, Hash)]
        pub struct $name($int);

        impl $name {
            /// The all zeros id.
            pub const INVALID: $name = $name(0);

            /// Big-endian bytes to id.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(<$int>::from_be_bytes(bytes))
            }

            /// Id to big-endian bytes.
            pub const fn to_bytes(self) -> [u8; $len] {
                self.0.to_be_bytes()
            }

            /// Parses a base 16 string. Leading zeros may be omitted.
            pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
                <$int>::from_str_radix(hex, 16).map($name)
            }
        }

        impl From<$int> for $name {
            fn from(value: $int) -> Self {
                $name(value)
            }
        }

        // both print the zero padded lowercase hex form used on the wire
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:0width$x}", self.0, width = $len * 2)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:0width$x}", self.0, width = $len * 2)
            }
        }
    };
}

hex_id! {
    /// Identifies a trace, 16 bytes.
    ///
    /// ```
    /// use beacon_sdk::trace::TraceId;
    ///
    /// assert!(TraceId::from_hex("58406520a006649127e371903a2de979").is_ok());
    /// assert!(TraceId::from_hex("not_hex").is_err());
    /// ```
    TraceId(u128), 16
}

hex_id! {
    /// Identifies a span within its trace, 8 bytes.
    SpanId(u64), 8
}

/// Immutable identity of a span, shared with its children and propagated
/// across process boundaries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    trace_flags: TraceFlags,
    is_remote: bool,
}

impl SpanContext {
    /// The context of no span. Not valid.
    pub const NONE: SpanContext = SpanContext {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        trace_flags: TraceFlags::NOT_SAMPLED,
        is_remote: false,
    };

    /// Assembles a context from its parts.
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        trace_flags: TraceFlags,
        is_remote: bool,
    ) -> Self {
        SpanContext {
            trace_id,
            span_id,
            trace_flags,
            is_remote,
        }
    }

    /// Trace id.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Span id.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Trace flags.
    pub fn trace_flags(&self) -> TraceFlags {
        self.trace_flags
    }

    /// Valid contexts have non zero trace and span ids.
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }

    /// Set on contexts extracted from a carrier.
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// Shorthand for `trace_flags().is_sampled()`.
    pub fn is_sampled(&self) -> bool {
        self.trace_flags.is_sampled()
    }

    pub(crate) fn into_remote(mut self) -> Self {
        self.is_remote = true;
        self
    }
}

/// Source of trace and span ids.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// A new trace id, never [`TraceId::INVALID`].
    fn new_trace_id(&self) -> TraceId;

    /// A new span id, never [`SpanId::INVALID`].
    fn new_span_id(&self) -> SpanId;
}

/// Default [`IdGenerator`] backed by a thread-local RNG.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        CURRENT_RNG.with(|rng| loop {
            let id = rng.borrow_mut().random::<u128>();
            if id != 0 {
                return TraceId(id);
            }
        })
    }

    fn new_span_id(&self) -> SpanId {
        CURRENT_RNG.with(|rng| loop {
            let id = rng.borrow_mut().random::<u64>();
            if id != 0 {
                return SpanId(id);
            }
        })
    }
}

thread_local! {
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formatting_is_zero_padded() {
        assert_eq!(
            TraceId::from(0x42u128).to_string(),
            "00000000000000000000000000000042"
        );
        assert_eq!(SpanId::from(0x42u64).to_string(), "0000000000000042");
    }

    #[test]
    fn hex_parsing_round_trips_display() {
        let trace_id = TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
        assert_eq!(trace_id.to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        let span_id = SpanId::from_hex("00f067aa0ba902b7").unwrap();
        assert_eq!(span_id.to_string(), "00f067aa0ba902b7");
    }

    #[test]
    fn random_ids_are_valid_and_distinct() {
        let generator = RandomIdGenerator::default();
        let a = generator.new_trace_id();
        let b = generator.new_trace_id();
        assert_ne!(a, TraceId::INVALID);
        assert_ne!(a, b);
        assert_ne!(generator.new_span_id(), SpanId::INVALID);
    }

    #[test]
    fn span_context_validity() {
        assert!(!SpanContext::NONE.is_valid());
        let cx = SpanContext::new(
            TraceId::from(1u128),
            SpanId::from(1u64),
            TraceFlags::SAMPLED,
            false,
        );
        assert!(cx.is_valid());
        assert!(cx.is_sampled());
        assert!(cx.into_remote().is_remote());
    }
}
