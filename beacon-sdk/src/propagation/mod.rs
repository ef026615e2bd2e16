//! # Context propagation
//!
//! Cross-cutting concerns send their state to the next process using
//! propagators, which read and write [`Context`] data to and from the messages
//! exchanged by the applications.
//!
//! The [`TraceContextPropagator`] carries the active span in the W3C
//! `traceparent` header and the [`BaggagePropagator`] carries [`Baggage`] in
//! the `baggage` header. [`TextMapCompositePropagator`] runs several of them
//! as one.
//!
//! Propagators use [`Injector`] and [`Extractor`] to write to and read from a
//! carrier. Both are implemented for `HashMap<String, String>`; HTTP layers
//! implement them for their own header types.
//!
//! ```
//! use beacon_sdk::propagation::{
//!     BaggagePropagator, TextMapCompositePropagator, TextMapPropagator, TraceContextPropagator,
//! };
//! use beacon_sdk::{trace::TracerProvider, Baggage, Context};
//! use std::collections::HashMap;
//!
//! let propagator = TextMapCompositePropagator::new(vec![
//!     Box::new(TraceContextPropagator::new()),
//!     Box::new(BaggagePropagator::new()),
//! ]);
//!
//! let provider = TracerProvider::builder().build();
//! let (cx, _span) = provider.tracer("client").start("request", &Context::new());
//! let cx = cx.with_baggage(Baggage::from_iter([("user.tier", "gold")]));
//!
//! let mut headers = HashMap::new();
//! propagator.inject_context(&cx, &mut headers);
//!
//! let remote = propagator.extract(&headers);
//! assert_eq!(remote.span_context().map(|sc| sc.trace_id()), cx.span_context().map(|sc| sc.trace_id()));
//! assert_eq!(remote.baggage().get("user.tier"), Some("gold"));
//! ```
//!
//! [`Baggage`]: crate::Baggage
use crate::context::Context;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::slice;

mod baggage;
mod composite;
mod trace_context;

pub use baggage::BaggagePropagator;
pub use composite::TextMapCompositePropagator;
pub use trace_context::TraceContextPropagator;

/// Injector provides an interface for adding fields from an underlying struct like `HashMap`
pub trait Injector {
    /// Add a key and value to the underlying data.
    fn set(&mut self, key: &str, value: String);
}

/// Extractor provides an interface for removing fields from an underlying struct like `HashMap`
pub trait Extractor {
    /// Get a value from a key from the underlying data.
    fn get(&self, key: &str) -> Option<Cow<'_, str>>;

    /// Collect all the keys from the underlying data.
    fn keys(&self) -> Vec<Cow<'_, str>>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    /// Set a key and value in the HashMap.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    /// Get a value for a key from the HashMap.
    fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(&key.to_lowercase())
            .map(|v| Cow::Borrowed(v.as_str()))
    }

    /// Collect all the keys from the HashMap.
    fn keys(&self) -> Vec<Cow<'_, str>> {
        self.keys()
            .map(|k| Cow::Borrowed(k.as_str()))
            .collect::<Vec<_>>()
    }
}

/// Methods to inject and extract a value as text into injectors and
/// extractors that travel in-band across process boundaries.
pub trait TextMapPropagator: Debug + Send + Sync {
    /// Properly encodes the values of the [`Context`] and injects them into
    /// the [`Injector`].
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector);

    /// Retrieves encoded data using the provided [`Extractor`] and merges it
    /// into `cx`. Returns `cx` unchanged when nothing valid was found.
    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context;

    /// Extracts into an empty [`Context`].
    fn extract(&self, extractor: &dyn Extractor) -> Context {
        self.extract_with_context(&Context::new(), extractor)
    }

    /// Returns iter of fields used by [`TextMapPropagator`]
    fn fields(&self) -> FieldIter<'_>;
}

/// An iterator over fields of a [`TextMapPropagator`]
#[derive(Debug)]
pub struct FieldIter<'a>(slice::Iter<'a, String>);

impl<'a> FieldIter<'a> {
    /// Create a new `FieldIter` from a slice of propagator fields
    pub fn new(fields: &'a [String]) -> Self {
        FieldIter(fields.iter())
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|field| field.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_get() {
        let mut carrier = HashMap::new();
        carrier.set("headerName", "value".to_string());

        assert_eq!(
            Extractor::get(&carrier, "HEADERNAME"),
            Some(Cow::Borrowed("value")),
            "case insensitive extraction"
        );
    }

    #[test]
    fn hash_map_keys() {
        let mut carrier = HashMap::new();
        carrier.set("headerName1", "value1".to_string());
        carrier.set("headerName2", "value2".to_string());

        let got = Extractor::keys(&carrier);
        assert_eq!(got.len(), 2);
        assert!(got.contains(&Cow::Borrowed("headername1")));
        assert!(got.contains(&Cow::Borrowed("headername2")));
    }
}
