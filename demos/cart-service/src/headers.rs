//! Propagation carriers over HTTP headers.
use beacon_sdk::propagation::{Extractor, Injector};
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use std::borrow::Cow;

/// Writes propagation fields into a header map. Invalid names or values are
/// skipped.
pub(crate) struct HeaderInjector<'a>(pub(crate) &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = HeaderName::from_bytes(key.as_bytes()) {
            if let Ok(val) = HeaderValue::from_str(&value) {
                self.0.insert(name, val);
            }
        }
    }
}

/// Reads propagation fields from a header map. Values that are not visible
/// ASCII are ignored.
pub(crate) struct HeaderExtractor<'a>(pub(crate) &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.0
            .get(key)
            .and_then(|value| value.to_str().ok())
            .map(Cow::Borrowed)
    }

    fn keys(&self) -> Vec<Cow<'_, str>> {
        self.0.keys().map(|name| Cow::Borrowed(name.as_str())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_headers_are_extracted() {
        let mut headers = HeaderMap::new();
        HeaderInjector(&mut headers).set("traceparent", "00-abc-01".to_string());
        HeaderInjector(&mut headers).set("bad header", "ignored".to_string());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent").as_deref(), Some("00-abc-01"));
        assert_eq!(extractor.get("Traceparent").as_deref(), Some("00-abc-01"));
        assert_eq!(extractor.keys(), vec![Cow::Borrowed("traceparent")]);
    }
}
