use crate::baggage::Baggage;
use crate::context::Context;
use crate::propagation::{Extractor, FieldIter, Injector, TextMapPropagator};
use crate::beacon_warn;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::OnceLock;

static BAGGAGE_HEADER: &str = "baggage";
const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b';').add(b',').add(b'=');

static BAGGAGE_FIELDS: OnceLock<[String; 1]> = OnceLock::new();

fn baggage_fields() -> &'static [String; 1] {
    BAGGAGE_FIELDS.get_or_init(|| [BAGGAGE_HEADER.to_owned()])
}

/// Propagates name-value pairs in [W3C Baggage] format.
///
/// Keys and values are percent-encoded on injection and decoded on
/// extraction. Entry properties (`;`-separated metadata after a value) are
/// accepted on extraction and dropped. Entries that cannot be parsed are
/// skipped; the valid ones around them are kept.
///
/// ```
/// use beacon_sdk::propagation::{BaggagePropagator, TextMapPropagator};
/// use beacon_sdk::{Baggage, Context};
/// use std::collections::HashMap;
///
/// let propagator = BaggagePropagator::new();
///
/// let mut headers = HashMap::new();
/// headers.insert("baggage".to_string(), "user_id=1,tier=gold%20plus".to_string());
/// let cx = propagator.extract(&headers);
/// assert_eq!(cx.baggage().get("tier"), Some("gold plus"));
///
/// let mut outgoing = HashMap::new();
/// let cx = Context::new().with_baggage(Baggage::from_iter([("city", "São Paulo")]));
/// propagator.inject_context(&cx, &mut outgoing);
/// assert_eq!(outgoing.get("baggage").map(String::as_str), Some("city=S%C3%A3o%20Paulo"));
/// ```
///
/// [W3C Baggage]: https://w3c.github.io/baggage
#[derive(Debug, Default)]
pub struct BaggagePropagator {
    _private: (),
}

impl BaggagePropagator {
    /// Construct a new baggage propagator.
    pub fn new() -> Self {
        BaggagePropagator { _private: () }
    }
}

fn parse_entry(entry: &str) -> Option<(String, String)> {
    // properties after the first ';' are not kept
    let name_value = entry.split(';').next()?;
    let (name, value) = name_value.split_once('=')?;
    let name = percent_decode_str(name.trim()).decode_utf8();
    let value = percent_decode_str(value.trim()).decode_utf8();
    match (name, value) {
        (Ok(name), Ok(value)) => Some((name.into_owned(), value.into_owned())),
        _ => {
            beacon_warn!(
                name: "BaggagePropagator.Extract.InvalidUTF8",
                message = "Invalid UTF8 string in key value pair"
            );
            None
        }
    }
}

impl TextMapPropagator for BaggagePropagator {
    /// Encodes the values of the `Context` and injects them into the provided `Injector`.
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let baggage = cx.baggage();
        if baggage.is_empty() {
            return;
        }
        let header_value = baggage
            .iter()
            .map(|(name, value)| {
                utf8_percent_encode(name.trim(), FRAGMENT)
                    .chain(std::iter::once("="))
                    .chain(utf8_percent_encode(value, FRAGMENT))
                    .collect::<String>()
            })
            .collect::<Vec<String>>()
            .join(",");
        injector.set(BAGGAGE_HEADER, header_value);
    }

    /// Extracts a `Context` with baggage values from an `Extractor`.
    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        let Some(header_value) = extractor.get(BAGGAGE_HEADER) else {
            return cx.clone();
        };
        if header_value.trim().is_empty() {
            return cx.clone();
        }

        let mut baggage = Baggage::new();
        for entry in header_value.split(',').filter(|e| !e.trim().is_empty()) {
            match parse_entry(entry) {
                Some((name, value)) => {
                    baggage.insert(name, value);
                }
                None if !entry.contains('=') => {
                    beacon_warn!(
                        name: "BaggagePropagator.Extract.InvalidKeyValueFormat",
                        message = "Invalid baggage key-value format",
                        entry = entry.to_string()
                    );
                }
                None => {}
            }
        }
        if baggage.is_empty() {
            beacon_warn!(
                name: "BaggagePropagator.Extract.InvalidFormat",
                message = "No valid baggage entry in header"
            );
            return cx.clone();
        }
        cx.with_baggage(baggage)
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(baggage_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn extract(header: &str) -> Context {
        let mut extractor = HashMap::new();
        extractor.insert(BAGGAGE_HEADER.to_string(), header.to_string());
        BaggagePropagator::new().extract(&extractor)
    }

    #[rstest]
    #[case("key1=val1,key2=val2", vec![("key1", "val1"), ("key2", "val2")])]
    #[case("key1 = val1, key2 =val2 ", vec![("key1", "val1"), ("key2", "val2")])]
    #[case("key1=val1,key2=val2%2Cval3", vec![("key1", "val1"), ("key2", "val2,val3")])]
    #[case("key1=val1;prop=1,key2=val2;p1;p2=x", vec![("key1", "val1"), ("key2", "val2")])]
    #[case("key1=val1,,key2=val2", vec![("key1", "val1"), ("key2", "val2")])]
    #[case("key1=val1,garbage,key2=val2", vec![("key1", "val1"), ("key2", "val2")])]
    #[case("key1=%FF,key2=val2", vec![("key2", "val2")])]
    fn extract_baggage(#[case] header: &str, #[case] expected: Vec<(&str, &str)>) {
        let cx = extract(header);
        let entries: Vec<(&str, &str)> = cx.baggage().iter().collect();
        assert_eq!(entries, expected);
    }

    #[rstest]
    #[case("")]
    #[case("garbage")]
    #[case("=,=")]
    fn unusable_header_keeps_context(#[case] header: &str) {
        assert_eq!(extract(header), Context::new());
    }

    #[test]
    fn inject_encodes_reserved_characters() {
        let baggage = Baggage::from_iter([("key1", "val1,val2"), ("key2", "a=b; c")]);
        let mut injector = HashMap::new();
        BaggagePropagator::new().inject_context(&Context::new().with_baggage(baggage), &mut injector);

        assert_eq!(
            injector.get(BAGGAGE_HEADER).map(String::as_str),
            Some("key1=val1%2Cval2,key2=a%3Db%3B%20c")
        );
    }

    #[test]
    fn empty_baggage_is_not_injected() {
        let mut injector: HashMap<String, String> = HashMap::new();
        BaggagePropagator::new().inject_context(&Context::new(), &mut injector);
        assert!(injector.is_empty());
    }

    #[test]
    fn inject_then_extract_keeps_entries() {
        let baggage = Baggage::from_iter([("user.id", "42"), ("note", "a b,c=d;e")]);
        let propagator = BaggagePropagator::new();
        let mut carrier = HashMap::new();
        propagator.inject_context(&Context::new().with_baggage(baggage.clone()), &mut carrier);

        let cx = propagator.extract(&carrier);
        assert_eq!(cx.baggage(), &baggage);
    }
}
