//! Environment variables resource detector
//!
//! Implementation of `ResourceDetector` to extract a `Resource` from environment
//! variables.
use crate::common::{Key, KeyValue, Value};
use crate::resource::{Resource, ResourceDetector, SERVICE_NAME};
use std::env;

const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";
const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

/// EnvResourceDetector extracts a resource from the `OTEL_RESOURCE_ATTRIBUTES`
/// environment variable, formatted as `key1=value1,key2=value2`.
#[derive(Debug)]
pub struct EnvResourceDetector {
    _private: (),
}

impl ResourceDetector for EnvResourceDetector {
    fn detect(&self) -> Resource {
        match env::var(OTEL_RESOURCE_ATTRIBUTES) {
            Ok(s) if !s.is_empty() => parse_resource_attributes(&s),
            Ok(_) | Err(_) => Resource::empty(),
        }
    }
}

impl EnvResourceDetector {
    /// Create `EnvResourceDetector` instance.
    pub fn new() -> Self {
        EnvResourceDetector { _private: () }
    }
}

impl Default for EnvResourceDetector {
    fn default() -> Self {
        EnvResourceDetector::new()
    }
}

/// Entries without `=` or with an empty key are skipped.
fn parse_resource_attributes(s: &str) -> Resource {
    Resource::from_lenient_pairs(s.split_terminator(',').filter_map(|entry| {
        let (key, value) = entry.split_once('=')?;
        Some(KeyValue::new(
            key.trim().to_owned(),
            value.trim().to_owned(),
        ))
    }))
}

/// Detects `service.name`.
///
/// `OTEL_SERVICE_NAME` is tried first, then a `service.name` entry in
/// `OTEL_RESOURCE_ATTRIBUTES`, and `unknown_service` is used if neither is set.
#[derive(Debug)]
pub struct SdkProvidedResourceDetector;

impl ResourceDetector for SdkProvidedResourceDetector {
    fn detect(&self) -> Resource {
        let service_name = env::var(OTEL_SERVICE_NAME)
            .ok()
            .filter(|s| !s.is_empty())
            .map(Value::from)
            .or_else(|| {
                EnvResourceDetector::new()
                    .detect()
                    .get(&Key::from_static_str(SERVICE_NAME))
            })
            .unwrap_or_else(|| "unknown_service".into());
        Resource::from_lenient_pairs([KeyValue::new(SERVICE_NAME, service_name)])
    }
}
