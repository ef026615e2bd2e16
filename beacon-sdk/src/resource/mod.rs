//! Identity of the entity producing telemetry.
//!
//! A [Resource] is an immutable set of attributes, such as the service name and
//! the SDK identity, attached to every span and metric a process exports. It is
//! built once at start-up and shared through an `Arc`.
//!
//! # Resource detectors
//!
//! [`ResourceDetector`]s read resource attributes from the environment. The
//! following ones run by default in [`Resource::builder`]:
//!
//! - [`SdkProvidedResourceDetector`] - `service.name` from `OTEL_SERVICE_NAME`.
//! - [`TelemetryResourceDetector`] - the SDK's own name, language and version.
//! - [`EnvResourceDetector`] - attributes listed in `OTEL_RESOURCE_ATTRIBUTES`.
mod env;
mod telemetry;

pub use env::{EnvResourceDetector, SdkProvidedResourceDetector};
pub use telemetry::TelemetryResourceDetector;

use crate::common::{Key, KeyValue, Value};
use crate::error::{SdkError, SdkResult};
use std::collections::{hash_map, HashMap};
use std::sync::Arc;

/// Logical name of the service.
pub const SERVICE_NAME: &str = "service.name";

/// An immutable representation of the entity producing telemetry as attributes.
///
/// Cloning is cheap: all clones share the same attribute map.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    inner: Arc<HashMap<Key, Value>>,
}

impl Default for Resource {
    /// A resource holding only the attributes found by the default detectors.
    fn default() -> Self {
        Resource::from_detectors(&default_detectors())
    }
}

impl Resource {
    /// Creates a [ResourceBuilder] seeded from the default detectors.
    ///
    /// If you'd like to start from an empty resource, use
    /// [Resource::builder_empty].
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder {
            resource: Resource::default(),
            error: None,
        }
    }

    /// Creates a [ResourceBuilder] with no attributes.
    pub fn builder_empty() -> ResourceBuilder {
        ResourceBuilder {
            resource: Resource::empty(),
            error: None,
        }
    }

    /// Creates an empty resource.
    pub fn empty() -> Self {
        Resource {
            inner: Arc::new(HashMap::new()),
        }
    }

    /// Create a new `Resource` from key value pairs.
    ///
    /// The last value for a repeated key is kept. Fails with
    /// [`SdkError::Configuration`] if any key is empty.
    ///
    /// ```
    /// use beacon_sdk::{KeyValue, Resource};
    ///
    /// let resource = Resource::new([KeyValue::new("service.name", "cart")]).unwrap();
    /// assert_eq!(resource.len(), 1);
    ///
    /// assert!(Resource::new([KeyValue::new("", "x")]).is_err());
    /// ```
    pub fn new<T: IntoIterator<Item = KeyValue>>(kvs: T) -> SdkResult<Self> {
        let mut attrs = HashMap::new();
        for kv in kvs {
            if kv.key.as_str().is_empty() {
                return Err(SdkError::Configuration(format!(
                    "resource attribute with value `{}` has an empty key",
                    kv.value
                )));
            }
            attrs.insert(kv.key, kv.value);
        }
        Ok(Resource {
            inner: Arc::new(attrs),
        })
    }

    /// Builds a resource from pairs that come from outside the program, where
    /// entries with an empty key are skipped instead of rejected.
    pub(crate) fn from_lenient_pairs<T: IntoIterator<Item = KeyValue>>(kvs: T) -> Self {
        Resource {
            inner: Arc::new(
                kvs.into_iter()
                    .filter(|kv| !kv.key.as_str().is_empty())
                    .map(|kv| (kv.key, kv.value))
                    .collect(),
            ),
        }
    }

    /// Create a new `Resource` from resource detectors, later detectors taking
    /// precedence.
    pub fn from_detectors(detectors: &[Box<dyn ResourceDetector>]) -> Self {
        detectors
            .iter()
            .fold(Resource::empty(), |acc, detector| acc.merge(&detector.detect()))
    }

    /// Create a new `Resource` by combining two resources.
    ///
    /// Keys from `other` have priority over keys from this resource, even if the
    /// value in `other` is empty.
    pub fn merge(&self, other: &Resource) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut combined = (*self.inner).clone();
        for (k, v) in other.inner.iter() {
            combined.insert(k.clone(), v.clone());
        }
        Resource {
            inner: Arc::new(combined),
        }
    }

    /// Returns the number of attributes for this resource.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the resource contains no attributes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Gets an iterator over the attributes of this resource.
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.inner.iter())
    }

    /// Retrieve the value from resource associate with given key.
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.inner.get(key).cloned()
    }
}

fn default_detectors() -> [Box<dyn ResourceDetector>; 3] {
    [
        Box::new(SdkProvidedResourceDetector),
        Box::new(TelemetryResourceDetector),
        Box::new(EnvResourceDetector::new()),
    ]
}

/// An iterator over the entries of a `Resource`.
#[derive(Debug)]
pub struct Iter<'a>(hash_map::Iter<'a, Key, Value>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl<'a> IntoIterator for &'a Resource {
    type Item = (&'a Key, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// ResourceDetector detects resource information from the runtime.
///
/// If the source information is unavailable or invalid, an empty resource
/// should be returned.
pub trait ResourceDetector {
    /// Returns the detected resource.
    fn detect(&self) -> Resource;
}

/// Builder for [Resource].
///
/// The first malformed attribute is remembered and reported by
/// [`build`](ResourceBuilder::build).
#[derive(Debug)]
pub struct ResourceBuilder {
    resource: Resource,
    error: Option<SdkError>,
}

impl ResourceBuilder {
    /// Add a single [ResourceDetector] to your resource.
    pub fn with_detector(self, detector: Box<dyn ResourceDetector>) -> Self {
        self.with_detectors(&[detector])
    }

    /// Add multiple [ResourceDetector]s to your resource.
    pub fn with_detectors(mut self, detectors: &[Box<dyn ResourceDetector>]) -> Self {
        self.resource = self.resource.merge(&Resource::from_detectors(detectors));
        self
    }

    /// Add a [KeyValue] to the resource.
    pub fn with_attribute(self, kv: KeyValue) -> Self {
        self.with_attributes([kv])
    }

    /// Add multiple [KeyValue]s to the resource.
    pub fn with_attributes<T: IntoIterator<Item = KeyValue>>(mut self, kvs: T) -> Self {
        match Resource::new(kvs) {
            Ok(resource) => self.resource = self.resource.merge(&resource),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Add `service.name` resource attribute.
    pub fn with_service_name(self, name: impl Into<Value>) -> Self {
        self.with_attribute(KeyValue::new(SERVICE_NAME, name.into()))
    }

    /// Create the [Resource], or return the first configuration error.
    pub fn build(self) -> SdkResult<Resource> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([KeyValue::new("a", ""), KeyValue::new("a", "final")], Value::from("final"))]
    #[case([KeyValue::new("a", "final"), KeyValue::new("a", "")], Value::from(""))]
    fn last_value_wins(#[case] given: [KeyValue; 2], #[case] expected: Value) {
        let resource = Resource::builder_empty()
            .with_attributes(given)
            .build()
            .unwrap();
        assert_eq!(resource.len(), 1);
        assert_eq!(resource.get(&Key::new("a")), Some(expected));
    }

    #[test]
    fn merge_prefers_right_hand_side() {
        let a = Resource::new([
            KeyValue::new("a", ""),
            KeyValue::new("b", "b-value"),
            KeyValue::new("d", "d-value"),
        ])
        .unwrap();
        let b = Resource::new([
            KeyValue::new("a", "a-value"),
            KeyValue::new("c", "c-value"),
            KeyValue::new("d", ""),
        ])
        .unwrap();

        let merged = a.merge(&b);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.get(&Key::new("a")), Some(Value::from("a-value")));
        assert_eq!(merged.get(&Key::new("b")), Some(Value::from("b-value")));
        assert_eq!(merged.get(&Key::new("c")), Some(Value::from("c-value")));
        assert_eq!(merged.get(&Key::new("d")), Some(Value::from("")));
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        let result = Resource::builder_empty()
            .with_service_name("cart")
            .with_attribute(KeyValue::new("", "orphan"))
            .with_attribute(KeyValue::new("library.language", "rust"))
            .build();
        assert!(matches!(result, Err(SdkError::Configuration(_))));
    }

    #[test]
    fn builder_includes_default_detectors() {
        temp_env::with_vars(
            [
                ("OTEL_SERVICE_NAME", Some("from-env")),
                ("OTEL_RESOURCE_ATTRIBUTES", Some("deployment=test")),
            ],
            || {
                let resource = Resource::builder().build().unwrap();
                assert_eq!(
                    resource.get(&Key::new(SERVICE_NAME)),
                    Some(Value::from("from-env"))
                );
                assert_eq!(
                    resource.get(&Key::new("deployment")),
                    Some(Value::from("test"))
                );
                assert_eq!(
                    resource.get(&Key::new("telemetry.sdk.language")),
                    Some(Value::from("rust"))
                );
            },
        );
    }

    #[test]
    fn programmatic_service_name_overrides_environment() {
        temp_env::with_var("OTEL_SERVICE_NAME", Some("from-env"), || {
            let resource = Resource::builder()
                .with_service_name("cart-service")
                .build()
                .unwrap();
            assert_eq!(
                resource.get(&Key::new(SERVICE_NAME)),
                Some(Value::from("cart-service"))
            );
        });
    }

    #[test]
    fn builder_empty_has_no_attributes() {
        assert!(Resource::builder_empty().build().unwrap().is_empty());
    }
}
