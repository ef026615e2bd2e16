use beacon_sdk::{InstrumentationScope, KeyValue, Resource, Value};
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, InstrumentationScope as TonicInstrumentationScope,
    KeyValue as TonicKeyValue,
};
use opentelemetry_proto::tonic::resource::v1::Resource as TonicResource;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos() as u64
}

/// Converts an attribute value.
pub fn value_to_any_value(value: &Value) -> AnyValue {
    AnyValue {
        value: Some(match value {
            Value::Bool(val) => any_value::Value::BoolValue(*val),
            Value::I64(val) => any_value::Value::IntValue(*val),
            Value::F64(val) => any_value::Value::DoubleValue(*val),
            Value::String(val) => any_value::Value::StringValue(val.to_string()),
        }),
    }
}

/// Converts one attribute.
pub fn key_value_to_tonic(kv: &KeyValue) -> TonicKeyValue {
    TonicKeyValue {
        key: kv.key.as_str().to_string(),
        value: Some(value_to_any_value(&kv.value)),
    }
}

/// Converts a list of attributes, keeping their order.
pub fn attributes_to_tonic(attributes: &[KeyValue]) -> Vec<TonicKeyValue> {
    attributes.iter().map(key_value_to_tonic).collect()
}

/// Converts a resource. Attributes are sorted by key so that the output does
/// not depend on hash map order.
pub fn resource_to_tonic(resource: &Resource) -> TonicResource {
    let mut attributes: Vec<TonicKeyValue> = resource
        .iter()
        .map(|(key, value)| TonicKeyValue {
            key: key.as_str().to_string(),
            value: Some(value_to_any_value(value)),
        })
        .collect();
    attributes.sort_by(|a, b| a.key.cmp(&b.key));

    TonicResource {
        attributes,
        dropped_attributes_count: 0,
        entity_refs: vec![],
    }
}

/// Converts an instrumentation scope.
pub fn scope_to_tonic(scope: &InstrumentationScope) -> TonicInstrumentationScope {
    TonicInstrumentationScope {
        name: scope.name().to_string(),
        version: scope.version().unwrap_or_default().to_string(),
        attributes: vec![],
        dropped_attributes_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_keep_their_type() {
        let converted = attributes_to_tonic(&[
            KeyValue::new("error", true),
            KeyValue::new("http.status", 500_i64),
            KeyValue::new("latency", 0.25),
            KeyValue::new("route", "/cart/add"),
        ]);
        let values: Vec<_> = converted.into_iter().map(|kv| (kv.key, kv.value.and_then(|v| v.value))).collect();
        assert_eq!(
            values,
            vec![
                ("error".to_string(), Some(any_value::Value::BoolValue(true))),
                ("http.status".to_string(), Some(any_value::Value::IntValue(500))),
                ("latency".to_string(), Some(any_value::Value::DoubleValue(0.25))),
                (
                    "route".to_string(),
                    Some(any_value::Value::StringValue("/cart/add".to_string()))
                ),
            ]
        );
    }

    #[test]
    fn resource_attributes_are_sorted() {
        let resource = Resource::builder_empty()
            .with_service_name("cart-service")
            .with_attribute(KeyValue::new("library.language", "rust"))
            .build()
            .unwrap();
        let keys: Vec<_> = resource_to_tonic(&resource)
            .attributes
            .into_iter()
            .map(|kv| kv.key)
            .collect();
        assert_eq!(keys, vec!["library.language", "service.name"]);
    }

    #[test]
    fn scope_without_version() {
        let scope = scope_to_tonic(&InstrumentationScope::new("cart"));
        assert_eq!(scope.name, "cart");
        assert_eq!(scope.version, "");
    }
}
