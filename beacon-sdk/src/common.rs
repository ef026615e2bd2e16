//! Attribute and scope primitives shared by spans, metrics and resources.
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Name of an attribute. Static names are never copied.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Cow<'static, str>);

impl Key {
    /// Converts anything string-like into a key.
    ///
    /// ```
    /// use beacon_sdk::Key;
    ///
    /// let key1 = Key::new("my_static_str");
    /// let key2 = Key::new(String::from("my_owned_string"));
    /// assert_ne!(key1, key2);
    /// ```
    pub fn new(value: impl Into<Key>) -> Self {
        value.into()
    }

    /// Key for a `const` context.
    pub const fn from_static_str(value: &'static str) -> Self {
        Key(Cow::Borrowed(value))
    }

    /// The attribute name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// string conversions shared by keys and string values
macro_rules! from_strings {
    ($target:ty, $wrap:expr) => {
        impl From<&'static str> for $target {
            fn from(s: &'static str) -> Self {
                $wrap(Cow::Borrowed(s))
            }
        }

        impl From<String> for $target {
            fn from(s: String) -> Self {
                $wrap(Cow::Owned(s))
            }
        }

        impl From<Cow<'static, str>> for $target {
            fn from(s: Cow<'static, str>) -> Self {
                $wrap(s)
            }
        }
    };
}

from_strings!(Key, Key);

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0.into_owned()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Value of an attribute.
///
/// Only scalar types and strings are supported. Floats compare and hash by bit
/// pattern so that attribute sets can key a map.
#[derive(Clone, Debug)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    I64(i64),
    /// A float.
    F64(f64),
    /// A string.
    String(Cow<'static, str>),
}

impl Value {
    /// Text form of the value. Borrows for strings, formats otherwise.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::String(v) => Cow::Borrowed(v.as_ref()),
            Value::Bool(v) => Cow::Owned(v.to_string()),
            Value::I64(v) => Cow::Owned(v.to_string()),
            Value::F64(v) => Cow::Owned(v.to_string()),
        }
    }
}

// NaN equals itself here
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

from_strings!(Value, Value::String);

/// One attribute of a span, a metric series or a resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyValue {
    /// Name.
    pub key: Key,
    /// Value.
    pub value: Value,
}

impl KeyValue {
    /// Builds an attribute from anything convertible.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Information about the component emitting telemetry.
///
/// Tracers and meters are created for a scope, and every span or metric they
/// produce is grouped under it when exported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstrumentationScope {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
}

impl InstrumentationScope {
    /// A scope without version.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        InstrumentationScope {
            name: name.into(),
            version: None,
        }
    }

    /// Sets the version, usually the crate version.
    pub fn with_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Name, as given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version, when one was set.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}
