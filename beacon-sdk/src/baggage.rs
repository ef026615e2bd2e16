//! User-defined name/value pairs carried alongside a [`Context`].
//!
//! Baggage travels between services in the `baggage` header (see
//! [`BaggagePropagator`]). It is not attached to spans or metrics
//! automatically.
//!
//! [`Context`]: crate::Context
//! [`BaggagePropagator`]: crate::propagation::BaggagePropagator
use std::collections::btree_map::{self, BTreeMap, Entry};

const MAX_KEY_VALUE_PAIRS: usize = 180;
const MAX_LEN_OF_ALL_PAIRS: usize = 8192;

// https://datatracker.ietf.org/doc/html/rfc7230#section-3.2.6
const INVALID_ASCII_KEY_CHARS: [u8; 17] = [
    b'(', b')', b',', b'/', b':', b';', b'<', b'=', b'>', b'?', b'@', b'[', b'\\', b']', b'{',
    b'}', b'"',
];

/// A set of name/value pairs describing user-defined properties.
///
/// ### Limits
///
/// * Maximum number of name/value pairs: `180`.
/// * Maximum total length of all name/value pairs: `8192` bytes.
///
/// Inserts that would exceed a limit, or that use an invalid name, are
/// ignored.
///
/// ```
/// use beacon_sdk::Baggage;
///
/// let mut baggage = Baggage::new();
/// baggage.insert("user.tier", "gold");
///
/// assert_eq!(baggage.get("user.tier"), Some("gold"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Baggage {
    inner: BTreeMap<String, String>,
    kv_content_len: usize,
}

impl Baggage {
    /// Creates an empty `Baggage`.
    pub fn new() -> Self {
        Baggage::default()
    }

    /// Returns the value associated with a given name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Inserts a name/value pair, returning the previous value for the name.
    ///
    /// The pair is silently rejected when the name is not a valid token or a
    /// limit would be exceeded.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let (key, value) = (key.into(), value.into());
        let entries_count = self.inner.len();
        match self.inner.entry(key) {
            Entry::Occupied(mut occupied) => {
                let new_len = self.kv_content_len + value.len() - occupied.get().len();
                if new_len > MAX_LEN_OF_ALL_PAIRS {
                    return None;
                }
                self.kv_content_len = new_len;
                Some(occupied.insert(value))
            }
            Entry::Vacant(vacant) => {
                if !is_key_valid(vacant.key().as_bytes()) || entries_count == MAX_KEY_VALUE_PAIRS
                {
                    return None;
                }
                let new_len = self.kv_content_len + vacant.key().len() + value.len();
                if new_len > MAX_LEN_OF_ALL_PAIRS {
                    return None;
                }
                self.kv_content_len = new_len;
                vacant.insert(value);
                None
            }
        }
    }

    /// Removes a name, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let (key, value) = self.inner.remove_entry(key)?;
        self.kv_content_len -= key.len() + value.len();
        Some(value)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the baggage has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over the entries in name order.
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.inner.iter())
    }
}

fn is_key_valid(key: &[u8]) -> bool {
    !key.is_empty()
        && key
            .iter()
            .all(|b| b.is_ascii_graphic() && !INVALID_ASCII_KEY_CHARS.contains(b))
}

/// An iterator over the entries of a [`Baggage`].
#[derive(Debug)]
pub struct Iter<'a>(btree_map::Iter<'a, String, String>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a Baggage {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Baggage
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut baggage = Baggage::new();
        for (key, value) in iter {
            baggage.insert(key, value);
        }
        baggage
    }
}
