use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::{IntoIter, Iter};

/// Cookie name to value mapping for a single site.
///
/// Serializes as a flat JSON object: `{"name": "value", ...}`. Keys are kept
/// sorted so the persisted file is stable across rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieRecord(BTreeMap<String, String>);

impl CookieRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Set a cookie, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Merge `other` into this record: new names are added, existing names
    /// take the value from `other`.
    pub fn merge(&mut self, other: CookieRecord) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.0.iter()
    }

    /// Render as a `Cookie` request header value (`a=1; b=2`).
    pub fn to_header_value(&self) -> String {
        self.0.iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("; ")
    }
}

impl From<BTreeMap<String, String>> for CookieRecord {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}
impl From<CookieRecord> for BTreeMap<String, String> {
    fn from(record: CookieRecord) -> Self {
        record.0
    }
}
impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CookieRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
impl IntoIterator for CookieRecord {
    type Item = (String, String);
    type IntoIter = IntoIter<String, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
impl<'a> IntoIterator for &'a CookieRecord {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
