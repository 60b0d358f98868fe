// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Key/value tags attached to a context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value returned by tag lookups when the key is absent.
pub const UNKNOWN: &str = "UNKNOWN";

/// An immutable name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for KeyValue {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Which tag collection a key/value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Bounded value space, safe as a metrics dimension.
    Low,
    /// Unbounded value space, informational only.
    High,
}

/// Ordered, append-only sequence of tags.
///
/// Duplicate keys are kept. Lookups return the first entry with a matching key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValues(Vec<KeyValue>);

impl KeyValues {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from flat `[key, value, key, value, ...]` pairs.
    ///
    /// A trailing key without a value is ignored.
    pub fn from_flat<S: AsRef<str>>(pairs: &[S]) -> Self {
        Self(
            pairs
                .chunks_exact(2)
                .map(|pair| KeyValue::new(pair[0].as_ref(), pair[1].as_ref()))
                .collect(),
        )
    }

    pub fn push(&mut self, key_value: KeyValue) {
        self.0.push(key_value);
    }

    /// First entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.0.iter().find(|kv| kv.key == key)
    }

    /// Value of the first entry for `key`, or [`UNKNOWN`].
    pub fn value_or_unknown(&self, key: &str) -> &str {
        self.get(key).map(KeyValue::value).unwrap_or(UNKNOWN)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyValue> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[KeyValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a KeyValues {
    type Item = &'a KeyValue;
    type IntoIter = std::slice::Iter<'a, KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<KeyValue> for KeyValues {
    fn from_iter<I: IntoIterator<Item = KeyValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<KeyValue> for KeyValues {
    fn extend<I: IntoIterator<Item = KeyValue>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl fmt::Display for KeyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", joined.join(", "))
    }
}
