// crates/hit-dispatch-core/src/params.rs
// ============================================================================
// Module: Hit Parameters
// Description: Insertion-ordered string parameter map for hits.
// Purpose: Give hits reproducible serialization with last-write-wins keys.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`HitParams`] is the parameter mapping carried by every hit.
//! Invariants:
//! - Keys are unique.
//! - Iteration order is first-insertion order; overwriting a key keeps its
//!   original position and replaces the value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::ser::SerializeMap;
use serde::ser::Serializer;

// ============================================================================
// SECTION: Hit Parameters
// ============================================================================

/// Insertion-ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitParams {
    /// Ordered key/value entries with unique keys.
    entries: Vec<(String, String)>,
}

impl HitParams {
    /// Creates an empty parameter map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts a parameter, replacing any existing value for the key.
    ///
    /// Returns the previous value when the key was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(name, _)| *name == key) {
            return Some(std::mem::replace(existing, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Inserts a parameter only when a value is provided.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Applies every entry of `other` on top of this map.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Returns the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Returns true when `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, returning its value when present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no parameters are present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Iterates parameter names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for HitParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

impl<K, V> Extend<(K, V)> for HitParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for HitParams {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for HitParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
