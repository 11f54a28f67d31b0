//! Per-attribute before/after values captured by one audit record.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One attribute's `(old, new)` pair. Serialized as a two-element array.
///
/// `Value::Null` stands for "absent": the old side of a create and the new
/// side of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Change(pub Value, pub Value);

impl Change {
    #[must_use]
    pub const fn new(old: Value, new: Value) -> Self {
        Self(old, new)
    }

    /// A change introduced by a create: no old value.
    #[must_use]
    pub const fn created(new: Value) -> Self {
        Self(Value::Null, new)
    }

    /// A change removed by a delete: no new value.
    #[must_use]
    pub const fn deleted(old: Value) -> Self {
        Self(old, Value::Null)
    }

    #[must_use]
    pub const fn old(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub const fn new_value(&self) -> &Value {
        &self.1
    }
}

/// Attribute name → change, ordered by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ChangePayload(BTreeMap<String, Change>);

impl ChangePayload {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, old: Value, new: Value) -> Self {
        self.0.insert(attribute.into(), Change(old, new));
        self
    }

    pub fn insert(&mut self, attribute: impl Into<String>, change: Change) -> Option<Change> {
        self.0.insert(attribute.into(), change)
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Change> {
        self.0.get(attribute)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change)> {
        self.0.iter()
    }

    /// Attribute names touched by this payload.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Change)> for ChangePayload {
    fn from_iter<I: IntoIterator<Item = (String, Change)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ChangePayload {
    type Item = (String, Change);
    type IntoIter = std::collections::btree_map::IntoIter<String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangePayload {
    type Item = (&'a String, &'a Change);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
