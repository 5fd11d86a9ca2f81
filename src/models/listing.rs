//! Listing records.

use std::borrow::Borrow;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A site-defined listing record pulled out of the search payload.
pub type RawListing = Map<String, Value>;

/// Stable per-property identifier used to collapse duplicate sightings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

impl DedupKey {
    /// Build a key from an identifier value. Numbers and non-empty strings
    /// qualify; anything else has no usable identity.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DedupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DedupKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical listing restricted to the profile's allow-listed fields.
///
/// Immutable once built; serializes as the flat field mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    key: DedupKey,
    fields: Map<String, Value>,
}

impl NormalizedListing {
    pub(crate) fn new(key: DedupKey, fields: Map<String, Value>) -> Self {
        Self { key, fields }
    }

    pub fn key(&self) -> &DedupKey {
        &self.key
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Serialize for NormalizedListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
