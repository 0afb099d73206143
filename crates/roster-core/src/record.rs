//! Source records as read from the document store.
//!
//! Documents arrive as loosely-typed JSON maps. [`RawRecord`] wraps the map
//! and exposes typed optional accessors; a value of the wrong type reads as
//! absent. Validation happens once, in the field mapper.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loosely-typed field map of a source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Whether the field exists at all (including explicit `null`).
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of a field. Numbers are rendered as text.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Trimmed string value, treating blank text as absent.
    pub fn non_blank(&self, key: &str) -> Option<String> {
        self.string(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// First non-blank value among `keys`, in order.
    pub fn first_non_blank(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.non_blank(key))
    }

    /// Boolean value. Accepts JSON booleans and the strings "true"/"false".
    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// One document to migrate: its store identifier plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub fields: RawRecord,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, fields: RawRecord) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a JSON object. Non-object values yield an empty
    /// field map.
    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => RawRecord::new(map),
            _ => RawRecord::default(),
        };
        Self::new(id, fields)
    }
}
