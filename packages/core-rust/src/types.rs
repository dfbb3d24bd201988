use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize;

/// Field map of a single document. `BTreeMap` keeps serialization order stable.
pub type Fields = BTreeMap<String, Value>;

/// Generic runtime value for document fields.
///
/// Remote documents are untyped at the boundary, so every field is carried as
/// a `Value` and only interpreted through the accessor methods on [`Record`].
/// Serializes untagged, so a `Value` renders as plain JSON (timestamps as
/// RFC 3339 strings).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// Store-native timestamp.
    Timestamp(DateTime<Utc>),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object. Also used for embedded sub-records produced by joins.
    Map(Fields),
}

impl Value {
    /// Returns the string slice if this is a `String` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested field map if this is a `Map` value.
    #[must_use]
    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// `true` for `Null`, empty strings, and whitespace-only strings.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Converts into a `serde_json::Value`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// One document from the remote store: a stable id plus untyped fields.
///
/// Fields are never accessed directly by consumers; the accessors below
/// normalize on read and degrade to `None` instead of failing, so malformed
/// upstream data cannot crash a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by the store.
    pub id: String,
    /// Document fields, flattened next to `id` when serialized.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Top-level field lookup.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Dotted-path lookup into embedded maps, e.g. `"tenant.name"`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// String content of the field at `path`. Non-string and absent values
    /// coerce to the empty string. The path `"id"` falls back to the record id
    /// when no field of that name exists.
    #[must_use]
    pub fn text(&self, path: &str) -> &str {
        match self.get_path(path) {
            Some(value) => value.as_str().unwrap_or(""),
            None if path == "id" => &self.id,
            None => "",
        }
    }

    /// First non-blank string among `paths`, trimmed.
    #[must_use]
    pub fn first_text(&self, paths: &[String]) -> Option<&str> {
        paths
            .iter()
            .map(|p| self.text(p).trim())
            .find(|s| !s.is_empty())
    }

    /// Decimal amount at `path`, or `None` when missing or unparseable.
    #[must_use]
    pub fn amount(&self, path: &str) -> Option<f64> {
        self.get_path(path).and_then(normalize::parse_amount)
    }

    /// Normalized instant at `path`, or `None` when missing or unparseable.
    #[must_use]
    pub fn timestamp(&self, path: &str) -> Option<DateTime<Utc>> {
        self.get_path(path).and_then(normalize::to_instant)
    }

    /// Returns a copy of this record with `key` set to `value`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}
