//! The dynamic state tree: values, records, and collections.
//!
//! Replicated state is a tree of [`Value`]s rooted at a single record. The
//! variants mirror JSON with one distinction that matters for navigation:
//! a [`Value::Map`] is a *keyed collection* (entries come and go at
//! runtime, e.g. `players` keyed by session id), while a [`Value::Record`]
//! is a *record* with named fields. Records created from a schema class
//! carry the class name and reject writes to undeclared fields.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as Json;

use crate::SchemaError;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// One node in the replicated state tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Ordered collection.
    Array(Vec<Value>),
    /// Keyed collection, e.g. a `map` field holding one entry per session.
    Map(BTreeMap<String, Value>),
    /// A record: a class instance or a plain intermediate object.
    Record(Record),
}

impl Value {
    /// Converts a JSON value into a state value. Objects become plain
    /// (classless) records.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            Json::Object(fields) => Value::Record(Record {
                class: None,
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            }),
        }
    }

    /// Converts the tree into plain JSON. Integral numbers serialize as
    /// integers so snapshots compare naturally against literals.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => Json::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Record(r) => Json::Object(
                r.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Numeric view of this value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value is a record (class instance or plain object).
    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }
}

fn number_to_json(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Json::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.fields.len()))?;
                for (k, v) in &r.fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A record with named fields.
///
/// Records built by [`ClassTable::instantiate`](crate::ClassTable::instantiate)
/// carry their class name and have every declared field pre-populated, so
/// "the field exists" and "the field is declared" coincide. Plain records
/// (class `None`) are open: any field may be written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub(crate) class: Option<String>,
    pub(crate) fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty plain record.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Creates a classed record with pre-populated fields. Used by the
    /// class table; not part of the public surface for mutating state.
    pub(crate) fn classed(class: String, fields: BTreeMap<String, Value>) -> Self {
        Self {
            class: Some(class),
            fields,
        }
    }

    /// The class this record was instantiated from, if any.
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Reads a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub(crate) fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Writes a field. On classed records the field must be declared.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), SchemaError> {
        if let Some(class) = &self.class {
            if !self.fields.contains_key(field) {
                return Err(SchemaError::UndeclaredField {
                    class: class.clone(),
                    field: field.to_string(),
                });
            }
        }
        self.fields.insert(field.to_string(), value);
        Ok(())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
