//! Keys, records and key-path evaluation.
//!
//! Records are arbitrary structured values (`serde_json::Value`). Every stored
//! record is addressed by a [`Key`], which is either taken from the record via
//! the table's key path or assigned by the table's key generator.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

pub use serde_json::Value;

/// A primary or index key.
///
/// Keys are totally ordered: all integers sort before all strings, and each
/// variant uses its natural order. This is the order cursors visit records in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Integer(i64),
    String(String),
}

impl Key {
    /// Converts a JSON value into a key.
    ///
    /// Only integral numbers and strings are valid keys.
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        match value {
            Value::Number(n) => n.as_i64().map(Key::Integer).ok_or_else(|| EngineError::Data(format!("{n} is not a valid key"))),
            Value::String(s) => Ok(Key::String(s.clone())),
            other => Err(EngineError::Data(format!("{other} is not a valid key"))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Integer(i) => Value::from(*i),
            Key::String(s) => Value::from(s.as_str()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Key::Integer(i) => Some(*i),
            Key::String(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(i) => write!(f, "{i}"),
            Key::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self { Key::Integer(value) }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self { Key::Integer(value.into()) }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self { Key::String(value.to_owned()) }
}

impl From<String> for Key {
    fn from(value: String) -> Self { Key::String(value) }
}

/// A stored record together with its primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    pub fn new(key: Key, value: Value) -> Self { Self { key, value } }

    /// Looks up a (possibly dotted) attribute path in the record value.
    pub fn get(&self, path: &str) -> Option<&Value> { resolve_path(&self.value, path) }

    /// Deserializes the record value into a typed model.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> { T::deserialize(&self.value) }

    pub fn into_value(self) -> Value { self.value }
}

/// Resolves a dotted attribute path such as `"address.city"` against a value.
///
/// An empty path resolves to the value itself.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Evaluates a key path against a record, producing the key it denotes.
///
/// Returns `Ok(None)` when the path is absent from the record.
pub fn extract_key(value: &Value, path: &str) -> Result<Option<Key>, EngineError> {
    match resolve_path(value, path) {
        None => Ok(None),
        Some(found) => Key::from_value(found).map(Some),
    }
}
