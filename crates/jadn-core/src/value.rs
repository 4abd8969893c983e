//! # Canonical In-Memory Value
//!
//! The application-side representation of an instance, independent of any
//! wire style. The validator checks `Value`s and the codecs convert between
//! `Value` and their wire form.
//!
//! Mapping per base kind:
//!
//! | Kind | Value |
//! |------|-------|
//! | Binary | `Binary` |
//! | Boolean | `Bool` |
//! | Integer | `Integer` |
//! | Number | `Number` |
//! | String | `String` |
//! | Enumerated | `String` label, or `Integer` id under `=` |
//! | Choice | single-entry `Map` keyed by member name |
//! | Array | `Array` by position, `Null` in absent optional slots |
//! | Map, Record | `Map` keyed by field name, absent fields omitted |
//! | ArrayOf | `Array` |
//! | MapOf | `Map`, or `Array` of `[key, value]` pairs for non-string keys |

use std::collections::BTreeMap;

/// An instance value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent slot in an Array instance.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Number.
    Number(f64),
    /// String or Enumerated label.
    String(String),
    /// Binary octets.
    Binary(Vec<u8>),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a `Map` from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Whether this is the `Null` placeholder.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String contents, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents, if this is an `Integer`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Sequence contents, if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mapping contents, if this is a `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Schema-agnostic conversion from a JSON tree.
///
/// Whole JSON numbers that fit in `i64` become `Integer`, other numbers
/// `Number`. JSON has no binary type, so `Binary` is never produced here.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(a) => Self::Array(a.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(o) => {
                Self::Map(o.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_distinguishes_integer_and_number() {
        assert_eq!(Value::from(json!(3)), Value::Integer(3));
        assert_eq!(Value::from(json!(3.5)), Value::Number(3.5));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Number(u64::MAX as f64));
    }

    #[test]
    fn from_json_nested() {
        let v = Value::from(json!({"name": "Bob", "tags": ["a", null]}));
        let expected = Value::map([
            ("name", Value::from("Bob")),
            ("tags", Value::Array(vec![Value::from("a"), Value::Null])),
        ]);
        assert_eq!(v, expected);
    }

    #[test]
    fn accessors() {
        let v = Value::map([("a", Value::Integer(1))]);
        assert_eq!(v.kind_name(), "map");
        assert_eq!(v.as_map().and_then(|m| m.get("a")).and_then(Value::as_i64), Some(1));
        assert!(v.as_array().is_none());
        assert!(Value::default().is_null());
        assert_eq!(Value::from("x").as_str(), Some("x"));
    }
}
