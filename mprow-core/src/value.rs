//! The value universe carried over the wire
//!
//! The MessagePack codec does not serialize arbitrary host types. It works on
//! a closed, tagged union (`Value`) and picks an encoding by matching on the
//! tag. Conversion from host types happens at the boundary: `From` impls for
//! primitives and `serde_json::Value`, plus the `to_value` / `from_value`
//! serde bridge used by the typed client helpers.
//!
//! # Maps
//!
//! Maps preserve insertion order, which is what gets written to the wire.
//! Receivers must not depend on member order. Members whose value is absent
//! are never inserted in the first place, which is how the wire format elides
//! optional fields (a notification simply has no `id` member).

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Uninterpreted MessagePack extension payload.
///
/// Extension type -1 (0xFF) is the timestamp type and decodes to
/// [`Value::Date`]; every other extension type is carried through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ext {
    /// Extension type code.
    pub type_code: i8,
    /// Raw payload bytes.
    pub data: Vec<u8>,
}

/// A single wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// nil (0xC0)
    Nil,
    /// true / false
    Bool(bool),
    /// Integer, encoded at the narrowest width that holds it
    Int(i64),
    /// IEEE 754 double (also used for non-finite values)
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Raw byte array
    Bin(Vec<u8>),
    /// Ordered sequence
    Array(Vec<Value>),
    /// String-keyed mapping in insertion order
    Map(Vec<(String, Value)>),
    /// Time point, wire-encoded as extension type 0xFF
    Date(DateTime<Utc>),
    /// Foreign extension payload
    Ext(Ext),
}

impl Value {
    /// Human-readable tag name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bin(_) => "bin",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Date(_) => "date",
            Value::Ext(_) => "ext",
        }
    }

    /// True for `Value::Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Borrow as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a byte slice.
    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow as an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as map entries.
    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Borrow as a date.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Look up a map member by key. Returns `None` for non-map values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Lossy conversion to `serde_json::Value` for the typed API boundary.
    ///
    /// Binary data becomes an array of numbers, dates become RFC 3339
    /// strings, and non-finite floats become null (serde_json cannot
    /// represent them).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bin(bytes) => serde_json::Value::Array(
                bytes
                    .iter()
                    .map(|&b| serde_json::Value::Number(b.into()))
                    .collect(),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Ext(ext) => {
                let mut object = serde_json::Map::new();
                object.insert(
                    "type".to_string(),
                    serde_json::Value::Number(ext.type_code.into()),
                );
                object.insert(
                    "data".to_string(),
                    serde_json::Value::Array(
                        ext.data
                            .iter()
                            .map(|&b| serde_json::Value::Number(b.into()))
                            .collect(),
                    ),
                );
                serde_json::Value::Object(object)
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bin(bytes)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Vec<(String, Value)>> for Value {
    fn from(entries: Vec<(String, Value)>) -> Self {
        Value::Map(entries)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Nil,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    // u64 values past i64::MAX lose precision, matching the
                    // wire format's 2^53 number ceiling.
                    Value::Float(f)
                } else {
                    Value::Nil
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => Value::Map(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Convert any serializable host type into a wire value.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Convert a wire value back into a typed host value.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    serde_json::from_value(value.to_json()).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn map_lookup() {
        let value = Value::Map(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Str("x".into())),
        ]);
        assert_eq!(value.get("a"), Some(&Value::Int(1)));
        assert_eq!(value.get("b").and_then(Value::as_str), Some("x"));
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn from_json_preserves_structure() {
        let json = serde_json::json!({
            "name": "a",
            "count": 3,
            "ratio": 0.5,
            "tags": ["x", "y"],
            "missing": null,
        });
        let value = Value::from(json);
        assert_eq!(value.get("name").and_then(Value::as_str), Some("a"));
        assert_eq!(value.get("count").and_then(Value::as_i64), Some(3));
        assert_eq!(value.get("ratio").and_then(Value::as_f64), Some(0.5));
        assert_eq!(
            value.get("tags").and_then(Value::as_array).map(<[Value]>::len),
            Some(2)
        );
        assert!(value.get("missing").is_some_and(Value::is_nil));
    }

    #[test]
    fn huge_u64_widens_to_float() {
        let json = serde_json::json!(u64::MAX);
        assert!(matches!(Value::from(json), Value::Float(_)));
    }

    #[test]
    fn serde_bridge_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Login {
            user: String,
            attempts: u32,
        }
        let login = Login {
            user: "a".into(),
            attempts: 2,
        };
        let value = to_value(&login).unwrap();
        assert_eq!(value.get("user").and_then(Value::as_str), Some("a"));
        let back: Login = from_value(&value).unwrap();
        assert_eq!(back, login);
    }
}
