//! The detyped value carried by every management request and response.
//!
//! `ModelValue` is the single interchange type of the management layer:
//! operation parameters, attribute values, results, and headers are all
//! expressed as `ModelValue` trees. Object keys are kept in a `BTreeMap` so
//! that rendering the same logical value always produces the same JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ModelError, Result};

/// A detyped management model value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModelValue {
    /// The undefined value. Absent attributes read as `Undefined`.
    Undefined,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer value.
    Int(i64),
    /// 64-bit floating point value.
    Double(f64),
    /// String value.
    Str(String),
    /// Raw byte value (deployment content, attachments).
    Bytes(Vec<u8>),
    /// Ordered list of values.
    List(Vec<ModelValue>),
    /// Keyed map of values with deterministic key order.
    Object(BTreeMap<String, ModelValue>),
}

impl ModelValue {
    /// Creates an empty object value.
    pub fn object() -> Self {
        ModelValue::Object(BTreeMap::new())
    }

    /// Creates an empty list value.
    pub fn list() -> Self {
        ModelValue::List(Vec::new())
    }

    /// Returns true unless this value is `Undefined`.
    pub fn is_defined(&self) -> bool {
        !matches!(self, ModelValue::Undefined)
    }

    /// Returns the boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ModelValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a `List`.
    pub fn as_list(&self) -> Option<&[ModelValue]> {
        match self {
            ModelValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the object payload, if this is an `Object`.
    pub fn as_object(&self) -> Option<&BTreeMap<String, ModelValue>> {
        match self {
            ModelValue::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the byte payload, if this is `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ModelValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Looks up a key on an object value. Any other variant yields `None`.
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        match self {
            ModelValue::Object(m) => m.get(key),
            _ => None,
        }
    }

    /// Mutable lookup on an object value.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ModelValue> {
        match self {
            ModelValue::Object(m) => m.get_mut(key),
            _ => None,
        }
    }

    /// Returns the object entry under `key`, inserting an empty object when
    /// absent. Converts `Undefined` into an object first; fails on any
    /// other non-object variant.
    pub fn entry_object(&mut self, key: &str) -> Result<&mut ModelValue> {
        if matches!(self, ModelValue::Undefined) {
            *self = ModelValue::object();
        }
        match self {
            ModelValue::Object(m) => Ok(m
                .entry(key.to_string())
                .or_insert_with(ModelValue::object)),
            other => Err(ModelError::InvalidValue(format!(
                "cannot take entry {} on non-object value {:?}",
                key, other
            ))),
        }
    }

    /// Walks a sequence of object keys from this value.
    pub fn get_path(&self, path: &[&str]) -> Option<&ModelValue> {
        let mut current = self;
        for key in path {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// Inserts a key on an object value, converting `Undefined` into an
    /// object first. Returns an error when this value is a non-object.
    pub fn set(&mut self, key: &str, value: ModelValue) -> Result<()> {
        if matches!(self, ModelValue::Undefined) {
            *self = ModelValue::object();
        }
        match self {
            ModelValue::Object(m) => {
                m.insert(key.to_string(), value);
                Ok(())
            }
            other => Err(ModelError::InvalidValue(format!(
                "cannot set key {} on non-object value {:?}",
                key, other
            ))),
        }
    }

    /// Appends to a list value, converting `Undefined` into a list first.
    pub fn push(&mut self, value: ModelValue) -> Result<()> {
        if matches!(self, ModelValue::Undefined) {
            *self = ModelValue::list();
        }
        match self {
            ModelValue::List(l) => {
                l.push(value);
                Ok(())
            }
            other => Err(ModelError::InvalidValue(format!(
                "cannot push onto non-list value {:?}",
                other
            ))),
        }
    }

    /// Renders this value as a `serde_json::Value`. Bytes become lists of
    /// integers, matching the JSON audit encoding.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ModelValue::Undefined => serde_json::Value::Null,
            ModelValue::Bool(b) => serde_json::Value::Bool(*b),
            ModelValue::Int(i) => serde_json::Value::from(*i),
            ModelValue::Double(d) => {
                serde_json::Number::from_f64(*d).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            ModelValue::Str(s) => serde_json::Value::String(s.clone()),
            ModelValue::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|x| serde_json::Value::from(*x)).collect())
            }
            ModelValue::List(l) => serde_json::Value::Array(l.iter().map(ModelValue::to_json).collect()),
            ModelValue::Object(m) => {
                let mut map = serde_json::Map::new();
                for (k, v) in m {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }

    /// Builds a value from a `serde_json::Value`.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => ModelValue::Undefined,
            serde_json::Value::Bool(b) => ModelValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ModelValue::Int(i)
                } else {
                    ModelValue::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => ModelValue::Str(s.clone()),
            serde_json::Value::Array(a) => {
                ModelValue::List(a.iter().map(ModelValue::from_json).collect())
            }
            serde_json::Value::Object(m) => {
                let mut map = BTreeMap::new();
                for (k, v) in m {
                    map.insert(k.clone(), ModelValue::from_json(v));
                }
                ModelValue::Object(map)
            }
        }
    }
}

impl Default for ModelValue {
    fn default() -> Self {
        ModelValue::Undefined
    }
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for ModelValue {
    fn from(b: bool) -> Self {
        ModelValue::Bool(b)
    }
}

impl From<i64> for ModelValue {
    fn from(i: i64) -> Self {
        ModelValue::Int(i)
    }
}

impl From<i32> for ModelValue {
    fn from(i: i32) -> Self {
        ModelValue::Int(i as i64)
    }
}

impl From<f64> for ModelValue {
    fn from(d: f64) -> Self {
        ModelValue::Double(d)
    }
}

impl From<&str> for ModelValue {
    fn from(s: &str) -> Self {
        ModelValue::Str(s.to_string())
    }
}

impl From<String> for ModelValue {
    fn from(s: String) -> Self {
        ModelValue::Str(s)
    }
}

impl From<Vec<ModelValue>> for ModelValue {
    fn from(l: Vec<ModelValue>) -> Self {
        ModelValue::List(l)
    }
}
