//! Resource addressing for the management model tree.
//!
//! An address is an ordered sequence of `key=value` segments, e.g.
//! `/host=primary/server=web-1`. A segment value may be the wildcard `*`,
//! which matches every child of that key when the address is resolved
//! against a tree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, Result};
use crate::value::ModelValue;

/// The wildcard segment value.
pub const WILDCARD: &str = "*";

/// One `key=value` segment of a resource address.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathElement {
    key: String,
    value: String,
}

impl PathElement {
    /// Creates a concrete segment.
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Creates a wildcard segment matching every child of `key`.
    pub fn wildcard(key: &str) -> Self {
        Self::new(key, WILDCARD)
    }

    /// Returns the segment key (the child type).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the segment value (the child name, or `*`).
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true if this segment is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }

    /// Returns true if this segment matches the given concrete segment.
    pub fn matches(&self, concrete: &PathElement) -> bool {
        self.key == concrete.key && (self.is_wildcard() || self.value == concrete.value)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// An ordered resource address. The empty address is the domain root.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PathAddress {
    elements: Vec<PathElement>,
}

impl PathAddress {
    /// The domain root address.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds an address from segments.
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Parses an address from its string form, e.g. `/host=primary/server=web-1`.
    /// `/` and the empty string parse to the root address.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('/').trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut elements = Vec::new();
        for segment in trimmed.split('/') {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ModelError::InvalidAddress(format!("segment {segment:?} in {s:?}")))?;
            if key.is_empty() || value.is_empty() {
                return Err(ModelError::InvalidAddress(format!("segment {segment:?} in {s:?}")));
            }
            elements.push(PathElement::new(key, value));
        }
        Ok(Self { elements })
    }

    /// Builds an address from its wire form: a list of single-entry objects.
    pub fn from_value(value: &ModelValue) -> Result<Self> {
        let list = match value {
            ModelValue::Undefined => return Ok(Self::root()),
            ModelValue::List(l) => l,
            other => {
                return Err(ModelError::InvalidAddress(format!(
                    "address must be a list, got {other:?}"
                )))
            }
        };
        let mut elements = Vec::new();
        for entry in list {
            let obj = entry.as_object().ok_or_else(|| {
                ModelError::InvalidAddress(format!("address entry must be an object, got {entry:?}"))
            })?;
            if obj.len() != 1 {
                return Err(ModelError::InvalidAddress(format!(
                    "address entry must hold exactly one key, got {}",
                    obj.len()
                )));
            }
            let (key, value) = obj.iter().next().unwrap();
            let name = value.as_str().ok_or_else(|| {
                ModelError::InvalidAddress(format!("address value for {key} must be a string"))
            })?;
            elements.push(PathElement::new(key, name));
        }
        Ok(Self { elements })
    }

    /// Renders the wire form of this address.
    pub fn to_value(&self) -> ModelValue {
        let entries = self
            .elements
            .iter()
            .map(|e| {
                let mut obj = ModelValue::object();
                obj.set(e.key(), ModelValue::Str(e.value().to_string()))
                    .expect("fresh object accepts set");
                obj
            })
            .collect();
        ModelValue::List(entries)
    }

    /// Returns the segments of this address.
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true for the domain root address.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the last segment, if any.
    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Returns the parent address. The root is its own parent.
    pub fn parent(&self) -> PathAddress {
        if self.elements.is_empty() {
            return Self::root();
        }
        Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        }
    }

    /// Returns this address extended by one concrete segment.
    pub fn child(&self, key: &str, value: &str) -> PathAddress {
        let mut elements = self.elements.clone();
        elements.push(PathElement::new(key, value));
        Self { elements }
    }

    /// Returns this address with `other` appended.
    pub fn append(&self, other: &PathAddress) -> PathAddress {
        let mut elements = self.elements.clone();
        elements.extend(other.elements.iter().cloned());
        Self { elements }
    }

    /// Returns true if any segment is a wildcard.
    pub fn is_multi_target(&self) -> bool {
        self.elements.iter().any(PathElement::is_wildcard)
    }

    /// Returns true if this address starts with `prefix` (wildcards in
    /// `prefix` match any concrete value).
    pub fn starts_with(&self, prefix: &PathAddress) -> bool {
        if prefix.len() > self.len() {
            return false;
        }
        prefix
            .elements
            .iter()
            .zip(&self.elements)
            .all(|(p, c)| p.matches(c))
    }

    /// Returns the value of the first segment with the given key, if present.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.key() == key)
            .map(PathElement::value)
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "/");
        }
        for element in &self.elements {
            write!(f, "/{}", element)?;
        }
        Ok(())
    }
}
