//! The hierarchical resource store backing one management process.
//!
//! Every process (domain controller, host controller, managed server) holds
//! its own `ResourceTree`. The tree is a single-writer structure; the
//! operation executor serializes writes, readers clone values out.

use std::collections::BTreeMap;

use crate::address::{PathAddress, PathElement};
use crate::error::{ModelError, Result};
use crate::value::ModelValue;

/// One resource node: an attribute map plus child-type buckets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    attributes: BTreeMap<String, ModelValue>,
    children: BTreeMap<String, BTreeMap<String, Resource>>,
}

impl Resource {
    /// Creates an empty resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resource from an attribute map.
    pub fn with_attributes(attributes: BTreeMap<String, ModelValue>) -> Self {
        Self {
            attributes,
            children: BTreeMap::new(),
        }
    }

    /// Returns the attribute map.
    pub fn attributes(&self) -> &BTreeMap<String, ModelValue> {
        &self.attributes
    }

    /// Reads one attribute. Missing attributes read as `Undefined`.
    pub fn attribute(&self, name: &str) -> ModelValue {
        self.attributes.get(name).cloned().unwrap_or(ModelValue::Undefined)
    }

    /// Returns true if the resource has any children at all.
    pub fn has_children(&self) -> bool {
        self.children.values().any(|bucket| !bucket.is_empty())
    }

    /// Returns the sorted child type names with at least one child.
    pub fn child_types(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Returns the sorted child names under one type.
    pub fn child_names(&self, child_type: &str) -> Vec<String> {
        self.children
            .get(child_type)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the child resource of one type and name, if present.
    pub fn get_child(&self, child_type: &str, name: &str) -> Option<&Resource> {
        self.children.get(child_type)?.get(name)
    }

    fn child(&self, element: &PathElement) -> Option<&Resource> {
        self.children.get(element.key())?.get(element.value())
    }

    fn child_mut(&mut self, element: &PathElement) -> Option<&mut Resource> {
        self.children.get_mut(element.key())?.get_mut(element.value())
    }

    /// Renders this resource as a model value. Attributes become object
    /// entries; with `recursive`, child buckets nest as objects, otherwise
    /// child types appear with their name lists.
    pub fn to_value(&self, recursive: bool) -> ModelValue {
        let mut obj = ModelValue::object();
        for (name, value) in &self.attributes {
            obj.set(name, value.clone()).expect("fresh object accepts set");
        }
        for (child_type, bucket) in &self.children {
            if bucket.is_empty() {
                continue;
            }
            let mut type_node = ModelValue::object();
            for (name, child) in bucket {
                let rendered = if recursive {
                    child.to_value(true)
                } else {
                    ModelValue::Undefined
                };
                type_node.set(name, rendered).expect("fresh object accepts set");
            }
            obj.set(child_type, type_node).expect("fresh object accepts set");
        }
        obj
    }
}

/// A process-local management model tree addressed by `PathAddress`.
#[derive(Clone, Debug, Default)]
pub struct ResourceTree {
    root: Resource,
}

impl ResourceTree {
    /// Creates an empty tree holding only the root resource.
    pub fn new() -> Self {
        Self::default()
    }

    fn navigate(&self, address: &PathAddress) -> Option<&Resource> {
        let mut current = &self.root;
        for element in address.elements() {
            current = current.child(element)?;
        }
        Some(current)
    }

    fn navigate_mut(&mut self, address: &PathAddress) -> Option<&mut Resource> {
        let mut current = &mut self.root;
        for element in address.elements() {
            current = current.child_mut(element)?;
        }
        Some(current)
    }

    /// Returns true if a concrete resource exists at `address`.
    pub fn exists(&self, address: &PathAddress) -> bool {
        self.navigate(address).is_some()
    }

    /// Reads the resource at `address`.
    pub fn read(&self, address: &PathAddress) -> Result<&Resource> {
        self.navigate(address)
            .ok_or_else(|| ModelError::ResourceNotFound(address.to_string()))
    }

    /// Creates a resource at a concrete `address` with the given attributes.
    pub fn create(
        &mut self,
        address: &PathAddress,
        attributes: BTreeMap<String, ModelValue>,
    ) -> Result<()> {
        let last = address
            .last()
            .ok_or_else(|| ModelError::InvalidAddress("cannot create the root resource".into()))?
            .clone();
        if last.is_wildcard() {
            return Err(ModelError::InvalidAddress(format!(
                "cannot create at wildcard address {address}"
            )));
        }
        let parent_addr = address.parent();
        let parent = self
            .navigate_mut(&parent_addr)
            .ok_or_else(|| ModelError::ParentNotFound(address.to_string()))?;
        let bucket = parent.children.entry(last.key().to_string()).or_default();
        if bucket.contains_key(last.value()) {
            return Err(ModelError::ResourceExists(address.to_string()));
        }
        bucket.insert(last.value().to_string(), Resource::with_attributes(attributes));
        tracing::debug!(address = %address, "created resource");
        Ok(())
    }

    /// Removes the resource at `address`. Children must be removed first.
    pub fn remove(&mut self, address: &PathAddress) -> Result<Resource> {
        let last = address
            .last()
            .ok_or_else(|| ModelError::InvalidAddress("cannot remove the root resource".into()))?
            .clone();
        let parent_addr = address.parent();
        let existing = self
            .navigate(address)
            .ok_or_else(|| ModelError::ResourceNotFound(address.to_string()))?;
        if existing.has_children() {
            return Err(ModelError::HasChildren(address.to_string()));
        }
        let parent = self
            .navigate_mut(&parent_addr)
            .ok_or_else(|| ModelError::ResourceNotFound(address.to_string()))?;
        let removed = parent
            .children
            .get_mut(last.key())
            .and_then(|bucket| bucket.remove(last.value()))
            .ok_or_else(|| ModelError::ResourceNotFound(address.to_string()))?;
        tracing::debug!(address = %address, "removed resource");
        Ok(removed)
    }

    /// Writes one attribute on an existing resource.
    pub fn write_attribute(
        &mut self,
        address: &PathAddress,
        name: &str,
        value: ModelValue,
    ) -> Result<ModelValue> {
        let resource = self
            .navigate_mut(address)
            .ok_or_else(|| ModelError::ResourceNotFound(address.to_string()))?;
        let previous = resource.attribute(name);
        resource.attributes.insert(name.to_string(), value);
        Ok(previous)
    }

    /// Reads one attribute. Missing attributes read as `Undefined`.
    pub fn read_attribute(&self, address: &PathAddress, name: &str) -> Result<ModelValue> {
        Ok(self.read(address)?.attribute(name))
    }

    /// Removes one attribute, returning its previous value.
    pub fn undefine_attribute(&mut self, address: &PathAddress, name: &str) -> Result<ModelValue> {
        let resource = self
            .navigate_mut(address)
            .ok_or_else(|| ModelError::ResourceNotFound(address.to_string()))?;
        match resource.attributes.remove(name) {
            Some(previous) => Ok(previous),
            None => Err(ModelError::AttributeNotFound {
                address: address.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Returns sorted child names under `address` for one child type.
    pub fn children_names(&self, address: &PathAddress, child_type: &str) -> Result<Vec<String>> {
        Ok(self.read(address)?.child_names(child_type))
    }

    /// Returns sorted child type names under `address`.
    pub fn children_types(&self, address: &PathAddress) -> Result<Vec<String>> {
        Ok(self.read(address)?.child_types())
    }

    /// Expands a (possibly wildcard) address into every matching concrete
    /// address, in sorted order. A pattern with zero matches yields an empty
    /// vector, not an error.
    pub fn resolve(&self, pattern: &PathAddress) -> Vec<PathAddress> {
        let mut matches = Vec::new();
        Self::resolve_from(&self.root, PathAddress::root(), pattern.elements(), &mut matches);
        matches
    }

    fn resolve_from(
        resource: &Resource,
        prefix: PathAddress,
        remaining: &[PathElement],
        out: &mut Vec<PathAddress>,
    ) {
        let Some((element, rest)) = remaining.split_first() else {
            out.push(prefix);
            return;
        };
        if element.is_wildcard() {
            if let Some(bucket) = resource.children.get(element.key()) {
                for (name, child) in bucket {
                    let next = prefix.child(element.key(), name);
                    Self::resolve_from(child, next, rest, out);
                }
            }
        } else if let Some(child) = resource.child(element) {
            let next = prefix.child(element.key(), element.value());
            Self::resolve_from(child, next, rest, out);
        }
    }

    /// Renders the whole tree as one model value.
    pub fn to_value(&self) -> ModelValue {
        self.root.to_value(true)
    }
}
