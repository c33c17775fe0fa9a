//! Static resource-type descriptions.
//!
//! Descriptions are metadata, not live state: they answer
//! `read-resource-description` without touching the addressed process, which
//! is what lets a stopped server still describe itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::address::PathAddress;
use crate::error::{ModelError, Result};
use crate::value::ModelValue;

/// The value type of a described attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    /// Boolean attribute.
    Bool,
    /// Integer attribute.
    Int,
    /// Floating point attribute.
    Double,
    /// String attribute.
    Str,
    /// Byte attribute.
    Bytes,
    /// List attribute.
    List,
    /// Object attribute.
    Object,
}

impl ModelType {
    fn as_str(self) -> &'static str {
        match self {
            ModelType::Bool => "BOOLEAN",
            ModelType::Int => "INT",
            ModelType::Double => "DOUBLE",
            ModelType::Str => "STRING",
            ModelType::Bytes => "BYTES",
            ModelType::List => "LIST",
            ModelType::Object => "OBJECT",
        }
    }
}

/// Description of one attribute of a resource type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeDescription {
    /// Attribute name.
    pub name: String,
    /// Attribute value type.
    pub value_type: ModelType,
    /// Whether the attribute must be supplied at add time.
    pub required: bool,
    /// Whether the attribute only exists on a running process.
    pub runtime_only: bool,
    /// Human-readable description.
    pub description: String,
}

impl AttributeDescription {
    /// Creates a persistent, optional attribute description.
    pub fn new(name: &str, value_type: ModelType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            required: false,
            runtime_only: false,
            description: description.to_string(),
        }
    }

    /// Marks the attribute required at add time.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the attribute runtime-only.
    pub fn runtime_only(mut self) -> Self {
        self.runtime_only = true;
        self
    }
}

/// Static description of a resource type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceDescription {
    /// Resource type name (the address key, e.g. `server-group`).
    pub resource_type: String,
    /// Human-readable description.
    pub description: String,
    /// Described attributes.
    pub attributes: Vec<AttributeDescription>,
    /// Child types this resource may hold.
    pub child_types: Vec<String>,
    /// Operation names this resource supports beyond the global set.
    pub operations: Vec<String>,
}

impl ResourceDescription {
    /// Creates a description with no attributes or children.
    pub fn new(resource_type: &str, description: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            description: description.to_string(),
            attributes: Vec::new(),
            child_types: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Adds an attribute description.
    pub fn attribute(mut self, attr: AttributeDescription) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Adds a child type.
    pub fn child_type(mut self, child_type: &str) -> Self {
        self.child_types.push(child_type.to_string());
        self
    }

    /// Adds a supported operation name.
    pub fn operation(mut self, name: &str) -> Self {
        self.operations.push(name.to_string());
        self
    }

    /// Renders the wire form served by `read-resource-description`.
    pub fn to_value(&self) -> ModelValue {
        let mut out = ModelValue::object();
        out.set("description", self.description.as_str().into())
            .expect("fresh object accepts set");
        let mut attrs = ModelValue::object();
        for attr in &self.attributes {
            let mut node = ModelValue::object();
            node.set("type", attr.value_type.as_str().into()).unwrap();
            node.set("required", attr.required.into()).unwrap();
            node.set("storage", if attr.runtime_only { "runtime" } else { "configuration" }.into())
                .unwrap();
            node.set("description", attr.description.as_str().into()).unwrap();
            attrs.set(&attr.name, node).unwrap();
        }
        out.set("attributes", attrs).unwrap();
        let mut children = ModelValue::list();
        for child in &self.child_types {
            children.push(child.as_str().into()).unwrap();
        }
        out.set("children", children).unwrap();
        out
    }
}

/// Registry of resource-type descriptions, keyed by type name.
///
/// The root resource is described under the reserved type name `domain`.
pub struct DescriptionRegistry {
    by_type: RwLock<HashMap<String, ResourceDescription>>,
}

/// Reserved type name describing the domain root.
pub const ROOT_TYPE: &str = "domain";

impl DescriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry pre-loaded with the core domain types.
    pub fn with_core_types() -> Self {
        let registry = Self::new();
        registry.register(
            ResourceDescription::new(ROOT_TYPE, "The root of the domain management model")
                .attribute(AttributeDescription::new("name", ModelType::Str, "Domain name"))
                .child_type("extension")
                .child_type("profile")
                .child_type("socket-binding-group")
                .child_type("server-group")
                .child_type("deployment")
                .child_type("system-property")
                .child_type("host"),
        );
        registry.register(
            ResourceDescription::new("profile", "A named set of subsystem configurations")
                .attribute(AttributeDescription::new("name", ModelType::Str, "Profile name"))
                .attribute(AttributeDescription::new("includes", ModelType::List, "Included profiles"))
                .child_type("subsystem"),
        );
        registry.register(
            ResourceDescription::new("subsystem", "One subsystem configuration inside a profile")
                .attribute(AttributeDescription::new("name", ModelType::Str, "Subsystem name")),
        );
        registry.register(
            ResourceDescription::new("server-group", "A set of servers sharing profile and deployments")
                .attribute(
                    AttributeDescription::new("profile", ModelType::Str, "Profile the group runs").required(),
                )
                .attribute(AttributeDescription::new(
                    "socket-binding-group",
                    ModelType::Str,
                    "Socket binding group the group uses",
                ))
                .child_type("deployment"),
        );
        registry.register(
            ResourceDescription::new("socket-binding-group", "Named socket binding configuration")
                .attribute(AttributeDescription::new("default-interface", ModelType::Str, "Default interface")),
        );
        registry.register(
            ResourceDescription::new("host", "One host controller and its servers")
                .attribute(AttributeDescription::new("name", ModelType::Str, "Host name"))
                .child_type("server-config")
                .child_type("server")
                .child_type("interface")
                .child_type("system-property"),
        );
        registry.register(
            ResourceDescription::new("server", "One managed server process")
                .attribute(AttributeDescription::new("name", ModelType::Str, "Server name"))
                .attribute(AttributeDescription::new("group", ModelType::Str, "Owning server group").required())
                .attribute(
                    AttributeDescription::new("server-state", ModelType::Str, "Process state").runtime_only(),
                )
                .operation("start")
                .operation("stop"),
        );
        registry.register(
            ResourceDescription::new("server-config", "Configuration for one managed server")
                .attribute(AttributeDescription::new("group", ModelType::Str, "Owning server group").required())
                .attribute(AttributeDescription::new("auto-start", ModelType::Bool, "Start with the host")),
        );
        registry.register(
            ResourceDescription::new("deployment", "Deployed application content")
                .attribute(AttributeDescription::new("runtime-name", ModelType::Str, "Runtime name"))
                .attribute(AttributeDescription::new("content", ModelType::Bytes, "Content hash").required())
                .attribute(AttributeDescription::new("enabled", ModelType::Bool, "Deployed to servers")),
        );
        registry.register(
            ResourceDescription::new("system-property", "A JVM system property")
                .attribute(AttributeDescription::new("value", ModelType::Str, "Property value")),
        );
        registry.register(
            ResourceDescription::new("extension", "A loadable management extension")
                .attribute(AttributeDescription::new("module", ModelType::Str, "Module identifier").required()),
        );
        registry.register(
            ResourceDescription::new("interface", "A named network interface")
                .attribute(AttributeDescription::new("inet-address", ModelType::Str, "Bind address")),
        );
        registry
    }

    /// Registers or replaces a description.
    pub fn register(&self, description: ResourceDescription) {
        let mut map = self.by_type.write().unwrap();
        map.insert(description.resource_type.clone(), description);
    }

    /// Returns the description for a type name.
    pub fn describe_type(&self, resource_type: &str) -> Result<ResourceDescription> {
        let map = self.by_type.read().unwrap();
        map.get(resource_type)
            .cloned()
            .ok_or_else(|| ModelError::NoDescription(resource_type.to_string()))
    }

    /// Returns the description for the type addressed by `address`
    /// (the last segment key; the root address describes `domain`).
    pub fn describe(&self, address: &PathAddress) -> Result<ResourceDescription> {
        let type_name = address.last().map_or(ROOT_TYPE, |e| e.key());
        self.describe_type(type_name)
    }

    /// Returns the registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let map = self.by_type.read().unwrap();
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for DescriptionRegistry {
    fn default() -> Self {
        Self::with_core_types()
    }
}
