#![warn(missing_docs)]

//! AppDom model subsystem: management model tree, addresses, values, resource descriptions

pub mod address;
pub mod description;
pub mod error;
pub mod tree;
pub mod value;

pub use address::{PathAddress, PathElement, WILDCARD};
pub use description::{AttributeDescription, DescriptionRegistry, ModelType, ResourceDescription};
pub use error::{ModelError, Result};
pub use tree::{Resource, ResourceTree};
pub use value::ModelValue;
