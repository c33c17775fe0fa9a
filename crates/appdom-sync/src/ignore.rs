//! Per-host ignored resource type policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// The resource type that can never be ignored.
pub const HOST_TYPE: &str = "host";

/// Errors raised by visibility policy changes.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("resource type host cannot be ignored")]
    CannotIgnoreHost,

    #[error("unknown host {0}")]
    UnknownHost(String),
}

/// Which domain resource types a secondary host leaves out of its local
/// model, plus the ignore-unused-configuration switch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredResourcePolicy {
    ignored_types: BTreeSet<String>,
    ignore_unused_configuration: bool,
}

impl IgnoredResourcePolicy {
    /// Creates an empty policy (everything visible).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource type to the ignore list. Rejects `host` before any
    /// state change.
    pub fn add_ignored(&mut self, resource_type: &str) -> Result<(), SyncError> {
        if resource_type == HOST_TYPE {
            return Err(SyncError::CannotIgnoreHost);
        }
        self.ignored_types.insert(resource_type.to_string());
        Ok(())
    }

    /// Removes a resource type from the ignore list. Returns true if it was
    /// present.
    pub fn remove_ignored(&mut self, resource_type: &str) -> bool {
        self.ignored_types.remove(resource_type)
    }

    /// Returns true if the type is ignored.
    pub fn is_ignored(&self, resource_type: &str) -> bool {
        self.ignored_types.contains(resource_type)
    }

    /// Returns the ignored types, sorted.
    pub fn ignored_types(&self) -> Vec<String> {
        self.ignored_types.iter().cloned().collect()
    }

    /// Toggles ignore-unused-configuration.
    pub fn set_ignore_unused(&mut self, ignore: bool) {
        self.ignore_unused_configuration = ignore;
    }

    /// Returns the ignore-unused-configuration switch.
    pub fn ignore_unused(&self) -> bool {
        self.ignore_unused_configuration
    }
}
