//! Domain model snapshots.
//!
//! A snapshot is the whole domain model rendered as canonical JSON in
//! `<domain-dir>/snapshot/<timestamp>-<n>.json`. Names are enumerable via
//! `list`, which backs the `list-snapshots` operation.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use appdom_model::ModelValue;

/// Errors raised by snapshot management.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot {0} not found")]
    NotFound(String),

    #[error("serialize error: {0}")]
    Serialize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Takes, lists, and deletes model snapshots in one directory.
pub struct SnapshotManager {
    dir: PathBuf,
    counter: AtomicU64,
}

impl SnapshotManager {
    /// Creates a manager over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serializes `model` into a new snapshot and returns its name.
    pub fn take(&self, model: &ModelValue) -> Result<String, SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{}.json", Utc::now().format("%Y%m%d-%H%M%S"), n);
        let json = serde_json::to_string_pretty(&model.to_json())
            .map_err(|e| SnapshotError::Serialize(e.to_string()))?;
        fs::write(self.dir.join(&name), json)?;
        tracing::info!(snapshot = name.as_str(), "took model snapshot");
        Ok(name)
    }

    /// Lists snapshot names, sorted.
    pub fn list(&self) -> Result<Vec<String>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads one snapshot back into a model value.
    pub fn read(&self, name: &str) -> Result<ModelValue, SnapshotError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(SnapshotError::NotFound(name.to_string()));
        }
        let contents = fs::read_to_string(path)?;
        let json: serde_json::Value =
            serde_json::from_str(&contents).map_err(|e| SnapshotError::Serialize(e.to_string()))?;
        Ok(ModelValue::from_json(&json))
    }

    /// Deletes one snapshot. Returns true when it existed.
    pub fn delete(&self, name: &str) -> Result<bool, SnapshotError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    /// Deletes every snapshot, returning how many were removed.
    pub fn delete_all(&self) -> Result<usize, SnapshotError> {
        let names = self.list()?;
        for name in &names {
            self.delete(name)?;
        }
        Ok(names.len())
    }
}
