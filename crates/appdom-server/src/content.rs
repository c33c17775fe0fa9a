//! The deployment content repository.
//!
//! Content is addressed by its SHA-1 hash and laid out as
//! `<repo>/<hash[0..2]>/<hash[2..]>/content`. Adding the same bytes twice
//! lands on the same path, so the store is idempotent by construction.

use sha1::{Digest, Sha1};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the content repository.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content {0} not found")]
    NotFound(String),

    #[error("invalid content hash {0}")]
    InvalidHash(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Content-addressed store for deployment bytes.
pub struct ContentRepository {
    root: PathBuf,
}

impl ContentRepository {
    /// Creates a repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the SHA-1 hex hash of `bytes`.
    pub fn hash_of(bytes: &[u8]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, hash: &str) -> Result<PathBuf, ContentError> {
        if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContentError::InvalidHash(hash.to_string()));
        }
        Ok(self.root.join(&hash[..2]).join(&hash[2..]).join("content"))
    }

    /// Stores `bytes` and returns their hash. Storing identical bytes again
    /// is a no-op returning the same hash.
    pub fn add(&self, bytes: &[u8]) -> Result<String, ContentError> {
        let hash = Self::hash_of(bytes);
        let path = self.path_for(&hash)?;
        if !path.exists() {
            let parent = path.parent().expect("content path has a parent");
            fs::create_dir_all(parent)?;
            fs::write(&path, bytes)?;
            tracing::debug!(hash = hash.as_str(), bytes = bytes.len(), "stored content");
        }
        Ok(hash)
    }

    /// Returns true when content with `hash` is stored.
    pub fn exists(&self, hash: &str) -> bool {
        self.path_for(hash).map(|p| p.exists()).unwrap_or(false)
    }

    /// Reads content by hash.
    pub fn read(&self, hash: &str) -> Result<Vec<u8>, ContentError> {
        let path = self.path_for(hash)?;
        if !path.exists() {
            return Err(ContentError::NotFound(hash.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Removes content by hash. Returns true when something was removed.
    pub fn remove(&self, hash: &str) -> Result<bool, ContentError> {
        let path = self.path_for(hash)?;
        if !path.exists() {
            return Ok(false);
        }
        let dir = path.parent().expect("content path has a parent");
        fs::remove_dir_all(dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> (tempfile::TempDir, ContentRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = ContentRepository::new(dir.path().join("content"));
        (dir, repo)
    }

    #[test]
    fn add_and_read_round_trip() {
        let (_dir, repo) = repo();
        let hash = repo.add(b"deployment bytes").unwrap();
        assert_eq!(hash.len(), 40);
        assert!(repo.exists(&hash));
        assert_eq!(repo.read(&hash).unwrap(), b"deployment bytes");
    }

    #[test]
    fn layout_splits_hash_after_two_chars() {
        let (_dir, repo) = repo();
        let hash = repo.add(b"x").unwrap();
        let expected = repo
            .root()
            .join(&hash[..2])
            .join(&hash[2..])
            .join("content");
        assert!(expected.exists());
    }

    #[test]
    fn identical_bytes_share_one_entry() {
        let (_dir, repo) = repo();
        let h1 = repo.add(b"same").unwrap();
        let h2 = repo.add(b"same").unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_bytes_have_different_hashes() {
        let (_dir, repo) = repo();
        let h1 = repo.add(b"one").unwrap();
        let h2 = repo.add(b"two").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_stable_across_no_op_additions() {
        let (_dir, repo) = repo();
        let before = ContentRepository::hash_of(b"payload");
        repo.add(b"payload").unwrap();
        repo.add(b"payload").unwrap();
        let after = ContentRepository::hash_of(&repo.read(&before).unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn read_missing_fails() {
        let (_dir, repo) = repo();
        let hash = ContentRepository::hash_of(b"never stored");
        assert!(matches!(repo.read(&hash), Err(ContentError::NotFound(_))));
    }

    #[test]
    fn invalid_hash_rejected() {
        let (_dir, repo) = repo();
        assert!(matches!(repo.read("zz"), Err(ContentError::InvalidHash(_))));
        assert!(!repo.exists("not-a-hash"));
    }

    #[test]
    fn remove_deletes_entry() {
        let (_dir, repo) = repo();
        let hash = repo.add(b"temp").unwrap();
        assert!(repo.remove(&hash).unwrap());
        assert!(!repo.exists(&hash));
        assert!(!repo.remove(&hash).unwrap());
    }
}
