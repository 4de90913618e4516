//! Artifact Record - content-addressed outputs of a run

use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Artifact Record represents a stored artifact from a run.
///
/// `key` is the artifact path relative to the run's artifact root
/// (e.g. `lasso_model/model.json`). `cas_hash` has the form
/// `sha256:<hex_digest>` and is checked again when the artifact is read back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Create a record describing `content`, hashing it on the way.
    #[must_use]
    pub fn for_content(run_id: impl Into<String>, key: impl Into<String>, content: &[u8]) -> Self {
        Self::new(run_id, key, content_hash(content), content.len() as u64)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact path.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check `content` against the recorded hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on a size or digest mismatch.
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        let actual = content_hash(content);
        if content.len() as u64 != self.size_bytes || actual != self.cas_hash {
            return Err(Error::StorageError(format!(
                "Artifact '{}' of run {} is corrupt: expected {} ({} bytes), found {} ({} bytes)",
                self.key,
                self.run_id,
                self.cas_hash,
                self.size_bytes,
                actual,
                content.len()
            )));
        }
        Ok(())
    }
}

/// `sha256:<hex>` digest of `content`.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{:x}", hasher.finalize())
}

/// Validate an artifact path: relative, non-empty, no `..` or root components.
///
/// Returns the path normalised to forward slashes.
///
/// # Errors
///
/// Returns `InvalidInput` for paths that would escape the artifact root.
pub fn normalize_artifact_path(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("artifact path must not be empty".to_string()));
    }
    if path.starts_with('/') {
        return Err(Error::InvalidInput(format!(
            "artifact path must be relative: {path}"
        )));
    }

    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidInput(format!(
                    "artifact path must stay inside the run: {path}"
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(Error::InvalidInput("artifact path must not be empty".to_string()));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_record_for_content() {
        let artifact = ArtifactRecord::for_content("run-1", "lasso_model/model.json", b"{}");
        assert_eq!(artifact.run_id(), "run-1");
        assert_eq!(artifact.key(), "lasso_model/model.json");
        assert_eq!(artifact.size_bytes(), 2);
        assert!(artifact.cas_hash().starts_with("sha256:"));
        assert_eq!(artifact.cas_hash().len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_content_hash_empty_input() {
        assert_eq!(
            content_hash(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_detects_tampering() {
        let artifact = ArtifactRecord::for_content("run-1", "model.json", b"coef=3.0");
        assert!(artifact.verify(b"coef=3.0").is_ok());

        let err = artifact.verify(b"coef=9.0").unwrap_err();
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_normalize_artifact_path() {
        assert_eq!(normalize_artifact_path("lasso_model").unwrap(), "lasso_model");
        assert_eq!(
            normalize_artifact_path("lasso_model/./model.json/").unwrap(),
            "lasso_model/model.json"
        );
        assert!(normalize_artifact_path("").is_err());
        assert!(normalize_artifact_path("/etc/passwd").is_err());
        assert!(normalize_artifact_path("../outside").is_err());
        assert!(normalize_artifact_path("a/../../b").is_err());
    }
}
