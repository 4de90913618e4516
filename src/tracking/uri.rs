//! `runs:/{run_id}/{artifact_path}` artifact URIs

use std::fmt;
use std::str::FromStr;

use crate::experiment::normalize_artifact_path;
use crate::{Error, Result};

const SCHEME: &str = "runs:/";

/// Reference to an artifact (file or directory) logged by a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactUri {
    run_id: String,
    artifact_path: String,
}

impl ArtifactUri {
    /// Build a URI, normalising the artifact path.
    ///
    /// # Errors
    ///
    /// `InvalidArtifactUri` for an empty run id or a path that is empty,
    /// absolute, or escapes the run's artifact root.
    pub fn new(run_id: impl Into<String>, artifact_path: &str) -> Result<Self> {
        let run_id = run_id.into();
        if run_id.is_empty() || run_id.contains('/') {
            return Err(Error::InvalidArtifactUri(format!(
                "bad run id '{run_id}'"
            )));
        }
        let artifact_path = normalize_artifact_path(artifact_path)
            .map_err(|e| Error::InvalidArtifactUri(e.to_string()))?;
        Ok(Self {
            run_id,
            artifact_path,
        })
    }

    /// Run that owns the artifact.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path relative to the run's artifact root.
    #[must_use]
    pub fn artifact_path(&self) -> &str {
        &self.artifact_path
    }

    /// URI of `child` inside this artifact directory.
    ///
    /// # Errors
    ///
    /// `InvalidArtifactUri` if `child` is not a safe relative path.
    pub fn join(&self, child: &str) -> Result<Self> {
        Self::new(
            self.run_id.clone(),
            &format!("{}/{child}", self.artifact_path),
        )
    }
}

impl FromStr for ArtifactUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidArtifactUri(s.to_string()))?;
        let (run_id, path) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidArtifactUri(s.to_string()))?;
        if run_id.is_empty() || path.is_empty() {
            return Err(Error::InvalidArtifactUri(s.to_string()));
        }
        Self::new(run_id, path)
    }
}

impl fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.run_id, self.artifact_path)
    }
}
