//! Tracking configuration
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults (`./mlruns`, experiment `Default`)
//! 2. `rastreo.toml` in the working directory, or the file named by
//!    `RASTREO_CONFIG`
//! 3. `RASTREO_TRACKING_DIR` / `RASTREO_EXPERIMENT_NAME`
//! 4. command-line flags, applied by the binaries
//!
//! ```toml
//! tracking_dir = "/var/lib/rastreo"
//! default_experiment = "lasso"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::experiment::FileTrackingStore;
use crate::{Error, Result};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "rastreo.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RASTREO_CONFIG";
/// Environment override for the tracking directory.
pub const TRACKING_DIR_ENV: &str = "RASTREO_TRACKING_DIR";
/// Environment override for the default experiment name.
pub const EXPERIMENT_ENV: &str = "RASTREO_EXPERIMENT_NAME";

/// Where runs are recorded and which experiment to use by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    /// Root directory of the file tracking store
    pub tracking_dir: PathBuf,
    /// Experiment used when none is given on the command line
    pub default_experiment: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_dir: PathBuf::from("mlruns"),
            default_experiment: "Default".to_string(),
        }
    }
}

impl TrackingConfig {
    /// Load from the working directory and the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError` if a config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."), |key| std::env::var(key).ok())
    }

    /// Load with an explicit base directory and environment lookup.
    ///
    /// A file named by `RASTREO_CONFIG` must exist; `rastreo.toml` in `dir`
    /// is optional.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the selected config file cannot be read or parsed.
    pub fn load_from<F>(dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = lookup(CONFIG_ENV).filter(|v| !v.is_empty());
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = dir.join(CONFIG_FILE);
                if local.is_file() {
                    Self::from_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.apply_env(lookup))
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&contents).map_err(|e| {
            Error::ConfigError(format!("{}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// `ConfigError` for malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Apply environment overrides. Empty values are ignored.
    #[must_use]
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(TRACKING_DIR_ENV).filter(|v| !v.is_empty()) {
            self.tracking_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(EXPERIMENT_ENV).filter(|v| !v.trim().is_empty()) {
            self.default_experiment = name;
        }
        self
    }

    /// Override the tracking directory.
    #[must_use]
    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = dir.into();
        self
    }

    /// Override the default experiment.
    #[must_use]
    pub fn with_default_experiment(mut self, name: impl Into<String>) -> Self {
        self.default_experiment = name.into();
        self
    }

    /// File store rooted at the tracking directory.
    #[must_use]
    pub fn open_store(&self) -> FileTrackingStore {
        FileTrackingStore::new(&self.tracking_dir)
    }
}
