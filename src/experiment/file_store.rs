//! File-backed tracking store
//!
//! Layout under the tracking directory:
//!
//! ```text
//! <root>/
//!   <experiment_id>/
//!     meta.json                  ExperimentRecord
//!     <run_id>/
//!       meta.json                RunRecord
//!       metrics.jsonl            one MetricRecord per line, append-only
//!       artifacts.json           Vec<ArtifactRecord>
//!       artifacts/<path>         artifact content
//! ```
//!
//! The root directory is created on first write. A missing root reads as an
//! empty store.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::artifact_record::normalize_artifact_path;
use super::store::{
    artifact_not_found, check_experiment_name, check_metric_value, check_run_owner,
    compare_experiment_ids, run_not_found,
};
use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord, TrackingStore};
use crate::{Error, Result};

const META_FILE: &str = "meta.json";
const METRICS_FILE: &str = "metrics.jsonl";
const ARTIFACT_INDEX_FILE: &str = "artifacts.json";
const ARTIFACT_DIR: &str = "artifacts";

/// Tracking store persisted as JSON files in a directory.
///
/// # Example
///
/// ```no_run
/// use rastreo::experiment::{FileTrackingStore, TrackingStore};
///
/// let store = FileTrackingStore::new("./mlruns");
/// let experiments = store.list_experiments()?;
/// # Ok::<(), rastreo::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTrackingStore {
    root: PathBuf,
}

impl FileTrackingStore {
    /// Open (lazily) a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the tracking directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.root.join(experiment_id)
    }

    /// Directory names of all experiments that have a meta file.
    fn experiment_ids(&self) -> Result<Vec<String>> {
        Ok(subdirs_with_meta(&self.root)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn find_run_dir(&self, run_id: &str) -> Result<Option<PathBuf>> {
        if !is_safe_id(run_id) {
            return Ok(None);
        }
        for experiment_id in self.experiment_ids()? {
            let dir = self.experiment_dir(&experiment_id).join(run_id);
            if dir.join(META_FILE).is_file() {
                return Ok(Some(dir));
            }
        }
        Ok(None)
    }

    fn require_run_dir(&self, run_id: &str) -> Result<PathBuf> {
        self.find_run_dir(run_id)?
            .ok_or_else(|| run_not_found(run_id))
    }

    fn read_artifact_index(run_dir: &Path) -> Result<Vec<ArtifactRecord>> {
        let path = run_dir.join(ARTIFACT_INDEX_FILE);
        if path.is_file() {
            read_json(&path)
        } else {
            Ok(Vec::new())
        }
    }

    fn next_experiment_id(&self) -> Result<String> {
        let next = self
            .experiment_ids()?
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        Ok(next.to_string())
    }
}

impl TrackingStore for FileTrackingStore {
    fn create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        check_experiment_name(name)?;
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "Experiment '{name}' already exists"
            )));
        }

        let experiment = ExperimentRecord::new(self.next_experiment_id()?, name);
        let dir = self.experiment_dir(experiment.experiment_id());
        write_json(&dir.join(META_FILE), &experiment)?;
        debug!(
            experiment_id = experiment.experiment_id(),
            name,
            path = %dir.display(),
            "created experiment"
        );
        Ok(experiment)
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>> {
        if !is_safe_id(experiment_id) {
            return Ok(None);
        }
        let path = self.experiment_dir(experiment_id).join(META_FILE);
        if path.is_file() {
            read_json(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self
            .list_experiments()?
            .into_iter()
            .find(|e| e.name() == name))
    }

    fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut experiments = Vec::new();
        for (_, meta) in subdirs_with_meta(&self.root)? {
            experiments.push(read_json::<ExperimentRecord>(&meta)?);
        }
        experiments.sort_by(|a, b| compare_experiment_ids(a.experiment_id(), b.experiment_id()));
        Ok(experiments)
    }

    fn put_run(&self, run: &RunRecord) -> Result<()> {
        if !is_safe_id(run.run_id()) {
            return Err(Error::InvalidInput(format!(
                "run id '{}' cannot be used as a directory name",
                run.run_id()
            )));
        }
        if self.get_experiment(run.experiment_id())?.is_none() {
            return Err(Error::NotFound(format!(
                "Experiment with id '{}' not found",
                run.experiment_id()
            )));
        }
        check_run_owner(self.get_run(run.run_id())?.as_ref(), run)?;
        let path = self
            .experiment_dir(run.experiment_id())
            .join(run.run_id())
            .join(META_FILE);
        write_json(&path, run)?;
        debug!(run_id = run.run_id(), status = %run.status(), "saved run");
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        match self.find_run_dir(run_id)? {
            Some(dir) => read_json(&dir.join(META_FILE)).map(Some),
            None => Ok(None),
        }
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        if !is_safe_id(experiment_id) {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for (_, meta) in subdirs_with_meta(&self.experiment_dir(experiment_id))? {
            runs.push(read_json::<RunRecord>(&meta)?);
        }
        Ok(runs)
    }

    fn log_metric(&self, metric: MetricRecord) -> Result<()> {
        check_metric_value(&metric)?;
        let dir = self.require_run_dir(metric.run_id())?;
        let mut line = serde_json::to_string(&metric)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(METRICS_FILE))?;
        file.write_all(line.as_bytes())?;
        debug!(
            run_id = metric.run_id(),
            key = metric.key(),
            step = metric.step(),
            value = metric.value(),
            "logged metric"
        );
        Ok(())
    }

    fn get_metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        let dir = self.require_run_dir(run_id)?;
        let contents = match fs::read_to_string(dir.join(METRICS_FILE)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }

    fn put_artifact(&self, run_id: &str, path: &str, content: &[u8]) -> Result<ArtifactRecord> {
        let dir = self.require_run_dir(run_id)?;
        let key = normalize_artifact_path(path)?;

        let target = dir.join(ARTIFACT_DIR).join(&key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;

        let record = ArtifactRecord::for_content(run_id, key.clone(), content);
        let mut index = Self::read_artifact_index(&dir)?;
        index.retain(|a| a.key() != key);
        index.push(record.clone());
        index.sort_by(|a, b| a.key().cmp(b.key()));
        write_json(&dir.join(ARTIFACT_INDEX_FILE), &index)?;

        debug!(
            run_id,
            key = record.key(),
            size_bytes = record.size_bytes(),
            "stored artifact"
        );
        Ok(record)
    }

    fn get_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let dir = self.require_run_dir(run_id)?;
        let key = normalize_artifact_path(path)?;

        let record = Self::read_artifact_index(&dir)?
            .into_iter()
            .find(|a| a.key() == key)
            .ok_or_else(|| artifact_not_found(run_id, &key))?;

        let content = match fs::read(dir.join(ARTIFACT_DIR).join(&key)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(artifact_not_found(run_id, &key))
            }
            Err(e) => return Err(e.into()),
        };
        record.verify(&content)?;
        Ok(content)
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        let dir = self.require_run_dir(run_id)?;
        Self::read_artifact_index(&dir)
    }
}

/// IDs become directory names; keep them to a single plain path component.
/// Names the layout uses for its own files inside experiment and run directories.
const RESERVED_NAMES: [&str; 4] = [META_FILE, METRICS_FILE, ARTIFACT_INDEX_FILE, ARTIFACT_DIR];

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !RESERVED_NAMES.contains(&id)
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `(name, meta path)` of every subdirectory of `dir` holding a meta file.
fn subdirs_with_meta(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.path().join(META_FILE);
        if entry.file_type()?.is_dir() && meta.is_file() {
            found.push((entry.file_name().to_string_lossy().into_owned(), meta));
        }
    }
    Ok(found)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|e| {
        Error::StorageError(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&json).map_err(|e| {
        Error::StorageError(format!("Failed to parse {}: {e}", path.display()))
    })
}

/// Write JSON through a temporary file so readers never see a partial document.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::new(dir.path().join("never-created"));

        assert!(store.list_experiments().unwrap().is_empty());
        assert!(store.get_experiment_by_name("Default").unwrap().is_none());
        assert!(store.get_run("abc").unwrap().is_none());
        assert!(!store.root().exists());
    }

    #[test]
    fn test_experiment_ids_continue_after_max() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::new(dir.path());

        assert_eq!(store.create_experiment("a").unwrap().experiment_id(), "0");
        assert_eq!(store.create_experiment("b").unwrap().experiment_id(), "1");
        assert!(store.create_experiment("a").is_err());
    }

    #[test]
    fn test_metrics_append_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::new(dir.path());
        let experiment = store.create_experiment("exp").unwrap();
        store
            .put_run(&RunRecord::new("run1", experiment.experiment_id()))
            .unwrap();

        store.log_metric(MetricRecord::new("run1", "mse", 0, 4.0)).unwrap();
        store.log_metric(MetricRecord::new("run1", "r2", 0, 0.9)).unwrap();

        let raw = fs::read_to_string(dir.path().join("0").join("run1").join(METRICS_FILE)).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert_eq!(store.get_metrics("run1").unwrap().len(), 2);
    }

    #[test]
    fn test_unsafe_run_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::new(dir.path());
        let experiment = store.create_experiment("exp").unwrap();

        let err = store
            .put_run(&RunRecord::new("../escape", experiment.experiment_id()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.get_run("../escape").unwrap().is_none());
    }

    #[test]
    fn test_is_safe_id() {
        assert!(is_safe_id("0"));
        assert!(is_safe_id("4f1c2e0b9d8a4c7f8e6d5c4b3a291807"));
        assert!(!is_safe_id(""));
        assert!(!is_safe_id(".."));
        assert!(!is_safe_id("a/b"));
        for reserved in RESERVED_NAMES {
            assert!(!is_safe_id(reserved), "{reserved}");
        }
    }

    #[test]
    fn test_run_id_colliding_with_layout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::new(dir.path());
        let experiment = store.create_experiment("exp").unwrap();

        let err = store
            .put_run(&RunRecord::new(META_FILE, experiment.experiment_id()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.list_experiments().unwrap().len(), 1);
    }
}
