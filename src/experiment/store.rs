//! Tracking store - the persistence contract for experiment tracking data
//!
//! `TrackingStore` is the seam between the training/evaluation pipelines and
//! wherever experiments live. Two implementations ship with the crate:
//! [`MemoryTrackingStore`] (this module) and
//! [`FileTrackingStore`](super::FileTrackingStore).

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;

use super::artifact_record::normalize_artifact_path;
use super::search::{RunCandidate, RunSearch};
use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord};
use crate::{Error, Result};

/// Storage backend for experiments, runs, metrics and artifacts.
///
/// All methods take `&self`; implementations use interior mutability.
/// Lookups of a single entity return `Ok(None)` when it does not exist, while
/// operations *on* a run (logging, artifacts) fail with `NotFound`.
pub trait TrackingStore {
    /// Create an experiment with the next free ID.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the name is blank or already taken.
    fn create_experiment(&self, name: &str) -> Result<ExperimentRecord>;

    /// Get an experiment by ID.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn get_experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>>;

    /// Get an experiment by its unique name.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>>;

    /// All experiments, ordered by ID.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn list_experiments(&self) -> Result<Vec<ExperimentRecord>>;

    /// Create or overwrite a run.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run's experiment does not exist, `InvalidInput` if the
    /// run id already belongs to another experiment.
    fn put_run(&self, run: &RunRecord) -> Result<()>;

    /// Get a run by ID.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>>;

    /// All runs of an experiment, in no particular order.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>>;

    /// Append a metric point to its run.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist, `InvalidInput` for a non-finite value.
    fn log_metric(&self, metric: MetricRecord) -> Result<()>;

    /// Every metric point of a run, in logging order.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist.
    fn get_metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>>;

    /// Store artifact content under a relative path of the run.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown run, `InvalidInput` for an unsafe path.
    fn put_artifact(&self, run_id: &str, path: &str, content: &[u8]) -> Result<ArtifactRecord>;

    /// Read artifact content back, verifying its hash.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run or artifact is missing, `StorageError` if the
    /// content no longer matches its record.
    fn get_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>>;

    /// Artifact records of a run, sorted by path.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist.
    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>>;

    /// Metric points of one key, ordered by step.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist.
    fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        let mut history: Vec<MetricRecord> = self
            .get_metrics(run_id)?
            .into_iter()
            .filter(|m| m.key() == key)
            .collect();
        // Stable sort keeps logging order within a step
        history.sort_by_key(MetricRecord::step);
        Ok(history)
    }

    /// Current value of every metric key of a run.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist.
    fn latest_metrics(&self, run_id: &str) -> Result<HashMap<String, f64>> {
        Ok(latest_values(&self.get_metrics(run_id)?))
    }

    /// Runs of the requested experiments that match the search, in search order.
    ///
    /// # Errors
    ///
    /// `InvalidInput`/`ParseError` for a malformed search, backend failures otherwise.
    fn search_runs(&self, search: &RunSearch) -> Result<Vec<RunRecord>> {
        let plan = search.compile()?;
        let needs_metrics = plan.uses_metrics();

        let mut candidates = Vec::new();
        for experiment_id in search.experiment_ids() {
            for run in self.list_runs(experiment_id)? {
                let metrics = if needs_metrics {
                    self.latest_metrics(run.run_id())?
                } else {
                    HashMap::new()
                };
                candidates.push(RunCandidate::new(run, metrics));
            }
        }

        Ok(plan.apply(candidates))
    }
}

/// Reduce metric points to the current value per key.
#[must_use]
pub fn latest_values(metrics: &[MetricRecord]) -> HashMap<String, f64> {
    let mut latest: HashMap<&str, &MetricRecord> = HashMap::new();
    for metric in metrics {
        match latest.get(metric.key()) {
            Some(current) if !metric.supersedes(current) => {}
            _ => {
                latest.insert(metric.key(), metric);
            }
        }
    }
    latest
        .into_iter()
        .map(|(key, metric)| (key.to_string(), metric.value()))
        .collect()
}

/// Order experiment IDs numerically when both are numbers, lexically otherwise.
pub(crate) fn compare_experiment_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// A run id belongs to one experiment for its whole life.
pub(crate) fn check_run_owner(existing: Option<&RunRecord>, run: &RunRecord) -> Result<()> {
    match existing {
        Some(existing) if existing.experiment_id() != run.experiment_id() => {
            Err(Error::InvalidInput(format!(
                "run '{}' already belongs to experiment '{}'",
                run.run_id(),
                existing.experiment_id()
            )))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_experiment_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "experiment name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// JSON has no representation for NaN or infinities.
pub(crate) fn check_metric_value(metric: &MetricRecord) -> Result<()> {
    if metric.value().is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "metric '{}' must be finite, got {}",
            metric.key(),
            metric.value()
        )))
    }
}

pub(crate) fn run_not_found(run_id: &str) -> Error {
    Error::NotFound(format!("Run '{run_id}' not found"))
}

pub(crate) fn artifact_not_found(run_id: &str, path: &str) -> Error {
    Error::NotFound(format!("Artifact '{path}' not found in run '{run_id}'"))
}

/// In-memory tracking store.
///
/// ## Design
///
/// Each entity kind lives in its own `DashMap`, so the store is `Send + Sync`
/// and every operation takes `&self`. Nothing is persisted: data is lost when
/// the store is dropped.
///
/// ```rust
/// use rastreo::experiment::{MemoryTrackingStore, MetricRecord, RunRecord, TrackingStore};
///
/// # fn main() -> rastreo::Result<()> {
/// let store = MemoryTrackingStore::new();
/// let experiment = store.create_experiment("demo")?;
///
/// let mut run = RunRecord::new("run-001", experiment.experiment_id());
/// run.start();
/// store.put_run(&run)?;
///
/// for step in 0..10 {
///     store.log_metric(MetricRecord::new("run-001", "loss", step, 1.0 / (step as f64 + 1.0)))?;
/// }
/// assert_eq!(store.get_metric_history("run-001", "loss")?.len(), 10);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryTrackingStore {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<String, RunRecord>,
    metrics: DashMap<String, Vec<MetricRecord>>,
    artifacts: DashMap<String, BTreeMap<String, (ArtifactRecord, Vec<u8>)>>,
    next_experiment_id: AtomicU64,
}

impl MemoryTrackingStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty (no experiments, runs, or metrics).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.runs.is_empty() && self.metrics.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metric points in the store.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.iter().map(|entry| entry.value().len()).sum()
    }

    fn require_run(&self, run_id: &str) -> Result<()> {
        if self.runs.contains_key(run_id) {
            Ok(())
        } else {
            Err(run_not_found(run_id))
        }
    }
}

impl TrackingStore for MemoryTrackingStore {
    fn create_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        check_experiment_name(name)?;
        if self.experiments.iter().any(|e| e.value().name() == name) {
            return Err(Error::InvalidInput(format!(
                "Experiment '{name}' already exists"
            )));
        }

        let id = self
            .next_experiment_id
            .fetch_add(1, AtomicOrdering::SeqCst)
            .to_string();
        let experiment = ExperimentRecord::new(id.clone(), name);
        self.experiments.insert(id, experiment.clone());
        Ok(experiment)
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.experiments.get(experiment_id).map(|e| e.value().clone()))
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self
            .experiments
            .iter()
            .find(|e| e.value().name() == name)
            .map(|e| e.value().clone()))
    }

    fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut experiments: Vec<ExperimentRecord> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        experiments.sort_by(|a, b| compare_experiment_ids(a.experiment_id(), b.experiment_id()));
        Ok(experiments)
    }

    fn put_run(&self, run: &RunRecord) -> Result<()> {
        if !self.experiments.contains_key(run.experiment_id()) {
            return Err(Error::NotFound(format!(
                "Experiment with id '{}' not found",
                run.experiment_id()
            )));
        }
        let existing = self.runs.get(run.run_id()).map(|r| r.value().clone());
        check_run_owner(existing.as_ref(), run)?;
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.get(run_id).map(|r| r.value().clone()))
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        Ok(self
            .runs
            .iter()
            .filter(|r| r.value().experiment_id() == experiment_id)
            .map(|r| r.value().clone())
            .collect())
    }

    fn log_metric(&self, metric: MetricRecord) -> Result<()> {
        check_metric_value(&metric)?;
        self.require_run(metric.run_id())?;
        self.metrics
            .entry(metric.run_id().to_string())
            .or_default()
            .push(metric);
        Ok(())
    }

    fn get_metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        self.require_run(run_id)?;
        Ok(self
            .metrics
            .get(run_id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }

    fn put_artifact(&self, run_id: &str, path: &str, content: &[u8]) -> Result<ArtifactRecord> {
        self.require_run(run_id)?;
        let key = normalize_artifact_path(path)?;
        let record = ArtifactRecord::for_content(run_id, key.clone(), content);
        self.artifacts
            .entry(run_id.to_string())
            .or_default()
            .insert(key, (record.clone(), content.to_vec()));
        Ok(record)
    }

    fn get_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        self.require_run(run_id)?;
        let key = normalize_artifact_path(path)?;
        let artifacts = self
            .artifacts
            .get(run_id)
            .ok_or_else(|| artifact_not_found(run_id, &key))?;
        let (record, content) = artifacts
            .value()
            .get(&key)
            .ok_or_else(|| artifact_not_found(run_id, &key))?;
        record.verify(content)?;
        Ok(content.clone())
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        self.require_run(run_id)?;
        Ok(self
            .artifacts
            .get(run_id)
            .map(|a| a.value().values().map(|(record, _)| record.clone()).collect())
            .unwrap_or_default())
    }
}
