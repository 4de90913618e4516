//! Tracking client and the explicit handle for an in-progress run

use std::fmt::Display;

use uuid::Uuid;

use super::resolver;
use super::uri::ArtifactUri;
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord, RunSearch, RunStatus,
    TrackingStore,
};
use crate::model::{LassoModel, MODEL_FILE};
use crate::Result;

/// High-level tracking operations over a [`TrackingStore`].
///
/// # Example
///
/// ```rust
/// use rastreo::experiment::{MemoryTrackingStore, RunStatus};
/// use rastreo::tracking::TrackingClient;
///
/// # fn main() -> rastreo::Result<()> {
/// let client = TrackingClient::new(MemoryTrackingStore::new());
/// let experiment = client.set_experiment("demo")?;
///
/// let mut run = client.start_run(experiment.experiment_id(), Some("first"))?;
/// run.log_param("alpha", 0.5)?;
/// run.log_metric("mse", 3.9)?;
/// let run_id = run.run_id().to_string();
/// run.end(RunStatus::Success)?;
///
/// assert_eq!(client.latest_run_id("demo")?, run_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TrackingClient<S: TrackingStore> {
    store: S,
}

impl<S: TrackingStore> TrackingClient<S> {
    /// Wrap a store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Look up an experiment by name.
    ///
    /// # Errors
    ///
    /// Store errors only; a missing experiment is `Ok(None)`.
    pub fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        self.store.get_experiment_by_name(name)
    }

    /// Get the experiment called `name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank name, store errors otherwise.
    pub fn set_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        if let Some(existing) = self.store.get_experiment_by_name(name)? {
            return Ok(existing);
        }
        let created = self.store.create_experiment(name)?;
        tracing::info!(
            experiment = name,
            experiment_id = created.experiment_id(),
            "created experiment"
        );
        Ok(created)
    }

    /// Start a new run in an experiment.
    ///
    /// # Errors
    ///
    /// `NotFound` if the experiment does not exist.
    pub fn start_run(&self, experiment_id: &str, run_name: Option<&str>) -> Result<ActiveRun<'_, S>> {
        let run_id = Uuid::new_v4().simple().to_string();
        let mut builder = RunRecord::builder(run_id, experiment_id);
        if let Some(name) = run_name {
            builder = builder.run_name(name);
        }
        let mut record = builder.build();
        record.start();
        self.store.put_run(&record)?;

        tracing::info!(
            run_id = record.run_id(),
            experiment_id,
            run_name = run_name.unwrap_or_default(),
            "started run"
        );
        Ok(ActiveRun {
            store: &self.store,
            record,
            ended: false,
        })
    }

    /// Search runs.
    ///
    /// # Errors
    ///
    /// See [`TrackingStore::search_runs`].
    pub fn search_runs(&self, search: &RunSearch) -> Result<Vec<RunRecord>> {
        self.store.search_runs(search)
    }

    /// Most recently started run of the experiment `name`.
    ///
    /// # Errors
    ///
    /// See [`latest_run_id`](super::latest_run_id).
    pub fn latest_run_id(&self, name: &str) -> Result<String> {
        resolver::latest_run_id(&self.store, name)
    }

    /// Record a metric on an existing run, which may already have ended.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown run, `InvalidInput` for a non-finite value.
    pub fn log_metric(&self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()> {
        self.store
            .log_metric(MetricRecord::new(run_id, key, step, value))
    }

    /// Fetch the bytes of a single artifact file.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run or artifact is missing, `StorageError` if the
    /// content fails its checksum.
    pub fn download_artifact(&self, uri: &ArtifactUri) -> Result<Vec<u8>> {
        self.store.get_artifact(uri.run_id(), uri.artifact_path())
    }

    /// Load a model logged with [`ActiveRun::log_model`].
    ///
    /// `uri` names the model directory, e.g. `runs:/<run_id>/lasso_model`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no model at `uri`, JSON errors if it is corrupt.
    pub fn load_model(&self, uri: &ArtifactUri) -> Result<LassoModel> {
        let bytes = self.download_artifact(&uri.join(MODEL_FILE)?)?;
        let model = LassoModel::from_json_slice(&bytes)?;
        tracing::debug!(%uri, "loaded model");
        Ok(model)
    }
}

/// Handle to a run that is in progress.
///
/// Every logging call writes through to the store immediately. Finish the run
/// with [`end`](Self::end); a handle dropped without ending marks the run
/// `FAILED`.
#[derive(Debug)]
pub struct ActiveRun<'a, S: TrackingStore> {
    store: &'a S,
    record: RunRecord,
    ended: bool,
}

impl<S: TrackingStore> ActiveRun<'_, S> {
    /// Run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.record.run_id()
    }

    /// Current state of the run.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Record a parameter (stored as its `Display` form).
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn log_param(&mut self, key: &str, value: impl Display) -> Result<()> {
        self.record.set_param(key, value.to_string());
        self.store.put_run(&self.record)
    }

    /// Set a tag.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn set_tag(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.record.set_tag(key, value);
        self.store.put_run(&self.record)
    }

    /// Record a metric at step 0.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a non-finite value, store errors otherwise.
    pub fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.log_metric_at_step(key, value, 0)
    }

    /// Record a metric at an explicit step.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a non-finite value, store errors otherwise.
    pub fn log_metric_at_step(&self, key: &str, value: f64, step: u64) -> Result<()> {
        self.store
            .log_metric(MetricRecord::new(self.run_id(), key, step, value))
    }

    /// Store an artifact file under the run.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an unsafe path, store errors otherwise.
    pub fn log_artifact(&self, path: &str, content: &[u8]) -> Result<ArtifactRecord> {
        let record = self.store.put_artifact(self.run_id(), path, content)?;
        tracing::debug!(
            run_id = self.run_id(),
            path = record.key(),
            size_bytes = record.size_bytes(),
            "logged artifact"
        );
        Ok(record)
    }

    /// Store a model as `{name}/model.json` and return the URI of `{name}`.
    ///
    /// # Errors
    ///
    /// `InvalidArtifactUri` for an unsafe name, store errors otherwise.
    pub fn log_model(&self, name: &str, model: &LassoModel) -> Result<ArtifactUri> {
        let uri = ArtifactUri::new(self.run_id(), name)?;
        let file = uri.join(MODEL_FILE)?;
        self.log_artifact(file.artifact_path(), &model.to_json_bytes()?)?;
        tracing::info!(%uri, "logged model");
        Ok(uri)
    }

    /// Finish the run with a terminal status and return its final record.
    ///
    /// # Errors
    ///
    /// Store errors. The run is not retried as `FAILED` on drop.
    pub fn end(mut self, status: RunStatus) -> Result<RunRecord> {
        self.ended = true;
        self.record.complete(status);
        self.store.put_run(&self.record)?;
        tracing::info!(run_id = self.run_id(), %status, "ended run");
        Ok(self.record.clone())
    }
}

impl<S: TrackingStore> Drop for ActiveRun<'_, S> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        self.record.complete(RunStatus::Failed);
        if let Err(e) = self.store.put_run(&self.record) {
            tracing::warn!(run_id = self.run_id(), error = %e, "failed to mark abandoned run as FAILED");
        } else {
            tracing::warn!(run_id = self.run_id(), "run dropped without end(); marked FAILED");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::MemoryTrackingStore;
    use crate::Error;

    fn model() -> LassoModel {
        LassoModel {
            coef: vec![2.9],
            intercept: 5.2,
            alpha: 0.5,
            n_iter: 2,
            dual_gap: 0.0,
            converged: true,
        }
    }

    #[test]
    fn test_set_experiment_is_get_or_create() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let first = client.set_experiment("demo").unwrap();
        let second = client.set_experiment("demo").unwrap();
        assert_eq!(first.experiment_id(), second.experiment_id());
        assert_eq!(client.store().experiment_count(), 1);
    }

    #[test]
    fn test_run_lifecycle() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let exp = client.set_experiment("demo").unwrap();

        let mut run = client.start_run(exp.experiment_id(), Some("r")).unwrap();
        assert_eq!(run.run_id().len(), 32);
        assert_eq!(run.record().status(), RunStatus::Running);
        run.log_param("alpha", 0.5).unwrap();
        run.log_param("max_iter", 1000).unwrap();
        run.set_tag("stage", "train").unwrap();
        run.log_metric("mse", 4.0).unwrap();
        let run_id = run.run_id().to_string();
        let ended = run.end(RunStatus::Success).unwrap();

        assert_eq!(ended.status(), RunStatus::Success);
        assert!(ended.ended_at().is_some());
        let stored = client.store().get_run(&run_id).unwrap().unwrap();
        assert_eq!(stored.param("alpha"), Some("0.5"));
        assert_eq!(stored.param("max_iter"), Some("1000"));
        assert_eq!(stored.tags().get("stage").map(String::as_str), Some("train"));
        assert_eq!(stored.status(), RunStatus::Success);
        assert_eq!(
            client.store().latest_metrics(&run_id).unwrap().get("mse"),
            Some(&4.0)
        );
    }

    #[test]
    fn test_dropped_run_is_failed() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let exp = client.set_experiment("demo").unwrap();
        let run = client.start_run(exp.experiment_id(), None).unwrap();
        let run_id = run.run_id().to_string();
        drop(run);

        let stored = client.store().get_run(&run_id).unwrap().unwrap();
        assert_eq!(stored.status(), RunStatus::Failed);
        assert!(stored.ended_at().is_some());
    }

    #[test]
    fn test_start_run_unknown_experiment() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        assert!(client.start_run("42", None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_log_and_load_model() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let exp = client.set_experiment("demo").unwrap();
        let run = client.start_run(exp.experiment_id(), None).unwrap();
        let uri = run.log_model("lasso_model", &model()).unwrap();
        let run_id = run.run_id().to_string();
        run.end(RunStatus::Success).unwrap();

        assert_eq!(uri.to_string(), format!("runs:/{run_id}/lasso_model"));
        let parsed: ArtifactUri = uri.to_string().parse().unwrap();
        assert_eq!(client.load_model(&parsed).unwrap(), model());

        let artifacts = client.store().list_artifacts(&run_id).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].key(), "lasso_model/model.json");
    }

    #[test]
    fn test_load_model_missing() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let exp = client.set_experiment("demo").unwrap();
        let run = client.start_run(exp.experiment_id(), None).unwrap();
        let uri = ArtifactUri::new(run.run_id(), "lasso_model").unwrap();
        run.end(RunStatus::Success).unwrap();

        assert!(client.load_model(&uri).unwrap_err().is_not_found());
    }

    #[test]
    fn test_log_metric_on_ended_run() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let exp = client.set_experiment("demo").unwrap();
        let run = client.start_run(exp.experiment_id(), None).unwrap();
        let run_id = run.run_id().to_string();
        run.end(RunStatus::Success).unwrap();

        client.log_metric(&run_id, "r2", 0.93, 0).unwrap();
        assert!(matches!(
            client.log_metric(&run_id, "r2", f64::NAN, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(client.log_metric("nope", "r2", 1.0, 0).unwrap_err().is_not_found());
    }
}
