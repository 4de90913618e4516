//! Fit a Lasso model and record it as a tracked run

use std::path::PathBuf;

use super::{load_or_generate, MODEL_ARTIFACT, SPLIT_SEED, TEST_SIZE, TRAIN_DATA_ARTIFACT};
use crate::data::{train_test_split, write_parquet_bytes, SyntheticLinear};
use crate::experiment::{RunStatus, TrackingStore};
use crate::model::{mean_squared_error, r2_score, Lasso, LassoModel, LassoParams};
use crate::tracking::{ArtifactUri, TrackingClient};
use crate::Result;

/// Inputs of a training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Solver hyperparameters
    pub params: LassoParams,
    /// Experiment to record the run in (created if missing)
    pub experiment_name: String,
    /// Optional human-readable run name
    pub run_name: Option<String>,
    /// Parquet dataset to train on instead of the synthetic line
    pub data: Option<PathBuf>,
}

impl TrainOptions {
    /// Options for synthetic data with no run name.
    #[must_use]
    pub fn new(params: LassoParams, experiment_name: impl Into<String>) -> Self {
        Self {
            params,
            experiment_name: experiment_name.into(),
            run_name: None,
            data: None,
        }
    }
}

/// Outcome of a training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// Experiment the run was recorded in
    pub experiment_id: String,
    /// The new run
    pub run_id: String,
    /// Where the model was logged
    pub model_uri: ArtifactUri,
    /// The fitted model
    pub model: LassoModel,
    /// Samples used for fitting
    pub n_train: usize,
    /// Samples held back for `test_mse` / `test_r2`
    pub n_test: usize,
    /// MSE on the held-back split
    pub test_mse: f64,
    /// R² on the held-back split
    pub test_r2: f64,
}

/// Split the data, fit, and log params, metrics, the model and the training
/// split to a new run.
///
/// The run is ended `SUCCESS`; if logging fails part-way it is left `FAILED`.
///
/// # Errors
///
/// Data, solver and store errors.
pub fn train<S: TrackingStore>(client: &TrackingClient<S>, options: &TrainOptions) -> Result<TrainReport> {
    let dataset = load_or_generate(options.data.as_deref(), SyntheticLinear::training())?;
    let (train_set, test_set) = train_test_split(&dataset, TEST_SIZE, SPLIT_SEED)?;

    let model = Lasso::new(options.params).fit(&train_set)?;
    let predictions = model.predict_dataset(&test_set)?;
    let test_mse = mean_squared_error(test_set.targets(), &predictions)?;
    let test_r2 = r2_score(test_set.targets(), &predictions)?;

    let experiment = client.set_experiment(&options.experiment_name)?;
    let mut run = client.start_run(experiment.experiment_id(), options.run_name.as_deref())?;

    run.log_param("alpha", options.params.alpha)?;
    run.log_param("max_iter", options.params.max_iter)?;
    run.log_param("tol", options.params.tol)?;
    run.log_param("fit_intercept", options.params.fit_intercept)?;
    let source = options
        .data
        .as_ref()
        .map_or_else(|| "synthetic".to_string(), |path| path.display().to_string());
    run.set_tag("data_source", source)?;

    run.log_metric("test_mse", test_mse)?;
    run.log_metric("test_r2", test_r2)?;
    #[allow(clippy::cast_precision_loss)]
    let n_iter = model.n_iter as f64;
    run.log_metric("n_iter", n_iter)?;

    run.log_artifact(TRAIN_DATA_ARTIFACT, &write_parquet_bytes(&train_set)?)?;
    let model_uri = run.log_model(MODEL_ARTIFACT, &model)?;

    let run_id = run.run_id().to_string();
    run.end(RunStatus::Success)?;

    tracing::info!(
        %run_id,
        experiment = options.experiment_name.as_str(),
        converged = model.converged,
        test_mse,
        test_r2,
        "training run complete"
    );

    Ok(TrainReport {
        experiment_id: experiment.experiment_id().to_string(),
        run_id,
        model_uri,
        model,
        n_train: train_set.n_samples(),
        n_test: test_set.n_samples(),
        test_mse,
        test_r2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::MemoryTrackingStore;

    #[test]
    fn test_train_records_run() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let options = TrainOptions::new(LassoParams::new(0.5, 1000), "demo");
        let report = train(&client, &options).unwrap();

        assert_eq!(report.n_train, 80);
        assert_eq!(report.n_test, 20);
        assert!(report.test_r2 > 0.8);
        assert_eq!(
            report.model_uri.to_string(),
            format!("runs:/{}/lasso_model", report.run_id)
        );

        let run = client.store().get_run(&report.run_id).unwrap().unwrap();
        assert_eq!(run.status(), RunStatus::Success);
        assert_eq!(run.param("alpha"), Some("0.5"));
        assert_eq!(run.param("max_iter"), Some("1000"));

        let keys: Vec<String> = client
            .store()
            .list_artifacts(&report.run_id)
            .unwrap()
            .iter()
            .map(|a| a.key().to_string())
            .collect();
        assert_eq!(keys, vec!["datasets/train.parquet", "lasso_model/model.json"]);

        let loaded = client.load_model(&report.model_uri).unwrap();
        assert_eq!(loaded, report.model);
    }

    #[test]
    fn test_invalid_params_create_no_run() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let options = TrainOptions::new(LassoParams::new(-1.0, 1000), "demo");
        assert!(train(&client, &options).is_err());
        assert_eq!(client.store().run_count(), 0);
    }

    #[test]
    fn test_run_name_is_recorded() {
        let client = TrackingClient::new(MemoryTrackingStore::new());
        let mut options = TrainOptions::new(LassoParams::new(0.1, 100), "demo");
        options.run_name = Some("baseline".to_string());
        let report = train(&client, &options).unwrap();
        let run = client.store().get_run(&report.run_id).unwrap().unwrap();
        assert_eq!(run.run_name(), Some("baseline"));
        assert_eq!(run.tags().get("data_source").map(String::as_str), Some("synthetic"));
    }
}
