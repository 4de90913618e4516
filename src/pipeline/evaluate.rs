//! Score the latest model of an experiment on held-out data

use std::path::PathBuf;

use super::{load_or_generate, MODEL_ARTIFACT};
use crate::data::SyntheticLinear;
use crate::experiment::TrackingStore;
use crate::model::{mean_squared_error, r2_score};
use crate::tracking::{ArtifactUri, TrackingClient};
use crate::Result;

/// Inputs of an evaluation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateOptions {
    /// Experiment whose latest run is evaluated
    pub experiment_name: String,
    /// Parquet dataset to evaluate on instead of fresh synthetic data
    pub test_data: Option<PathBuf>,
}

impl EvaluateOptions {
    /// Evaluate on synthetic held-out data.
    #[must_use]
    pub fn new(experiment_name: impl Into<String>) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            test_data: None,
        }
    }
}

/// Metrics of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Run whose model was evaluated
    pub run_id: String,
    /// URI the model was loaded from
    pub model_uri: ArtifactUri,
    /// Number of evaluation samples
    pub n_samples: usize,
    /// Mean squared error
    pub mse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

/// Load the latest model of the experiment and compute MSE and R².
///
/// Nothing is written to the store; see [`log_evaluation`].
///
/// # Errors
///
/// `NotFound` if the experiment, its runs or the model are missing; data
/// and shape errors otherwise.
pub fn evaluate<S: TrackingStore>(
    client: &TrackingClient<S>,
    options: &EvaluateOptions,
) -> Result<EvaluationReport> {
    let dataset = load_or_generate(options.test_data.as_deref(), SyntheticLinear::held_out())?;

    let run_id = client.latest_run_id(&options.experiment_name)?;
    let model_uri = ArtifactUri::new(run_id.clone(), MODEL_ARTIFACT)?;
    let model = client.load_model(&model_uri)?;

    let predictions = model.predict_dataset(&dataset)?;
    let mse = mean_squared_error(dataset.targets(), &predictions)?;
    let r2 = r2_score(dataset.targets(), &predictions)?;

    tracing::debug!(%model_uri, mse, r2, "evaluated model");
    Ok(EvaluationReport {
        run_id,
        model_uri,
        n_samples: dataset.n_samples(),
        mse,
        r2,
    })
}

/// Record `mse` and `r2` on the evaluated run.
///
/// # Errors
///
/// Store errors, or `InvalidInput` for non-finite metrics.
pub fn log_evaluation<S: TrackingStore>(
    client: &TrackingClient<S>,
    report: &EvaluationReport,
) -> Result<()> {
    client.log_metric(&report.run_id, "mse", report.mse, 0)?;
    client.log_metric(&report.run_id, "r2", report.r2, 0)?;
    tracing::info!(run_id = report.run_id.as_str(), "logged evaluation metrics");
    Ok(())
}
