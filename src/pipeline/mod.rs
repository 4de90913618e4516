//! Training and evaluation jobs behind the `train` and `evaluate` binaries
//!
//! The two jobs share nothing but the tracking store: `train` logs a model
//! under [`MODEL_ARTIFACT`], `evaluate` finds the latest run of an experiment
//! and loads `runs:/{run_id}/lasso_model` back.

mod evaluate;
mod train;

pub use evaluate::{evaluate, log_evaluation, EvaluateOptions, EvaluationReport};
pub use train::{train, TrainOptions, TrainReport};

use std::path::Path;

use crate::data::{load_parquet, Dataset, SyntheticLinear, TARGET_COLUMN};
use crate::Result;

/// Artifact directory the trained model is logged under.
pub const MODEL_ARTIFACT: &str = "lasso_model";
/// Artifact holding the training split as Parquet.
pub const TRAIN_DATA_ARTIFACT: &str = "datasets/train.parquet";
/// Fraction of samples held back for the training run's test metrics.
pub const TEST_SIZE: f64 = 0.2;
/// Seed of the train/test shuffle.
pub const SPLIT_SEED: u64 = 42;

fn load_or_generate(path: Option<&Path>, synthetic: SyntheticLinear) -> Result<Dataset> {
    match path {
        Some(path) => load_parquet(path, TARGET_COLUMN),
        None => synthetic.generate(),
    }
}
