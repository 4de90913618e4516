//! Lasso regression and evaluation metrics

mod lasso;
mod metrics;

pub use lasso::{Lasso, LassoModel, LassoParams, MODEL_FILE};
pub use metrics::{mean_squared_error, r2_score};
