//! L1-regularised linear regression fitted by cyclic coordinate descent
//!
//! Objective:
//!
//! ```text
//! (1 / (2 n)) * ||y - X w - b||^2 + alpha * ||w||_1
//! ```
//!
//! Convergence is judged by the duality gap, checked whenever the largest
//! coordinate update in a sweep is small relative to the largest weight.

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::{Error, Result};

/// File name of a serialized model inside its artifact directory.
pub const MODEL_FILE: &str = "model.json";

/// Hyperparameters for [`Lasso`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LassoParams {
    /// L1 penalty strength (>= 0)
    pub alpha: f64,
    /// Maximum number of coordinate-descent sweeps (>= 1)
    pub max_iter: usize,
    /// Duality-gap tolerance, relative to `||y||^2`
    pub tol: f64,
    /// Center data and fit an unpenalised intercept
    pub fit_intercept: bool,
}

impl LassoParams {
    /// Parameters with default tolerance (`1e-4`) and an intercept.
    #[must_use]
    pub const fn new(alpha: f64, max_iter: usize) -> Self {
        Self {
            alpha,
            max_iter,
            tol: 1e-4,
            fit_intercept: true,
        }
    }

    /// Override the tolerance.
    #[must_use]
    pub const fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Fit through the origin.
    #[must_use]
    pub const fn without_intercept(mut self) -> Self {
        self.fit_intercept = false;
        self
    }

    /// Check hyperparameter ranges.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for negative / non-finite `alpha`, zero `max_iter`, or
    /// a non-positive tolerance.
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(Error::InvalidInput(format!(
                "alpha must be a finite non-negative number, got {}",
                self.alpha
            )));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidInput("max_iter must be at least 1".to_string()));
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "tol must be a finite positive number, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

/// Lasso estimator.
#[derive(Debug, Clone, Copy)]
pub struct Lasso {
    params: LassoParams,
}

impl Lasso {
    /// Create an estimator.
    #[must_use]
    pub const fn new(params: LassoParams) -> Self {
        Self { params }
    }

    /// Hyperparameters.
    #[must_use]
    pub const fn params(&self) -> &LassoParams {
        &self.params
    }

    /// Fit on `data`.
    ///
    /// Running out of iterations is not an error: the model is returned with
    /// `converged == false` and a warning is logged.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for invalid hyperparameters or non-finite data.
    #[allow(
        clippy::cast_precision_loss,
        clippy::many_single_char_names,
        clippy::needless_range_loop
    )]
    pub fn fit(&self, data: &Dataset) -> Result<LassoModel> {
        let params = self.params;
        params.validate()?;
        let all_finite = data.targets().iter().all(|v| v.is_finite())
            && data.features().iter().flatten().all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidInput(
                "training data contains non-finite values".to_string(),
            ));
        }

        let n = data.n_samples() as f64;
        let p = data.n_features();

        let (x_mean, y_mean) = if params.fit_intercept {
            (
                data.features()
                    .iter()
                    .map(|col| col.iter().sum::<f64>() / n)
                    .collect::<Vec<_>>(),
                data.targets().iter().sum::<f64>() / n,
            )
        } else {
            (vec![0.0; p], 0.0)
        };

        let x: Vec<Vec<f64>> = data
            .features()
            .iter()
            .zip(&x_mean)
            .map(|(col, mean)| col.iter().map(|v| v - mean).collect())
            .collect();
        let y: Vec<f64> = data.targets().iter().map(|v| v - y_mean).collect();

        let alpha_n = params.alpha * n;
        let norm_cols: Vec<f64> = x.iter().map(|col| dot(col, col)).collect();
        let y_norm2 = dot(&y, &y);
        let tol = params.tol * y_norm2;

        let mut w = vec![0.0; p];
        let mut r = y.clone();
        let mut gap = tol + 1.0;
        let mut n_iter = 0;
        let mut converged = false;

        for iter in 0..params.max_iter {
            n_iter = iter + 1;
            let mut w_max = 0.0_f64;
            let mut d_w_max = 0.0_f64;

            for j in 0..p {
                if norm_cols[j] == 0.0 {
                    continue;
                }
                let w_old = w[j];
                if w_old != 0.0 {
                    axpy(w_old, &x[j], &mut r);
                }
                let tmp = dot(&x[j], &r);
                w[j] = soft_threshold(tmp, alpha_n) / norm_cols[j];
                if w[j] != 0.0 {
                    axpy(-w[j], &x[j], &mut r);
                }

                d_w_max = d_w_max.max((w[j] - w_old).abs());
                w_max = w_max.max(w[j].abs());
            }

            if w_max == 0.0 || d_w_max / w_max < params.tol || n_iter == params.max_iter {
                gap = duality_gap(&x, &y, &r, &w, alpha_n);
                if gap <= tol {
                    converged = true;
                    break;
                }
            }
        }

        if !converged {
            tracing::warn!(
                alpha = params.alpha,
                max_iter = params.max_iter,
                dual_gap = gap,
                "lasso did not converge; consider increasing max_iter"
            );
        }

        let intercept = if params.fit_intercept {
            y_mean - dot(&x_mean, &w)
        } else {
            0.0
        };

        tracing::debug!(n_iter, converged, dual_gap = gap, "lasso fit finished");

        Ok(LassoModel {
            coef: w,
            intercept,
            alpha: params.alpha,
            n_iter,
            dual_gap: gap / n,
            converged,
        })
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `y += a * x`
fn axpy(a: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi = a.mul_add(*xi, *yi);
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    value.signum() * (value.abs() - threshold).max(0.0)
}

fn duality_gap(x: &[Vec<f64>], y: &[f64], r: &[f64], w: &[f64], alpha_n: f64) -> f64 {
    let dual_norm = x
        .iter()
        .map(|col| dot(col, r).abs())
        .fold(0.0_f64, f64::max);
    let r_norm2 = dot(r, r);
    let w_l1: f64 = w.iter().map(|v| v.abs()).sum();

    let (scale, mut gap) = if dual_norm > alpha_n {
        let scale = alpha_n / dual_norm;
        (scale, 0.5 * r_norm2.mul_add(scale * scale, r_norm2))
    } else {
        (1.0, r_norm2)
    };
    gap += alpha_n.mul_add(w_l1, -scale * dot(r, y));
    gap
}

/// A fitted Lasso model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LassoModel {
    /// One coefficient per feature
    pub coef: Vec<f64>,
    /// Intercept (0.0 when fitted through the origin)
    pub intercept: f64,
    /// Penalty the model was fitted with
    pub alpha: f64,
    /// Coordinate-descent sweeps performed
    pub n_iter: usize,
    /// Final duality gap, in objective units
    pub dual_gap: f64,
    /// Whether the gap fell below tolerance
    pub converged: bool,
}

impl LassoModel {
    /// Number of features the model expects.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.coef.len()
    }

    /// Predict targets for column-major `features`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the number of columns differs from the model's or
    /// the columns have different lengths.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        if features.len() != self.coef.len() {
            return Err(Error::InvalidInput(format!(
                "model expects {} features, got {}",
                self.coef.len(),
                features.len()
            )));
        }
        let n = features.first().map_or(0, Vec::len);
        if features.iter().any(|col| col.len() != n) {
            return Err(Error::InvalidInput(
                "feature columns have different lengths".to_string(),
            ));
        }

        let mut out = vec![self.intercept; n];
        for (col, &coef) in features.iter().zip(&self.coef) {
            axpy(coef, col, &mut out);
        }
        Ok(out)
    }

    /// Predict targets for a dataset's features.
    ///
    /// # Errors
    ///
    /// `InvalidInput` on a feature count mismatch.
    pub fn predict_dataset(&self, data: &Dataset) -> Result<Vec<f64>> {
        self.predict(data.features())
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns a JSON error for malformed input.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
