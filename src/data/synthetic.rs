//! Synthetic single-feature linear data with Gaussian noise

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::Dataset;
use crate::{Error, Result};

/// Generator for `y = slope * x + intercept + noise_std * N(0, 1)` with
/// `x ~ U[0, 1) * x_scale`.
///
/// Generation is deterministic for a given seed: all `x` values are drawn
/// first, then the noise terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticLinear {
    /// Number of samples
    pub n_samples: usize,
    /// Coefficient of `x`
    pub slope: f64,
    /// Constant term
    pub intercept: f64,
    /// Standard deviation of the additive noise
    pub noise_std: f64,
    /// Upper bound (exclusive) of `x`
    pub x_scale: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for SyntheticLinear {
    fn default() -> Self {
        Self {
            n_samples: 100,
            slope: 3.0,
            intercept: 5.0,
            noise_std: 2.0,
            x_scale: 10.0,
            seed: 42,
        }
    }
}

impl SyntheticLinear {
    /// Training data: 100 samples, seed 42.
    #[must_use]
    pub fn training() -> Self {
        Self::default()
    }

    /// Held-out evaluation data: 20 samples, seed 123.
    #[must_use]
    pub fn held_out() -> Self {
        Self {
            n_samples: 20,
            seed: 123,
            ..Self::default()
        }
    }

    /// Draw the dataset.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for zero samples or a negative / non-finite parameter.
    pub fn generate(&self) -> Result<Dataset> {
        if self.n_samples == 0 {
            return Err(Error::InvalidInput(
                "synthetic dataset needs at least one sample".to_string(),
            ));
        }
        let finite = [self.slope, self.intercept, self.noise_std, self.x_scale]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.noise_std < 0.0 || self.x_scale <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "invalid synthetic data parameters: {self:?}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let x: Vec<f64> = (0..self.n_samples)
            .map(|_| rng.random::<f64>() * self.x_scale)
            .collect();

        let mut y = Vec::with_capacity(self.n_samples);
        for &xi in &x {
            let noise: f64 = rng.sample(StandardNormal);
            y.push(self.slope.mul_add(xi, self.intercept) + self.noise_std * noise);
        }

        Dataset::new(vec![x], y)
    }
}
