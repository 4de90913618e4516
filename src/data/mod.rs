//! Regression datasets: synthetic generation, splitting and Parquet I/O

mod parquet_io;
mod split;
mod synthetic;

pub use parquet_io::{
    from_record_batches, load_parquet, to_record_batch, write_parquet, write_parquet_bytes,
    TARGET_COLUMN,
};
pub use split::train_test_split;
pub use synthetic::SyntheticLinear;

use crate::{Error, Result};

/// Feature matrix (column-major) with one target per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl Dataset {
    /// Build a dataset from feature columns and targets.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if there are no features, no samples, or a column
    /// length differs from the number of targets.
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::InvalidInput(
                "dataset needs at least one feature column".to_string(),
            ));
        }
        if targets.is_empty() {
            return Err(Error::InvalidInput("dataset has no samples".to_string()));
        }
        if let Some((idx, column)) = features
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != targets.len())
        {
            return Err(Error::InvalidInput(format!(
                "feature column {idx} has {} values, expected {}",
                column.len(),
                targets.len()
            )));
        }
        Ok(Self { features, targets })
    }

    /// Number of samples (rows).
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.targets.len()
    }

    /// Number of features (columns).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Feature columns.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Targets.
    #[must_use]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Rows at `indices`, in that order. Indices must be in bounds.
    #[must_use]
    pub(crate) fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self
                .features
                .iter()
                .map(|column| indices.iter().map(|&i| column[i]).collect::<Vec<f64>>())
                .collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_shape() {
        let data = Dataset::new(vec![vec![1.0, 2.0, 3.0], vec![0.0, 0.0, 1.0]], vec![1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(data.n_samples(), 3);
        assert_eq!(data.n_features(), 2);
    }

    #[test]
    fn test_dataset_rejects_ragged_columns() {
        let err = Dataset::new(vec![vec![1.0, 2.0]], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.to_string().contains("feature column 0"));
    }

    #[test]
    fn test_dataset_rejects_empty() {
        assert!(Dataset::new(vec![], vec![1.0]).is_err());
        assert!(Dataset::new(vec![vec![]], vec![]).is_err());
    }

    #[test]
    fn test_select_reorders_rows() {
        let data = Dataset::new(vec![vec![10.0, 20.0, 30.0]], vec![1.0, 2.0, 3.0]).unwrap();
        let picked = data.select(&[2, 0]);
        assert_eq!(picked.features(), &[vec![30.0, 10.0]]);
        assert_eq!(picked.targets(), &[3.0, 1.0]);
    }
}
