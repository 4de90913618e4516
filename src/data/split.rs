//! Shuffled train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::Dataset;
use crate::{Error, Result};

/// Split `dataset` into `(train, test)` after a seeded shuffle.
///
/// The test side receives `ceil(test_size * n)` rows.
///
/// # Errors
///
/// `InvalidInput` if `test_size` is not in `(0, 1)` or either side would be empty.
pub fn train_test_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidInput(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let n = dataset.n_samples();
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::InvalidInput(format!(
            "test_size {test_size} leaves an empty side for {n} samples"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok((dataset.select(train_idx), dataset.select(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(n: usize) -> Dataset {
        #[allow(clippy::cast_precision_loss)]
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Dataset::new(vec![values.clone()], values).unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(&counting(100), 0.2, 42).unwrap();
        assert_eq!(train.n_samples(), 80);
        assert_eq!(test.n_samples(), 20);
    }

    #[test]
    fn test_split_rounds_test_side_up() {
        let (train, test) = train_test_split(&counting(11), 0.25, 0).unwrap();
        assert_eq!(test.n_samples(), 3);
        assert_eq!(train.n_samples(), 8);
    }

    #[test]
    fn test_split_is_a_partition() {
        let (train, test) = train_test_split(&counting(50), 0.3, 7).unwrap();
        let mut all: Vec<f64> = train.targets().iter().chain(test.targets()).copied().collect();
        all.sort_by(f64::total_cmp);
        #[allow(clippy::cast_precision_loss)]
        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_split_keeps_rows_aligned() {
        let (train, _) = train_test_split(&counting(30), 0.5, 1).unwrap();
        assert_eq!(train.features()[0], train.targets());
    }

    #[test]
    fn test_split_deterministic_for_seed() {
        let a = train_test_split(&counting(40), 0.2, 42).unwrap();
        let b = train_test_split(&counting(40), 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_bad_sizes() {
        assert!(train_test_split(&counting(10), 0.0, 0).is_err());
        assert!(train_test_split(&counting(10), 1.0, 0).is_err());
        assert!(train_test_split(&counting(10), f64::NAN, 0).is_err());
        assert!(train_test_split(&counting(1), 0.5, 0).is_err());
    }
}
