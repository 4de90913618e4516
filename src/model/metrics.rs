//! Regression quality metrics

use crate::{Error, Result};

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.is_empty() {
        return Err(Error::InvalidInput("metrics need at least one sample".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(Error::InvalidInput(format!(
            "length mismatch: {} targets vs {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Mean squared error.
///
/// # Errors
///
/// `InvalidInput` for empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// For constant targets, returns 1.0 on a perfect fit and 0.0 otherwise.
///
/// # Errors
///
/// `InvalidInput` for empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_known_value() {
        let mse = mean_squared_error(&[1.0, 2.0, 3.0], &[1.0, 2.0, 5.0]).unwrap();
        assert!((mse - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mse_perfect() {
        assert_eq!(mean_squared_error(&[1.5, -2.0], &[1.5, -2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&y, &y).unwrap() - 1.0).abs() < 1e-12);
        let mean = [2.5; 4];
        assert!(r2_score(&y, &mean).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let r2 = r2_score(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r2 - (-3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_targets() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_metrics_reject_bad_input() {
        assert!(mean_squared_error(&[], &[]).is_err());
        assert!(r2_score(&[1.0], &[1.0, 2.0]).is_err());
    }
}
