//! Per-feature least-squares removal of unwanted effects.

use crate::error::{Result, SconeError};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Remove unwanted effects from a log-scale features × samples matrix.
///
/// Each feature is fit by OLS against `1 + protected + unwanted` (all design
/// blocks are samples × columns). The fitted unwanted contribution is then
/// subtracted, so the intercept, the protected effects and the residuals are
/// retained. With no unwanted columns the input is returned unchanged.
pub fn remove_unwanted(
    log_data: &DMatrix<f64>,
    protected: &DMatrix<f64>,
    unwanted: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let (n_features, n_samples) = log_data.shape();

    if protected.nrows() != n_samples {
        return Err(SconeError::DimensionMismatch {
            expected: n_samples,
            actual: protected.nrows(),
        });
    }
    if unwanted.nrows() != n_samples {
        return Err(SconeError::DimensionMismatch {
            expected: n_samples,
            actual: unwanted.nrows(),
        });
    }
    if unwanted.ncols() == 0 {
        return Ok(log_data.clone());
    }

    let n_protected = protected.ncols();
    let n_coef = 1 + n_protected + unwanted.ncols();
    if n_samples < n_coef {
        return Err(SconeError::Numerical(format!(
            "Adjustment model has {} coefficients but only {} samples",
            n_coef, n_samples
        )));
    }

    let mut x = DMatrix::zeros(n_samples, n_coef);
    x.column_mut(0).fill(1.0);
    x.columns_mut(1, n_protected).copy_from(protected);
    x.columns_mut(1 + n_protected, unwanted.ncols()).copy_from(unwanted);

    let xt = x.transpose();
    let xtx_inv = (&xt * &x).try_inverse().ok_or_else(|| {
        SconeError::Numerical(
            "Adjustment design is singular (factors are confounded)".to_string(),
        )
    })?;
    // Rows of the hat-like projector onto the unwanted coefficients
    let projector = xtx_inv.rows(1 + n_protected, unwanted.ncols()) * &xt;

    let rows: Vec<Vec<f64>> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            let y = DVector::from_iterator(n_samples, log_data.row(i).iter().copied());
            let beta_unwanted = &projector * &y;
            let fitted = unwanted * beta_unwanted;
            (&y - fitted).iter().copied().collect()
        })
        .collect();

    Ok(DMatrix::from_row_iterator(
        n_features,
        n_samples,
        rows.into_iter().flatten(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn column(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_column_slice(values.len(), 1, values)
    }

    #[test]
    fn test_removes_batch_shift() {
        // Feature = 2 + 3 * batch
        let batch = column(&[0.0, 0.0, 1.0, 1.0]);
        let log_data = DMatrix::from_row_slice(1, 4, &[2.0, 2.0, 5.0, 5.0]);
        let adjusted = remove_unwanted(&log_data, &DMatrix::zeros(4, 0), &batch).unwrap();
        for j in 0..4 {
            assert_relative_eq!(adjusted[(0, j)], 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_protected_effect_retained() {
        // Feature = 1 + 2 * bio + 4 * batch
        let bio = column(&[0.0, 1.0, 0.0, 1.0, 1.0]);
        let batch = column(&[0.0, 0.0, 1.0, 1.0, 0.0]);
        let values: Vec<f64> = (0..5).map(|j| 1.0 + 2.0 * bio[j] + 4.0 * batch[j]).collect();
        let log_data = DMatrix::from_row_slice(1, 5, &values);
        let adjusted = remove_unwanted(&log_data, &bio, &batch).unwrap();
        for j in 0..5 {
            assert_relative_eq!(adjusted[(0, j)], 1.0 + 2.0 * bio[j], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_no_unwanted_is_identity() {
        let log_data = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let adjusted =
            remove_unwanted(&log_data, &column(&[0.0, 1.0, 1.0]), &DMatrix::zeros(3, 0)).unwrap();
        assert_eq!(adjusted, log_data);
    }

    #[test]
    fn test_confounded_design_errors() {
        let bio = column(&[0.0, 0.0, 1.0, 1.0]);
        let log_data = DMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]);
        assert!(remove_unwanted(&log_data, &bio, &bio.clone()).is_err());
    }

    #[test]
    fn test_too_few_samples() {
        let w = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let log_data = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(remove_unwanted(&log_data, &DMatrix::zeros(2, 0), &w).is_err());
    }
}
