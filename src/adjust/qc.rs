//! Unwanted factors from QC covariates.

use crate::data::QcMatrix;
use crate::error::{Result, SconeError};
use crate::pca::{principal_components, standardize_columns};
use nalgebra::DMatrix;

/// Leading `k` principal components (samples × k) of the centred and scaled
/// QC matrix.
pub fn qc_factors(qc: &QcMatrix, k: usize) -> Result<DMatrix<f64>> {
    if k == 0 {
        return Err(SconeError::InvalidParameter(
            "QC adjustment needs at least one factor".to_string(),
        ));
    }
    let scaled = standardize_columns(qc.matrix());
    let w = principal_components(&scaled, k).ok_or_else(|| {
        SconeError::Numerical("QC covariates show no variation".to_string())
    })?;
    if w.ncols() < k {
        return Err(SconeError::Numerical(format!(
            "Only {} QC components are available, {} requested",
            w.ncols(),
            k
        )));
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qc(values: &[f64], n_samples: usize, n_cov: usize) -> QcMatrix {
        QcMatrix::new(
            DMatrix::from_row_slice(n_samples, n_cov, values),
            (0..n_cov).map(|c| format!("q{}", c)).collect(),
            (0..n_samples).map(|j| format!("s{}", j)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_scale_invariance() {
        // Second covariate is the first on a much larger scale plus noise
        let a = qc(&[1.0, 1000.0, 2.0, 2100.0, 3.0, 2900.0, 4.0, 4000.0], 4, 2);
        let w = qc_factors(&a, 1).unwrap();
        assert_eq!(w.shape(), (4, 1));
        let first: Vec<f64> = w.column(0).iter().copied().collect();
        assert!(first[0] * first[3] < 0.0);
    }

    #[test]
    fn test_too_many_components() {
        let a = qc(&[1.0, 2.0, 3.5, 4.0], 4, 1);
        assert!(qc_factors(&a, 1).is_ok());
        assert!(qc_factors(&a, 2).is_err());
        assert!(qc_factors(&a, 0).is_err());
    }
}
