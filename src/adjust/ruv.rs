//! RUVg: unwanted factors from negative control features.
//!
//! Negative controls are assumed to carry no biological signal, so their
//! leading axes of variation on the log scale estimate the unwanted factors W.
//!
//! # Reference
//!
//! Risso D, Ngai J, Speed TP, Dudoit S. Normalization of RNA-seq data using
//! factor analysis of control genes or samples. Nature Biotechnology 32,
//! 896-902 (2014).

use crate::error::{Result, SconeError};
use crate::pca::principal_components;
use nalgebra::DMatrix;

/// Estimate `k` unwanted factors (samples × k) from the control rows of a
/// log-scale features × samples matrix.
pub fn ruvg_factors(log_data: &DMatrix<f64>, control_rows: &[usize], k: usize) -> Result<DMatrix<f64>> {
    if k == 0 {
        return Err(SconeError::InvalidParameter(
            "RUVg needs at least one factor".to_string(),
        ));
    }
    if control_rows.is_empty() {
        return Err(SconeError::EmptyData(
            "RUVg needs at least one negative control feature".to_string(),
        ));
    }

    let controls = log_data.select_rows(control_rows).transpose();
    let w = principal_components(&controls, k).ok_or_else(|| {
        SconeError::Numerical("Negative control features show no variation".to_string())
    })?;

    if w.ncols() < k {
        return Err(SconeError::Numerical(format!(
            "Only {} unwanted factors are estimable from {} controls and {} samples, {} requested",
            w.ncols(),
            control_rows.len(),
            log_data.ncols(),
            k
        )));
    }
    Ok(w)
}
