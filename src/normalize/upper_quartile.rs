//! Upper-quartile scaling on positive counts.
//!
//! Each sample's factor is the 75th percentile of its strictly positive
//! values, which ignores the zeros that dominate sparse single-cell libraries.
//!
//! # Reference
//!
//! Bullard JH, Purdom E, Hansen KD, Dudoit S. Evaluation of statistical methods
//! for normalization and differential expression in mRNA-Seq experiments.
//! BMC Bioinformatics 11, 94 (2010).

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use crate::normalize::scale_by_factors;
use crate::stats;
use rayon::prelude::*;

/// Per-sample upper quartile of positive values.
pub fn upper_quartile_factors(expr: &ExpressionMatrix) -> Result<Vec<f64>> {
    let factors: Vec<f64> = (0..expr.n_samples())
        .into_par_iter()
        .map(|j| {
            let positive: Vec<f64> = expr
                .data
                .column(j)
                .iter()
                .copied()
                .filter(|&v| v > 0.0)
                .collect();
            stats::quantile(&positive, 0.75)
        })
        .collect();

    if let Some(j) = factors.iter().position(|f| !f.is_finite() || *f <= 0.0) {
        return Err(SconeError::Numerical(format!(
            "Sample {} has no positive counts for upper-quartile scaling",
            expr.sample_ids[j]
        )));
    }
    Ok(factors)
}

/// Apply upper-quartile scaling.
pub fn norm_upper_quartile(expr: &ExpressionMatrix) -> Result<ExpressionMatrix> {
    let factors = upper_quartile_factors(expr)?;
    scale_by_factors(expr, &factors)
}
