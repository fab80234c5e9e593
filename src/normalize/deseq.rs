//! DESeq median-of-ratios scaling.
//!
//! # Algorithm
//!
//! 1. For every feature positive in all samples, compute the geometric mean
//!    across samples
//! 2. The factor of a sample is the median over those features of
//!    value / geometric mean
//!
//! # Reference
//!
//! Anders S, Huber W. Differential expression analysis for sequence count
//! data. Genome Biology 11, R106 (2010).

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use crate::normalize::scale_by_factors;
use crate::stats;
use rayon::prelude::*;

/// Median-of-ratios size factors.
pub fn deseq_factors(expr: &ExpressionMatrix) -> Result<Vec<f64>> {
    let n_samples = expr.n_samples();

    // (row, log geometric mean) for features without zeros
    let usable: Vec<(usize, f64)> = (0..expr.n_features())
        .filter_map(|i| {
            let row = expr.data.row(i);
            if row.iter().any(|&v| v <= 0.0) {
                return None;
            }
            let log_mean = row.iter().map(|v| v.ln()).sum::<f64>() / n_samples as f64;
            Some((i, log_mean))
        })
        .collect();

    if usable.is_empty() {
        return Err(SconeError::Numerical(
            "No features are positive in every sample; median of ratios is undefined".to_string(),
        ));
    }

    let factors: Vec<f64> = (0..n_samples)
        .into_par_iter()
        .map(|j| {
            let log_ratios: Vec<f64> = usable
                .iter()
                .map(|&(i, log_mean)| expr.get(i, j).ln() - log_mean)
                .collect();
            stats::median(&log_ratios).exp()
        })
        .collect();

    Ok(factors)
}

/// Apply DESeq scaling.
pub fn norm_deseq(expr: &ExpressionMatrix) -> Result<ExpressionMatrix> {
    let factors = deseq_factors(expr)?;
    scale_by_factors(expr, &factors)
}
