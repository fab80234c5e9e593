//! Trimmed Mean of M-values (TMM) normalization.
//!
//! TMM is the edgeR scaling method. It calculates per-sample factors that
//! account for compositional differences between samples and is robust to
//! asymmetric differential expression where a subset of features dominates
//! the library.
//!
//! # Algorithm
//!
//! 1. Select a reference sample (by default, the one whose upper quartile of
//!    proportions is closest to the mean upper quartile)
//! 2. For each sample, calculate M-values (log-ratios) and A-values
//!    (average expression) for each feature against the reference
//! 3. Trim extreme values (default: 30% for M, 5% for A)
//! 4. The factor is 2^(precision-weighted mean of the remaining M-values)
//!
//! The scaled output divides each sample by its effective library size
//! (library size × factor) and multiplies by the mean effective library size.
//!
//! # Reference
//!
//! Robinson MD, Oshlack A. A scaling normalization method for differential
//! expression analysis of RNA-seq data. Genome Biology 11, R25 (2010).

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use crate::normalize::{library_sizes, scale_by_factors};
use crate::stats;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for TMM normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmmConfig {
    /// Fraction of M-values to trim from each tail (default: 0.30).
    pub trim_m: f64,
    /// Fraction of A-values to trim from each tail (default: 0.05).
    pub trim_a: f64,
    /// Minimum value for a feature to be used in a pairwise comparison.
    pub min_count: f64,
    /// Reference sample index (None = auto-select).
    pub reference_sample: Option<usize>,
}

impl Default for TmmConfig {
    fn default() -> Self {
        Self {
            trim_m: 0.30,
            trim_a: 0.05,
            min_count: 1.0,
            reference_sample: None,
        }
    }
}

/// Apply TMM scaling with default parameters.
pub fn norm_tmm(expr: &ExpressionMatrix) -> Result<ExpressionMatrix> {
    norm_tmm_with_config(expr, &TmmConfig::default())
}

/// Apply TMM scaling with custom configuration.
pub fn norm_tmm_with_config(expr: &ExpressionMatrix, config: &TmmConfig) -> Result<ExpressionMatrix> {
    let factors = tmm_factors(expr, config)?;
    let effective: Vec<f64> = library_sizes(expr)
        .iter()
        .zip(&factors)
        .map(|(lib, f)| lib * f)
        .collect();
    scale_by_factors(expr, &effective)
}

/// Compute TMM normalization factors (reference sample has factor 1.0).
pub fn tmm_factors(expr: &ExpressionMatrix, config: &TmmConfig) -> Result<Vec<f64>> {
    let n_features = expr.n_features();
    let n_samples = expr.n_samples();

    if n_features == 0 || n_samples == 0 {
        return Err(SconeError::EmptyData(
            "Cannot apply TMM to empty matrix".to_string(),
        ));
    }

    if n_samples < 2 {
        return Err(SconeError::InvalidParameter(
            "TMM requires at least 2 samples".to_string(),
        ));
    }

    if !(0.0..0.5).contains(&config.trim_m) {
        return Err(SconeError::InvalidParameter(
            "trim_m must be in [0, 0.5)".to_string(),
        ));
    }

    if !(0.0..0.5).contains(&config.trim_a) {
        return Err(SconeError::InvalidParameter(
            "trim_a must be in [0, 0.5)".to_string(),
        ));
    }

    let lib_sizes = library_sizes(expr);

    for (j, &lib_size) in lib_sizes.iter().enumerate() {
        if lib_size <= 0.0 {
            return Err(SconeError::Numerical(format!(
                "Sample {} has zero total counts",
                expr.sample_ids[j]
            )));
        }
    }

    let ref_idx = config
        .reference_sample
        .unwrap_or_else(|| select_reference_sample(expr, &lib_sizes));

    if ref_idx >= n_samples {
        return Err(SconeError::InvalidParameter(format!(
            "Reference sample index {} out of bounds (n_samples = {})",
            ref_idx, n_samples
        )));
    }

    let factors = (0..n_samples)
        .into_par_iter()
        .map(|j| {
            if j == ref_idx {
                1.0
            } else {
                calculate_tmm_factor(expr, j, ref_idx, lib_sizes[j], lib_sizes[ref_idx], config)
            }
        })
        .collect();

    Ok(factors)
}

/// Select reference sample as the one with upper quartile closest to mean.
fn select_reference_sample(expr: &ExpressionMatrix, lib_sizes: &[f64]) -> usize {
    let upper_quartiles: Vec<f64> = (0..expr.n_samples())
        .map(|j| {
            let proportions: Vec<f64> = expr
                .data
                .column(j)
                .iter()
                .map(|&v| v / lib_sizes[j])
                .collect();
            stats::quantile(&proportions, 0.75)
        })
        .collect();

    let mean_uq = stats::mean(&upper_quartiles);

    upper_quartiles
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let diff_a = (*a - mean_uq).abs();
            let diff_b = (*b - mean_uq).abs();
            diff_a.total_cmp(&diff_b)
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

/// Calculate TMM factor for a sample relative to reference.
fn calculate_tmm_factor(
    expr: &ExpressionMatrix,
    sample_idx: usize,
    ref_idx: usize,
    sample_lib: f64,
    ref_lib: f64,
    config: &TmmConfig,
) -> f64 {
    // (M, A, weight)
    let mut ma_values: Vec<(f64, f64, f64)> = Vec::new();

    for i in 0..expr.n_features() {
        let count_s = expr.get(i, sample_idx);
        let count_r = expr.get(i, ref_idx);

        if count_s < config.min_count || count_r < config.min_count {
            continue;
        }

        let prop_s = count_s / sample_lib;
        let prop_r = count_r / ref_lib;

        let m = (prop_s / prop_r).log2();
        let a = 0.5 * (prop_s * prop_r).log2();

        // Var(M) ≈ (N-Y)/NY + (N'-Y')/N'Y'
        let var_m = (sample_lib - count_s) / (sample_lib * count_s)
            + (ref_lib - count_r) / (ref_lib * count_r);
        let weight = if var_m > 0.0 { 1.0 / var_m } else { 0.0 };

        if m.is_finite() && a.is_finite() && weight > 0.0 {
            ma_values.push((m, a, weight));
        }
    }

    if ma_values.is_empty() {
        return 1.0;
    }

    ma_values.sort_by(|a, b| a.0.total_cmp(&b.0));
    let n = ma_values.len();
    let trim_m_count = (n as f64 * config.trim_m) as usize;
    let mut trimmed: Vec<(f64, f64, f64)> = if 2 * trim_m_count < n {
        ma_values[trim_m_count..(n - trim_m_count)].to_vec()
    } else {
        ma_values
    };

    trimmed.sort_by(|a, b| a.1.total_cmp(&b.1));
    let n = trimmed.len();
    let trim_a_count = (n as f64 * config.trim_a) as usize;
    let final_values = if 2 * trim_a_count < n {
        &trimmed[trim_a_count..(n - trim_a_count)]
    } else {
        &trimmed[..]
    };

    let sum_weighted_m: f64 = final_values.iter().map(|(m, _, w)| m * w).sum();
    let sum_weights: f64 = final_values.iter().map(|(_, _, w)| w).sum();

    if sum_weights <= 0.0 {
        return 1.0;
    }

    2.0_f64.powf(sum_weighted_m / sum_weights)
}
