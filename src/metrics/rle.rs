//! Relative log expression (RLE).
//!
//! Each value is compared with its feature's median across samples. Well
//! normalized samples have RLE distributions centred on zero with small
//! spread.

use crate::stats;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Per-sample median and inter-quartile range of RLE on a log-scale
/// features × samples matrix.
pub fn rle_summary(log_data: &DMatrix<f64>) -> Option<(Vec<f64>, Vec<f64>)> {
    let (n_features, n_samples) = log_data.shape();
    if n_features == 0 || n_samples == 0 {
        return None;
    }

    let feature_medians: Vec<f64> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = log_data.row(i).iter().copied().collect();
            stats::median(&row)
        })
        .collect();

    let (medians, iqrs): (Vec<f64>, Vec<f64>) = (0..n_samples)
        .into_par_iter()
        .map(|j| {
            let rle: Vec<f64> = log_data
                .column(j)
                .iter()
                .zip(&feature_medians)
                .map(|(v, m)| v - m)
                .collect();
            (stats::median(&rle), stats::interquartile_range(&rle))
        })
        .unzip();

    Some((medians, iqrs))
}

/// RLE_MED and RLE_IQR: mean squared per-sample median and mean per-sample IQR.
pub fn rle_metrics(log_data: &DMatrix<f64>) -> (Option<f64>, Option<f64>) {
    let Some((medians, iqrs)) = rle_summary(log_data) else {
        return (None, None);
    };
    let med = stats::mean(&medians.iter().map(|m| m * m).collect::<Vec<_>>());
    let iqr = stats::mean(&iqrs);
    (
        med.is_finite().then_some(med.max(0.0)),
        iqr.is_finite().then_some(iqr.max(0.0)),
    )
}
