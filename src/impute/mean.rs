//! Mean imputation of zero counts.

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use rayon::prelude::*;

/// Replace zeros by the mean of the feature's non-zero values.
///
/// Zeros in sparse count data are partly technical drop-outs. This treats
/// every zero as missing and fills it with the average of the observed
/// (non-zero) values of the same feature. A feature that is zero in every
/// sample stays zero.
///
/// # Arguments
/// * `expr` - Expression matrix on the count scale (non-negative)
///
/// # Returns
/// A new matrix with the same identifiers and no zeros outside all-zero rows.
pub fn impute_mean_zeros(expr: &ExpressionMatrix) -> Result<ExpressionMatrix> {
    let n_features = expr.n_features();

    let rows: Vec<Vec<f64>> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            let row = expr.row(i);
            let (sum, n) = row
                .iter()
                .filter(|&&v| v != 0.0)
                .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
            if n == 0 {
                return row;
            }
            let mean = sum / n as f64;
            row.into_iter()
                .map(|v| if v == 0.0 { mean } else { v })
                .collect()
        })
        .collect();

    let mut data = expr.data.clone();
    for (i, row) in rows.into_iter().enumerate() {
        for (j, v) in row.into_iter().enumerate() {
            if !v.is_finite() {
                return Err(SconeError::Numerical(format!(
                    "Imputed value for feature {} sample {} is not finite",
                    expr.feature_ids[i], expr.sample_ids[j]
                )));
            }
            data[(i, j)] = v;
        }
    }

    Ok(expr.with_data(data))
}
