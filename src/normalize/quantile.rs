//! Full-quantile normalization.
//!
//! Forces every sample to share one distribution: the mean of the sorted
//! samples. Each value is replaced by the reference value at its rank; tied
//! values receive the average reference value over their tied ranks so equal
//! inputs stay equal.
//!
//! # Reference
//!
//! Bolstad BM, Irizarry RA, Astrand M, Speed TP. A comparison of normalization
//! methods for high density oligonucleotide array data based on variance and
//! bias. Bioinformatics 19, 185-193 (2003).

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use rayon::prelude::*;

/// Apply full-quantile normalization.
pub fn norm_full_quantile(expr: &ExpressionMatrix) -> Result<ExpressionMatrix> {
    let n_features = expr.n_features();
    let n_samples = expr.n_samples();

    if n_features == 0 || n_samples == 0 {
        return Err(SconeError::EmptyData(
            "Cannot apply quantile normalization to empty matrix".to_string(),
        ));
    }

    // Row order of each sample after sorting by value
    let orders: Vec<Vec<usize>> = (0..n_samples)
        .into_par_iter()
        .map(|j| {
            let column = expr.data.column(j);
            let mut order: Vec<usize> = (0..n_features).collect();
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
            order
        })
        .collect();

    let reference: Vec<f64> = (0..n_features)
        .map(|rank| {
            orders
                .iter()
                .enumerate()
                .map(|(j, order)| expr.get(order[rank], j))
                .sum::<f64>()
                / n_samples as f64
        })
        .collect();

    let columns: Vec<Vec<f64>> = orders
        .par_iter()
        .enumerate()
        .map(|(j, order)| {
            let mut out = vec![0.0; n_features];
            let mut start = 0;
            while start < n_features {
                let value = expr.get(order[start], j);
                let mut end = start + 1;
                while end < n_features && expr.get(order[end], j) == value {
                    end += 1;
                }
                let tied_mean =
                    reference[start..end].iter().sum::<f64>() / (end - start) as f64;
                for &row in &order[start..end] {
                    out[row] = tied_mean;
                }
                start = end;
            }
            out
        })
        .collect();

    let mut data = expr.data.clone();
    for (j, column) in columns.into_iter().enumerate() {
        for (i, v) in column.into_iter().enumerate() {
            data[(i, j)] = v;
        }
    }
    Ok(expr.with_data(data))
}
