//! Association between expression PCs and reference PCs.

use crate::stats;
use nalgebra::DMatrix;

/// Maximum squared Spearman correlation between any column of `expr_pcs` and
/// any column of `reference_pcs` (both samples × components).
///
/// A constant column contributes zero. Returns `None` when either side has no
/// columns or the sample counts differ.
pub fn max_squared_spearman(expr_pcs: &DMatrix<f64>, reference_pcs: &DMatrix<f64>) -> Option<f64> {
    if expr_pcs.ncols() == 0 || reference_pcs.ncols() == 0 {
        return None;
    }
    if expr_pcs.nrows() != reference_pcs.nrows() {
        return None;
    }

    let mut best = 0.0_f64;
    for a in expr_pcs.column_iter() {
        let x: Vec<f64> = a.iter().copied().collect();
        for b in reference_pcs.column_iter() {
            let y: Vec<f64> = b.iter().copied().collect();
            let r = stats::spearman(&x, &y).unwrap_or(0.0);
            best = best.max(r * r);
        }
    }
    Some(best.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_monotone_relation() {
        let expr = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let reference = DMatrix::from_column_slice(4, 2, &[3.0, 1.0, 4.0, 2.0, 10.0, 20.0, 30.0, 400.0]);
        assert_relative_eq!(max_squared_spearman(&expr, &reference).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column_is_zero() {
        let expr = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);
        let reference = DMatrix::from_column_slice(3, 1, &[5.0, 5.0, 5.0]);
        assert_eq!(max_squared_spearman(&expr, &reference), Some(0.0));
    }

    #[test]
    fn test_missing_side() {
        let expr = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);
        assert!(max_squared_spearman(&expr, &DMatrix::zeros(3, 0)).is_none());
    }
}
