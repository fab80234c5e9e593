//! Principal components by singular value decomposition.
//!
//! Shared by unwanted-variation estimation (RUVg, QC factors) and the
//! PC-based quality metrics.

use nalgebra::{DMatrix, SVD};

/// Relative tolerance below which a component is treated as numerically zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// Column-centre `x` (observations × variables).
pub fn center_columns(x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut centered = x.clone();
    for mut column in centered.column_iter_mut() {
        let mean = column.mean();
        column.iter_mut().for_each(|v| *v -= mean);
    }
    centered
}

/// Column-centre and scale `x` to unit variance.
///
/// Constant columns are left at zero after centring.
pub fn standardize_columns(x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut scaled = center_columns(x);
    let n = x.nrows();
    if n < 2 {
        return scaled;
    }
    for mut column in scaled.column_iter_mut() {
        let sd = (column.norm_squared() / (n - 1) as f64).sqrt();
        if sd > 0.0 {
            column.iter_mut().for_each(|v| *v /= sd);
        }
    }
    scaled
}

/// Leading principal component scores of `x` (observations × variables).
///
/// The matrix is column-centred, then at most `k` components are kept, capped
/// at `n_obs - 1` and `n_vars` and at the numerical rank. Scores are the left
/// singular vectors scaled by their singular values (observations × kept).
/// Returns `None` when the centred matrix has no variance or `k` is zero.
pub fn principal_components(x: &DMatrix<f64>, k: usize) -> Option<DMatrix<f64>> {
    let (n_obs, n_vars) = x.shape();
    let k = k.min(n_obs.saturating_sub(1)).min(n_vars);
    if k == 0 {
        return None;
    }

    let centered = center_columns(x);
    let scale = x.norm_squared().max(1.0);
    if centered.norm_squared() <= scale * RANK_TOLERANCE * RANK_TOLERANCE {
        return None;
    }

    let svd = SVD::new(centered, true, false);
    let u = svd.u?;
    let singular_values = svd.singular_values;

    let mut order: Vec<usize> = (0..singular_values.len()).collect();
    order.sort_by(|&a, &b| singular_values[b].total_cmp(&singular_values[a]));
    let largest = singular_values[order[0]];
    if !largest.is_finite() || largest <= 0.0 {
        return None;
    }

    let kept: Vec<usize> = order
        .into_iter()
        .take(k)
        .filter(|&c| singular_values[c] > largest * RANK_TOLERANCE)
        .collect();

    let mut scores = DMatrix::zeros(n_obs, kept.len());
    for (out, &c) in kept.iter().enumerate() {
        let s = singular_values[c];
        for i in 0..n_obs {
            scores[(i, out)] = u[(i, c)] * s;
        }
    }
    Some(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
        let c = center_columns(&x);
        assert_relative_eq!(c.column(0).sum(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(c[(0, 1)], -10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_constant_column() {
        let x = DMatrix::from_row_slice(3, 2, &[5.0, 1.0, 5.0, 2.0, 5.0, 3.0]);
        let s = standardize_columns(&x);
        assert!(s.column(0).iter().all(|v| *v == 0.0));
        assert_relative_eq!(s[(2, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rank_one_data() {
        // Every variable is a multiple of the same pattern
        let x = DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0, 2.0, 3.0, //
                2.0, 4.0, 6.0, //
                3.0, 6.0, 9.0, //
                4.0, 8.0, 12.0,
            ],
        );
        let scores = principal_components(&x, 3).unwrap();
        assert_eq!(scores.ncols(), 1);
        assert_relative_eq!(scores.column(0).sum(), 0.0, epsilon = 1e-9);
        // Variance of the single PC carries all the variance
        assert_relative_eq!(
            scores.norm_squared(),
            center_columns(&x).norm_squared(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_component_cap() {
        let x = DMatrix::from_row_slice(3, 4, &[
            1.0, 0.0, 2.0, 5.0, //
            0.0, 3.0, 1.0, 1.0, //
            4.0, 1.0, 0.0, 2.0,
        ]);
        let scores = principal_components(&x, 10).unwrap();
        assert_eq!(scores.shape(), (3, 2));
    }

    #[test]
    fn test_constant_matrix_has_no_components() {
        let x = DMatrix::from_element(3, 2, 1.7917594692280550);
        assert!(principal_components(&x, 3).is_none());
        assert!(principal_components(&x, 0).is_none());
    }
}
