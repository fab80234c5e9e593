//! Silhouette width on Euclidean distances.
//!
//! For sample i with mean distance `a` to its own cluster and smallest mean
//! distance `b` to another cluster:
//!
//! ```text
//! s(i) = (b - a) / max(a, b)
//! ```
//!
//! Singletons score 0, as do samples with `max(a, b) = 0`.

use nalgebra::DMatrix;

/// Pairwise Euclidean distances between the rows of `points`.
pub fn distance_matrix(points: &DMatrix<f64>) -> DMatrix<f64> {
    let n = points.nrows();
    let mut dist = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let d = (points.row(i) - points.row(j)).norm();
            dist[(i, j)] = d;
            dist[(j, i)] = d;
        }
    }
    dist
}

/// Per-sample silhouette widths for cluster assignments `labels`.
///
/// Returns `None` unless there are at least two clusters.
pub fn silhouette_widths(dist: &DMatrix<f64>, labels: &[usize]) -> Option<Vec<f64>> {
    let n = labels.len();
    let n_clusters = labels.iter().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; n_clusters];
    for &l in labels {
        sizes[l] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return None;
    }

    let widths = (0..n)
        .map(|i| {
            let own = labels[i];
            if sizes[own] < 2 {
                return 0.0;
            }
            let mut sums = vec![0.0; n_clusters];
            for j in 0..n {
                if j != i {
                    sums[labels[j]] += dist[(i, j)];
                }
            }
            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..n_clusters)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom <= 0.0 || !denom.is_finite() {
                0.0
            } else {
                ((b - a) / denom).clamp(-1.0, 1.0)
            }
        })
        .collect();
    Some(widths)
}

/// Mean silhouette width, `None` when undefined.
pub fn mean_silhouette(dist: &DMatrix<f64>, labels: &[usize]) -> Option<f64> {
    let widths = silhouette_widths(dist, labels)?;
    let mean = widths.iter().sum::<f64>() / widths.len() as f64;
    mean.is_finite().then_some(mean)
}
