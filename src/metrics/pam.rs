//! Partitioning around medoids (PAM) with the BUILD and SWAP phases.
//!
//! # Reference
//!
//! Kaufman L, Rousseeuw PJ. Finding Groups in Data: An Introduction to Cluster
//! Analysis. Wiley (1990), chapter 2.

use crate::metrics::silhouette::mean_silhouette;
use nalgebra::DMatrix;

/// Upper bound on SWAP iterations.
const MAX_SWAPS: usize = 100;

/// Cluster `n` points into `k` groups from their distance matrix.
///
/// Returns the medoid indices (sorted) and a cluster label per point, or
/// `None` when `k` is zero or exceeds the number of points.
pub fn pam(dist: &DMatrix<f64>, k: usize) -> Option<(Vec<usize>, Vec<usize>)> {
    let n = dist.nrows();
    if k == 0 || k > n {
        return None;
    }

    let mut medoids = build(dist, k);
    let mut cost = total_cost(dist, &medoids);

    for _ in 0..MAX_SWAPS {
        let mut best: Option<(usize, usize, f64)> = None;
        for slot in 0..k {
            for candidate in 0..n {
                if medoids.contains(&candidate) {
                    continue;
                }
                let mut trial = medoids.clone();
                trial[slot] = candidate;
                let trial_cost = total_cost(dist, &trial);
                if trial_cost < best.map_or(cost, |b| b.2) - 1e-12 {
                    best = Some((slot, candidate, trial_cost));
                }
            }
        }
        match best {
            Some((slot, candidate, trial_cost)) => {
                medoids[slot] = candidate;
                cost = trial_cost;
            }
            None => break,
        }
    }

    medoids.sort_unstable();
    let labels = assign(dist, &medoids);
    Some((medoids, labels))
}

/// Best mean silhouette over `k_min..=k_max`, `None` when no k is feasible.
pub fn best_pam_silhouette(dist: &DMatrix<f64>, k_min: usize, k_max: usize) -> Option<f64> {
    let n = dist.nrows();
    if n < 3 {
        return None;
    }
    let k_max = k_max.min(n - 1);
    (k_min.max(2)..=k_max)
        .filter_map(|k| {
            let (_, labels) = pam(dist, k)?;
            mean_silhouette(dist, &labels)
        })
        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
}

/// Greedy BUILD: start from the most central point, then repeatedly add the
/// point that lowers the total cost the most.
fn build(dist: &DMatrix<f64>, k: usize) -> Vec<usize> {
    let n = dist.nrows();
    let mut medoids = Vec::with_capacity(k);

    let first = (0..n)
        .map(|i| (i, dist.row(i).sum()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i);
    medoids.push(first);

    while medoids.len() < k {
        let next = (0..n)
            .filter(|c| !medoids.contains(c))
            .map(|c| {
                let mut trial = medoids.clone();
                trial.push(c);
                (c, total_cost(dist, &trial))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c);
        match next {
            Some(c) => medoids.push(c),
            None => break,
        }
    }
    medoids
}

fn total_cost(dist: &DMatrix<f64>, medoids: &[usize]) -> f64 {
    (0..dist.nrows())
        .map(|i| {
            medoids
                .iter()
                .map(|&m| dist[(i, m)])
                .fold(f64::INFINITY, f64::min)
        })
        .sum()
}

fn assign(dist: &DMatrix<f64>, medoids: &[usize]) -> Vec<usize> {
    (0..dist.nrows())
        .map(|i| {
            // Medoids always belong to their own cluster
            if let Some(own) = medoids.iter().position(|&m| m == i) {
                return own;
            }
            medoids
                .iter()
                .enumerate()
                .min_by(|a, b| dist[(i, *a.1)].total_cmp(&dist[(i, *b.1)]))
                .map_or(0, |(c, _)| c)
        })
        .collect()
}
