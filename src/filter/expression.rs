//! Expression-based feature filtering.

use crate::data::CountMatrix;
use crate::error::{Result, SconeError};
use rayon::prelude::*;

/// Filter features that are expressed in too few samples.
///
/// Keeps a feature when at least `min_prevalence` (a fraction in `[0, 1]`) of
/// samples have a count of at least `min_count`. Rows named in `keep_ids`
/// (typically control probes) are retained regardless.
///
/// # Returns
/// The filtered matrix and the number of features removed.
pub fn filter_expressed(
    counts: &CountMatrix,
    min_count: u64,
    min_prevalence: f64,
    keep_ids: &[String],
) -> Result<(CountMatrix, usize)> {
    if !(0.0..=1.0).contains(&min_prevalence) {
        return Err(SconeError::InvalidParameter(
            "Prevalence threshold must be between 0 and 1".to_string(),
        ));
    }

    let min_samples = ((min_prevalence * counts.n_samples() as f64).ceil() as usize).max(1);

    let keep_indices: Vec<usize> = (0..counts.n_features())
        .into_par_iter()
        .filter(|&row| {
            if keep_ids.contains(&counts.feature_ids()[row]) {
                return true;
            }
            let expressed = counts
                .data()
                .outer_view(row)
                .map(|v| v.iter().filter(|(_, &val)| val >= min_count).count())
                .unwrap_or(0);
            expressed >= min_samples
        })
        .collect();

    if keep_indices.is_empty() {
        return Err(SconeError::EmptyData(format!(
            "No features have count >= {} in {:.1}% of samples",
            min_count,
            min_prevalence * 100.0
        )));
    }

    let removed = counts.n_features() - keep_indices.len();
    Ok((counts.subset_features(&keep_indices)?, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_counts() -> CountMatrix {
        CountMatrix::from_rows(
            &[
                vec![10, 12, 9, 11],
                vec![0, 0, 0, 1],
                vec![5, 0, 6, 0],
                vec![0, 0, 0, 0],
            ],
            vec!["g1".into(), "g2".into(), "g3".into(), "ERCC-1".into()],
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_prevalence_filter() {
        let (filtered, removed) = filter_expressed(&create_test_counts(), 5, 0.5, &[]).unwrap();
        assert_eq!(filtered.feature_ids(), &["g1", "g3"]);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_keep_ids_survive() {
        let keep = vec!["ERCC-1".to_string()];
        let (filtered, _) = filter_expressed(&create_test_counts(), 5, 0.5, &keep).unwrap();
        assert_eq!(filtered.feature_ids(), &["g1", "g3", "ERCC-1"]);
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(filter_expressed(&create_test_counts(), 1, 1.5, &[]).is_err());
    }
}
