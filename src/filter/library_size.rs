//! Library size-based filtering for samples.

use crate::data::CountMatrix;
use crate::error::{Result, SconeError};

/// Filter samples by library size (total counts).
///
/// Removes samples with total counts below `min_reads`. Samples with a zero
/// library cannot be scaled by any method, so they are always dropped.
///
/// # Returns
/// The filtered matrix and the identifiers of the removed samples.
pub fn filter_library_size(counts: &CountMatrix, min_reads: u64) -> Result<(CountMatrix, Vec<String>)> {
    let min = min_reads.max(1);
    let col_sums = counts.col_sums();

    let (keep, removed): (Vec<usize>, Vec<usize>) =
        (0..counts.n_samples()).partition(|&j| col_sums[j] >= min);

    if keep.is_empty() {
        return Err(SconeError::EmptyData(format!(
            "No samples have library size of at least {}",
            min
        )));
    }

    let removed_ids = removed
        .iter()
        .map(|&j| counts.sample_ids()[j].clone())
        .collect();
    Ok((counts.subset_samples(&keep)?, removed_ids))
}
