//! Count matrix with sparse storage for gene-expression counts.

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use sprs::{CsMat, TriMat};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A sparse count matrix storing feature counts across samples.
///
/// Rows represent features (genes and control probes), columns represent
/// samples. Uses CSR (Compressed Sparse Row) format for efficient row-wise
/// operations. Row and column identifiers are unique.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Sparse matrix in CSR format (features × samples)
    data: CsMat<u64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new CountMatrix from a sparse matrix and identifiers.
    pub fn new(
        data: CsMat<u64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(SconeError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(SconeError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        ensure_unique(&feature_ids)?;
        ensure_unique(&sample_ids)?;

        // Keep CSR regardless of how the caller assembled the matrix.
        let data = if data.is_csr() { data } else { data.to_csr() };

        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a count matrix from dense row-major rows (one `Vec` per feature).
    pub fn from_rows(
        rows: &[Vec<u64>],
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_samples));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_samples {
                return Err(SconeError::DimensionMismatch {
                    expected: n_samples,
                    actual: row.len(),
                });
            }
            for (j, &val) in row.iter().enumerate() {
                if val > 0 {
                    tri_mat.add_triplet(i, j, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Load a count matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is feature ID header)
    /// - Subsequent rows: feature ID followed by counts
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| SconeError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.trim_end().split('\t').collect();
        if header.len() < 2 {
            return Err(SconeError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let row_idx = feature_ids.len();
            let fields: Vec<&str> = line.trim_end().split('\t').collect();
            if fields.len() != n_samples + 1 {
                return Err(SconeError::DimensionMismatch {
                    expected: n_samples,
                    actual: fields.len().saturating_sub(1),
                });
            }
            feature_ids.push(fields[0].to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                let value: u64 = value_str.trim().parse().map_err(|_| SconeError::InvalidCount {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value > 0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        let n_features = feature_ids.len();
        if n_features == 0 {
            return Err(SconeError::EmptyData("No features in TSV".to_string()));
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying sparse matrix.
    #[inline]
    pub fn data(&self) -> &CsMat<u64> {
        &self.data
    }

    /// Compute column sums (library sizes per sample).
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Subset the matrix to include only specified features (by index).
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        let mut tri_mat = TriMat::new((indices.len(), self.n_samples()));
        let mut new_feature_ids = Vec::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_features() {
                return Err(SconeError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    old_row
                )));
            }
            new_feature_ids.push(self.feature_ids[old_row].clone());

            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), new_feature_ids, self.sample_ids.clone())
    }

    /// Subset the matrix to include only specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let mut col_map = vec![None; self.n_samples()];
        let mut new_sample_ids = Vec::with_capacity(indices.len());

        for (new_col, &old_col) in indices.iter().enumerate() {
            if old_col >= self.n_samples() {
                return Err(SconeError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            col_map[old_col] = Some(new_col);
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let mut tri_mat = TriMat::new((self.n_features(), indices.len()));
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(new_col) = col_map[old_col] {
                    tri_mat.add_triplet(row, new_col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), self.feature_ids.clone(), new_sample_ids)
    }

    /// Convert to a dense matrix (f64).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_features(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val as f64;
            }
        }
        dense
    }

    /// Convert to a dense expression matrix carrying the same identifiers.
    pub fn to_expression(&self) -> ExpressionMatrix {
        ExpressionMatrix {
            data: self.to_dense(),
            feature_ids: self.feature_ids.clone(),
            sample_ids: self.sample_ids.clone(),
        }
    }
}

fn ensure_unique(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(SconeError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_matrix() -> CountMatrix {
        // 3 features × 4 samples
        let mut tri_mat = TriMat::new((3, 4));
        tri_mat.add_triplet(0, 0, 10);
        tri_mat.add_triplet(0, 1, 20);
        tri_mat.add_triplet(0, 3, 5);
        tri_mat.add_triplet(1, 0, 100);
        tri_mat.add_triplet(1, 1, 200);
        tri_mat.add_triplet(1, 2, 150);
        tri_mat.add_triplet(1, 3, 175);
        tri_mat.add_triplet(2, 0, 1);

        let feature_ids = vec!["GAPDH".to_string(), "ACTB".to_string(), "ERCC-1".to_string()];
        let sample_ids = vec![
            "cell1".to_string(),
            "cell2".to_string(),
            "cell3".to_string(),
            "cell4".to_string(),
        ];

        CountMatrix::new(tri_mat.to_csr(), feature_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mat = create_test_matrix();
        assert_eq!(mat.n_features(), 3);
        assert_eq!(mat.n_samples(), 4);
        assert_eq!(mat.data().nnz(), 8);
        assert!(mat.data().is_csr());
    }

    #[test]
    fn test_dense_values() {
        let dense = create_test_matrix().to_dense();
        assert_eq!(dense[(0, 0)], 10.0);
        assert_eq!(dense[(0, 2)], 0.0);
        assert_eq!(dense[(2, 1)], 0.0);
    }

    #[test]
    fn test_library_sizes() {
        let mat = create_test_matrix();
        assert_eq!(mat.col_sums(), vec![111, 220, 150, 180]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rows = vec![vec![1, 2], vec![3, 4]];
        let err = CountMatrix::from_rows(
            &rows,
            vec!["g1".into(), "g1".into()],
            vec!["s1".into(), "s2".into()],
        )
        .unwrap_err();
        assert!(matches!(err, SconeError::DuplicateId(id) if id == "g1"));
    }

    #[test]
    fn test_from_rows_matches_dense() {
        let rows = vec![vec![0, 2, 3], vec![4, 0, 6]];
        let mat = CountMatrix::from_rows(
            &rows,
            vec!["g1".into(), "g2".into()],
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap();
        let dense = mat.to_dense();
        assert_eq!(dense[(0, 0)], 0.0);
        assert_eq!(dense[(1, 2)], 6.0);
        assert_eq!(dense[(1, 1)], 0.0);
    }

    #[test]
    fn test_from_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tcell1\tcell2").unwrap();
        writeln!(file, "GAPDH\t10\t0").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "ERCC-1\t0\t3").unwrap();
        file.flush().unwrap();

        let mat = CountMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(mat.feature_ids(), &["GAPDH", "ERCC-1"]);
        assert_eq!(mat.sample_ids(), &["cell1", "cell2"]);
        assert_eq!(mat.col_sums(), vec![10, 3]);
    }

    #[test]
    fn test_from_tsv_rejects_bad_counts() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tcell1\tcell2").unwrap();
        writeln!(file, "GAPDH\t10\t-1").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            CountMatrix::from_tsv(file.path()),
            Err(SconeError::InvalidCount { row: 0, col: 1, .. })
        ));

        let mut ragged = NamedTempFile::new().unwrap();
        writeln!(ragged, "feature_id\tcell1\tcell2").unwrap();
        writeln!(ragged, "GAPDH\t10").unwrap();
        ragged.flush().unwrap();
        assert!(CountMatrix::from_tsv(ragged.path()).is_err());
    }

    #[test]
    fn test_subset_features_and_samples() {
        let mat = create_test_matrix();
        let features = mat.subset_features(&[0, 2]).unwrap();
        assert_eq!(features.feature_ids(), &["GAPDH", "ERCC-1"]);
        assert_eq!(features.to_dense()[(1, 0)], 1.0);

        let samples = mat.subset_samples(&[1, 3]).unwrap();
        assert_eq!(samples.sample_ids(), &["cell2", "cell4"]);
        let dense = samples.to_dense();
        assert_eq!(dense[(0, 0)], 20.0);
        assert_eq!(dense[(0, 1)], 5.0);
    }

    #[test]
    fn test_to_expression_keeps_ids() {
        let mat = create_test_matrix();
        let expr = mat.to_expression();
        assert_eq!(expr.n_features(), 3);
        assert_eq!(expr.sample_ids, mat.sample_ids());
        assert_eq!(expr.get(1, 2), 150.0);
    }
}
