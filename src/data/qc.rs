//! Per-sample quality covariates (library size, alignment rate, ...).

use crate::data::{Metadata, Variable};
use crate::error::{Result, SconeError};
use nalgebra::DMatrix;
use std::collections::HashMap;

/// A samples × covariates matrix of continuous quality measures.
#[derive(Debug, Clone, PartialEq)]
pub struct QcMatrix {
    /// Values (samples × covariates).
    data: DMatrix<f64>,
    /// Covariate names.
    covariate_names: Vec<String>,
    /// Sample identifiers (rows).
    sample_ids: Vec<String>,
}

impl QcMatrix {
    /// Create a QC matrix from its parts.
    pub fn new(data: DMatrix<f64>, covariate_names: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        if data.nrows() != sample_ids.len() {
            return Err(SconeError::DimensionMismatch {
                expected: data.nrows(),
                actual: sample_ids.len(),
            });
        }
        if data.ncols() != covariate_names.len() {
            return Err(SconeError::DimensionMismatch {
                expected: data.ncols(),
                actual: covariate_names.len(),
            });
        }
        if covariate_names.is_empty() {
            return Err(SconeError::EmptyData("QC matrix has no covariates".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SconeError::Numerical("QC matrix contains non-finite values".to_string()));
        }
        Ok(Self {
            data,
            covariate_names,
            sample_ids,
        })
    }

    /// Build from numeric metadata columns, rows ordered like `sample_ids`.
    pub fn from_metadata(metadata: &Metadata, columns: &[String], sample_ids: &[String]) -> Result<Self> {
        let mut data = DMatrix::zeros(sample_ids.len(), columns.len());
        for (j, column) in columns.iter().enumerate() {
            if !metadata.has_column(column) {
                return Err(SconeError::MissingColumn(column.clone()));
            }
            for (i, sid) in sample_ids.iter().enumerate() {
                data[(i, j)] = match metadata.get(sid, column) {
                    Some(Variable::Continuous(v)) => *v,
                    Some(_) => {
                        return Err(SconeError::InvalidParameter(format!(
                            "QC column '{}' is not numeric for sample '{}'",
                            column, sid
                        )))
                    }
                    None => {
                        return Err(SconeError::SampleMismatch(format!(
                            "Sample '{}' not found in metadata",
                            sid
                        )))
                    }
                };
            }
        }
        Self::new(data, columns.to_vec(), sample_ids.to_vec())
    }

    /// Underlying samples × covariates matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Covariate names.
    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    /// Sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of covariates.
    pub fn n_covariates(&self) -> usize {
        self.data.ncols()
    }

    /// Reorder rows to follow `sample_ids`, which must name exactly the
    /// samples of this matrix.
    pub fn aligned_to(&self, sample_ids: &[String]) -> Result<QcMatrix> {
        let mut row_of: HashMap<&str, usize> = HashMap::with_capacity(self.sample_ids.len());
        for (i, sid) in self.sample_ids.iter().enumerate() {
            if row_of.insert(sid.as_str(), i).is_some() {
                return Err(SconeError::SampleMismatch(format!(
                    "QC matrix lists sample '{}' more than once",
                    sid
                )));
            }
        }
        if row_of.len() != sample_ids.len() {
            return Err(SconeError::SampleMismatch(format!(
                "QC matrix has {} samples, count matrix has {}",
                row_of.len(),
                sample_ids.len()
            )));
        }
        let rows = sample_ids
            .iter()
            .map(|sid| {
                row_of.get(sid.as_str()).copied().ok_or_else(|| {
                    SconeError::SampleMismatch(format!("QC matrix has no row for sample '{}'", sid))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            data: self.data.select_rows(&rows),
            covariate_names: self.covariate_names.clone(),
            sample_ids: sample_ids.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_metadata() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tdepth\talign\tbatch").unwrap();
        writeln!(file, "s1\t1000\t0.9\tA").unwrap();
        writeln!(file, "s2\t2000\t0.8\tB").unwrap();
        file.flush().unwrap();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        let sample_ids = vec!["s2".to_string(), "s1".to_string()];
        let qc = QcMatrix::from_metadata(&meta, &["depth".into(), "align".into()], &sample_ids).unwrap();
        assert_eq!(qc.n_covariates(), 2);
        assert_eq!(qc.matrix()[(0, 0)], 2000.0);
        assert_eq!(qc.matrix()[(1, 1)], 0.9);

        assert!(QcMatrix::from_metadata(&meta, &["batch".into()], &sample_ids).is_err());
    }

    #[test]
    fn test_rows_follow_matrix_order() {
        let data = DMatrix::from_row_slice(3, 2, &[3.0, 30.0, 1.0, 10.0, 2.0, 20.0]);
        let qc = QcMatrix::new(
            data,
            vec!["depth".into(), "mito".into()],
            vec!["s3".into(), "s1".into(), "s2".into()],
        )
        .unwrap();
        let order: Vec<String> = vec!["s1".into(), "s2".into(), "s3".into()];
        let aligned = qc.aligned_to(&order).unwrap();
        assert_eq!(aligned.sample_ids(), order.as_slice());
        assert_eq!(aligned.matrix().column(0).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        assert_eq!(aligned.matrix()[(2, 1)], 30.0);

        let other: Vec<String> = vec!["s1".into(), "s2".into(), "s9".into()];
        assert!(matches!(qc.aligned_to(&other), Err(SconeError::SampleMismatch(_))));
        assert!(qc.aligned_to(&order[..2]).is_err());
    }

    #[test]
    fn test_rejects_non_finite() {
        let data = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        assert!(QcMatrix::new(data, vec!["x".into()], vec!["a".into(), "b".into()]).is_err());
    }
}
