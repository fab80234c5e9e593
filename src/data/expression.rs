//! Dense expression matrix shared by every transform and metric.

use crate::error::{Result, SconeError};
use nalgebra::DMatrix;

/// A dense features × samples matrix with identifiers.
///
/// Transforms consume and produce this type. The executor's output for one
/// pipeline configuration (the normalized matrix) is an `ExpressionMatrix`
/// with the same identifiers as the input counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    /// The values (features × samples).
    pub data: DMatrix<f64>,
    /// Feature identifiers.
    pub feature_ids: Vec<String>,
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create an expression matrix, checking identifier dimensions.
    pub fn new(data: DMatrix<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        if data.nrows() != feature_ids.len() {
            return Err(SconeError::DimensionMismatch {
                expected: data.nrows(),
                actual: feature_ids.len(),
            });
        }
        if data.ncols() != sample_ids.len() {
            return Err(SconeError::DimensionMismatch {
                expected: data.ncols(),
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Replace the values, keeping identifiers.
    pub fn with_data(&self, data: DMatrix<f64>) -> Self {
        debug_assert_eq!(data.shape(), self.data.shape());
        Self {
            data,
            feature_ids: self.feature_ids.clone(),
            sample_ids: self.sample_ids.clone(),
        }
    }

    /// Get the value for a feature and sample.
    pub fn get(&self, feature: usize, sample: usize) -> f64 {
        self.data[(feature, sample)]
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row (feature) as a vector.
    pub fn row(&self, feature: usize) -> Vec<f64> {
        self.data.row(feature).iter().cloned().collect()
    }

    /// Position of the first non-finite entry, if any.
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        let (n_features, n_samples) = self.data.shape();
        for j in 0..n_samples {
            for i in 0..n_features {
                if !self.data[(i, j)].is_finite() {
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// `ln(1 + max(x, 0))`, the log representation used for scoring.
    pub fn log1p_clamped(&self) -> DMatrix<f64> {
        self.data.map(|x| x.max(0.0).ln_1p())
    }
}
