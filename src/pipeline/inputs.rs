//! Read-only inputs shared by every configuration of a run.

use crate::data::{CountMatrix, ExpressionMatrix, FactorVector, FeatureSet, QcMatrix};
use crate::error::{Result, SconeError};

/// The count matrix plus the optional factors, control sets and QC matrix
/// that gate catalog options and feed the metrics.
///
/// Every co-indexed entity is checked against the matrix when it is attached.
/// Factors and QC rows must cover exactly the matrix samples and are stored
/// reordered to the matrix column order. Control sets must be subsets of the
/// matrix rows.
#[derive(Debug, Clone)]
pub struct EvaluationInputs {
    counts: ExpressionMatrix,
    bio: Option<FactorVector>,
    batch: Option<FactorVector>,
    negative_controls: Option<(FeatureSet, Vec<usize>)>,
    positive_controls: Option<(FeatureSet, Vec<usize>)>,
    qc: Option<QcMatrix>,
}

impl EvaluationInputs {
    /// Start from an (already filtered) count matrix.
    pub fn new(counts: &CountMatrix) -> Result<Self> {
        Self::from_expression(counts.to_expression())
    }

    /// Start from a dense matrix of non-negative values.
    pub fn from_expression(counts: ExpressionMatrix) -> Result<Self> {
        if counts.n_features() == 0 || counts.n_samples() == 0 {
            return Err(SconeError::EmptyData(
                "Count matrix has no features or no samples".to_string(),
            ));
        }
        if counts.data.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SconeError::InvalidParameter(
                "Counts must be finite and non-negative".to_string(),
            ));
        }
        Ok(Self {
            counts,
            bio: None,
            batch: None,
            negative_controls: None,
            positive_controls: None,
            qc: None,
        })
    }

    /// Attach the biological factor.
    pub fn with_bio(mut self, factor: FactorVector) -> Result<Self> {
        self.bio = Some(factor.aligned_to(&self.counts.sample_ids)?);
        Ok(self)
    }

    /// Attach the batch factor.
    pub fn with_batch(mut self, factor: FactorVector) -> Result<Self> {
        self.batch = Some(factor.aligned_to(&self.counts.sample_ids)?);
        Ok(self)
    }

    /// Attach negative control features (drive RUVg and EXP_UV_COR).
    pub fn with_negative_controls(mut self, set: FeatureSet) -> Result<Self> {
        let rows = set.resolve(&self.counts.feature_ids)?;
        self.negative_controls = Some((set, rows));
        Ok(self)
    }

    /// Attach positive control features (drive EXP_WV_COR).
    pub fn with_positive_controls(mut self, set: FeatureSet) -> Result<Self> {
        let rows = set.resolve(&self.counts.feature_ids)?;
        self.positive_controls = Some((set, rows));
        Ok(self)
    }

    /// Attach QC covariates (drive `qc_k=` and EXP_QC_COR).
    pub fn with_qc(mut self, qc: QcMatrix) -> Result<Self> {
        self.qc = Some(qc.aligned_to(&self.counts.sample_ids)?);
        Ok(self)
    }

    pub fn counts(&self) -> &ExpressionMatrix {
        &self.counts
    }

    pub fn bio(&self) -> Option<&FactorVector> {
        self.bio.as_ref()
    }

    pub fn batch(&self) -> Option<&FactorVector> {
        self.batch.as_ref()
    }

    pub fn negative_controls(&self) -> Option<&FeatureSet> {
        self.negative_controls.as_ref().map(|(set, _)| set)
    }

    /// Row indices of the negative controls, sorted.
    pub fn negative_rows(&self) -> Option<&[usize]> {
        self.negative_controls.as_ref().map(|(_, rows)| rows.as_slice())
    }

    pub fn positive_controls(&self) -> Option<&FeatureSet> {
        self.positive_controls.as_ref().map(|(set, _)| set)
    }

    /// Row indices of the positive controls, sorted.
    pub fn positive_rows(&self) -> Option<&[usize]> {
        self.positive_controls.as_ref().map(|(_, rows)| rows.as_slice())
    }

    pub fn qc(&self) -> Option<&QcMatrix> {
        self.qc.as_ref()
    }
}
