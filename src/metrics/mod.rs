//! Quality metrics for normalized matrices.
//!
//! Every metric is computed on `ln(1 + max(x, 0))` of the normalized matrix.
//! PC-based metrics use the leading expression principal components (samples
//! as observations). A metric that cannot be computed for the given inputs is
//! reported as unavailable (`None`) rather than as an error.
//!
//! | Metric     | Higher is better |
//! |------------|------------------|
//! | BIO_SIL    | yes |
//! | BATCH_SIL  | no  |
//! | PAM_SIL    | yes |
//! | EXP_QC_COR | no  |
//! | EXP_UV_COR | no  |
//! | EXP_WV_COR | yes |
//! | RLE_MED    | no  |
//! | RLE_IQR    | no  |

pub mod correlation;
pub mod pam;
pub mod rle;
pub mod silhouette;

pub use correlation::max_squared_spearman;
pub use pam::{best_pam_silhouette, pam};
pub use rle::{rle_metrics, rle_summary};
pub use silhouette::{distance_matrix, mean_silhouette, silhouette_widths};

use crate::data::{ExpressionMatrix, FactorVector};
use crate::error::{Result, SconeError};
use crate::pca::{principal_components, standardize_columns};
use crate::pipeline::EvaluationInputs;
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The fixed metric battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    BioSil,
    BatchSil,
    PamSil,
    ExpQcCor,
    ExpUvCor,
    ExpWvCor,
    RleMed,
    RleIqr,
}

impl Metric {
    /// All metrics in reporting order.
    pub const ALL: [Metric; 8] = [
        Metric::BioSil,
        Metric::BatchSil,
        Metric::PamSil,
        Metric::ExpQcCor,
        Metric::ExpUvCor,
        Metric::ExpWvCor,
        Metric::RleMed,
        Metric::RleIqr,
    ];

    /// Column name used in result tables.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::BioSil => "BIO_SIL",
            Metric::BatchSil => "BATCH_SIL",
            Metric::PamSil => "PAM_SIL",
            Metric::ExpQcCor => "EXP_QC_COR",
            Metric::ExpUvCor => "EXP_UV_COR",
            Metric::ExpWvCor => "EXP_WV_COR",
            Metric::RleMed => "RLE_MED",
            Metric::RleIqr => "RLE_IQR",
        }
    }

    /// Orientation: `1.0` when larger is better, `-1.0` otherwise.
    pub fn sign(&self) -> f64 {
        match self {
            Metric::BioSil | Metric::PamSil | Metric::ExpWvCor => 1.0,
            _ => -1.0,
        }
    }

    pub fn higher_is_better(&self) -> bool {
        self.sign() > 0.0
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Expression PCs used by silhouette and correlation metrics.
    pub n_pcs: usize,
    /// QC PCs for EXP_QC_COR (0 disables the metric).
    pub n_qc_pcs: usize,
    /// Control PCs for EXP_UV_COR and EXP_WV_COR.
    pub n_control_pcs: usize,
    /// Smallest cluster count tried by PAM.
    pub pam_k_min: usize,
    /// Largest cluster count tried by PAM.
    pub pam_k_max: usize,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            n_pcs: 3,
            n_qc_pcs: 0,
            n_control_pcs: 3,
            pam_k_min: 2,
            pam_k_max: 5,
        }
    }
}

impl MetricConfig {
    /// Reject parameter combinations that make every PC metric meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.n_pcs == 0 {
            return Err(SconeError::InvalidParameter(
                "n_pcs must be at least 1".to_string(),
            ));
        }
        if self.n_control_pcs == 0 {
            return Err(SconeError::InvalidParameter(
                "n_control_pcs must be at least 1".to_string(),
            ));
        }
        if self.pam_k_min > self.pam_k_max {
            return Err(SconeError::InvalidParameter(format!(
                "PAM cluster range {}..={} is empty",
                self.pam_k_min, self.pam_k_max
            )));
        }
        Ok(())
    }
}

/// One value per metric, `None` when unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricScores {
    values: BTreeMap<Metric, Option<f64>>,
}

impl MetricScores {
    /// Every metric unavailable (used for failed configurations).
    pub fn unavailable() -> Self {
        Self {
            values: Metric::ALL.iter().map(|&m| (m, None)).collect(),
        }
    }

    /// Value of a metric, if available.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied().flatten()
    }

    /// Set a metric; non-finite values are stored as unavailable.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        self.values.insert(metric, value.filter(|v| v.is_finite()));
    }

    /// Number of available metrics.
    pub fn n_available(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }

    /// `(metric, value)` pairs in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }
}

impl Default for MetricScores {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Scores normalized matrices against fixed reference data.
///
/// Everything that does not depend on the configuration (factor codes and the
/// PCs of the raw controls and QC covariates) is computed once at
/// construction.
#[derive(Debug, Clone)]
pub struct MetricSuite {
    config: MetricConfig,
    bio_codes: Option<Vec<usize>>,
    batch_codes: Option<Vec<usize>>,
    qc_pcs: Option<DMatrix<f64>>,
    uv_pcs: Option<DMatrix<f64>>,
    wv_pcs: Option<DMatrix<f64>>,
}

impl MetricSuite {
    /// Prepare the reference data for a run.
    pub fn new(inputs: &EvaluationInputs, config: MetricConfig) -> Result<Self> {
        config.validate()?;

        let raw_log = inputs.counts().log1p_clamped();
        let control_pcs = |rows: &[usize]| {
            let sub = raw_log.select_rows(rows).transpose();
            principal_components(&sub, config.n_control_pcs)
        };
        let uv_pcs = inputs.negative_rows().and_then(|rows| control_pcs(rows));
        let wv_pcs = inputs.positive_rows().and_then(|rows| control_pcs(rows));

        let qc_pcs = match inputs.qc() {
            Some(qc) if config.n_qc_pcs > 0 => {
                principal_components(&standardize_columns(qc.matrix()), config.n_qc_pcs)
            }
            _ => None,
        };

        debug!(
            "Metric reference data: uv_pcs={:?}, wv_pcs={:?}, qc_pcs={:?}",
            uv_pcs.as_ref().map(|m| m.ncols()),
            wv_pcs.as_ref().map(|m| m.ncols()),
            qc_pcs.as_ref().map(|m| m.ncols())
        );

        Ok(Self {
            bio_codes: contrast_codes(inputs.bio()),
            batch_codes: contrast_codes(inputs.batch()),
            qc_pcs,
            uv_pcs,
            wv_pcs,
            config,
        })
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Compute every metric for one normalized matrix.
    pub fn score(&self, normalized: &ExpressionMatrix) -> MetricScores {
        let mut scores = MetricScores::unavailable();
        let log_data = normalized.log1p_clamped();

        let (rle_med, rle_iqr) = rle_metrics(&log_data);
        scores.set(Metric::RleMed, rle_med);
        scores.set(Metric::RleIqr, rle_iqr);

        let Some(expr_pcs) = principal_components(&log_data.transpose(), self.config.n_pcs) else {
            return scores;
        };
        let dist = distance_matrix(&expr_pcs);

        scores.set(
            Metric::BioSil,
            self.bio_codes.as_ref().and_then(|c| mean_silhouette(&dist, c)),
        );
        scores.set(
            Metric::BatchSil,
            self.batch_codes.as_ref().and_then(|c| mean_silhouette(&dist, c)),
        );
        scores.set(
            Metric::PamSil,
            best_pam_silhouette(&dist, self.config.pam_k_min, self.config.pam_k_max),
        );

        let correlate = |reference: &Option<DMatrix<f64>>| {
            reference
                .as_ref()
                .and_then(|r| max_squared_spearman(&expr_pcs, r))
        };
        scores.set(Metric::ExpQcCor, correlate(&self.qc_pcs));
        scores.set(Metric::ExpUvCor, correlate(&self.uv_pcs));
        scores.set(Metric::ExpWvCor, correlate(&self.wv_pcs));

        scores
    }
}

/// Factor codes when the factor supports silhouette contrast.
fn contrast_codes(factor: Option<&FactorVector>) -> Option<Vec<usize>> {
    factor.filter(|f| f.has_contrast(2)).map(|f| f.codes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, FeatureSet};

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn grouped_inputs() -> EvaluationInputs {
        // Samples 0-2 and 3-5 differ strongly in the first four features
        let rows = vec![
            vec![100, 110, 90, 5, 6, 4],
            vec![80, 85, 95, 3, 2, 4],
            vec![5, 4, 6, 120, 100, 110],
            vec![2, 3, 1, 90, 95, 85],
            vec![50, 55, 45, 52, 48, 50],
            vec![20, 22, 18, 21, 19, 20],
        ];
        let counts = CountMatrix::from_rows(&rows, ids("g", 6), ids("s", 6)).unwrap();
        let labels: Vec<String> = ["a", "a", "a", "b", "b", "b"].iter().map(|s| s.to_string()).collect();
        let batch: Vec<String> = ["x", "y", "x", "y", "x", "y"].iter().map(|s| s.to_string()).collect();
        EvaluationInputs::new(&counts)
            .unwrap()
            .with_bio(FactorVector::new("bio", ids("s", 6), labels).unwrap())
            .unwrap()
            .with_batch(FactorVector::new("batch", ids("s", 6), batch).unwrap())
            .unwrap()
            .with_negative_controls(FeatureSet::new("neg", vec!["g4".into(), "g5".into()]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_metric_signs() {
        assert!(Metric::BioSil.higher_is_better());
        assert!(!Metric::BatchSil.higher_is_better());
        assert!(Metric::ExpWvCor.higher_is_better());
        assert!(!Metric::RleIqr.higher_is_better());
        assert_eq!(serde_json::to_string(&Metric::ExpUvCor).unwrap(), "\"EXP_UV_COR\"");
    }

    #[test]
    fn test_scores_on_grouped_data() {
        let inputs = grouped_inputs();
        let suite = MetricSuite::new(&inputs, MetricConfig::default()).unwrap();
        let scores = suite.score(inputs.counts());

        let bio = scores.get(Metric::BioSil).unwrap();
        let batch = scores.get(Metric::BatchSil).unwrap();
        assert!(bio > 0.5);
        assert!(bio > batch);
        assert!((-1.0..=1.0).contains(&batch));

        let pam = scores.get(Metric::PamSil).unwrap();
        assert!((-1.0..=1.0).contains(&pam));

        let uv = scores.get(Metric::ExpUvCor).unwrap();
        assert!((0.0..=1.0).contains(&uv));

        // Not configured
        assert!(scores.get(Metric::ExpWvCor).is_none());
        assert!(scores.get(Metric::ExpQcCor).is_none());

        assert!(scores.get(Metric::RleMed).unwrap() >= 0.0);
        assert!(scores.get(Metric::RleIqr).unwrap() >= 0.0);
    }

    #[test]
    fn test_identical_samples_degenerate() {
        let counts = CountMatrix::from_rows(&[vec![5, 5, 5], vec![7, 7, 7]], ids("g", 2), ids("s", 3)).unwrap();
        let labels: Vec<String> = ["a", "a", "b"].iter().map(|s| s.to_string()).collect();
        let inputs = EvaluationInputs::new(&counts)
            .unwrap()
            .with_bio(FactorVector::new("bio", ids("s", 3), labels).unwrap())
            .unwrap();
        let suite = MetricSuite::new(&inputs, MetricConfig::default()).unwrap();
        let scores = suite.score(inputs.counts());
        for metric in [Metric::BioSil, Metric::BatchSil, Metric::PamSil, Metric::ExpUvCor] {
            assert!(scores.get(metric).is_none(), "{} should be unavailable", metric);
        }
        assert_eq!(scores.get(Metric::RleMed), Some(0.0));
        assert_eq!(scores.get(Metric::RleIqr), Some(0.0));
    }

    #[test]
    fn test_set_filters_non_finite() {
        let mut scores = MetricScores::unavailable();
        scores.set(Metric::RleMed, Some(f64::NAN));
        scores.set(Metric::RleIqr, Some(0.3));
        assert!(scores.get(Metric::RleMed).is_none());
        assert_eq!(scores.n_available(), 1);
    }

    #[test]
    fn test_config_validation() {
        let config = MetricConfig {
            pam_k_min: 4,
            pam_k_max: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let no_control_pcs = MetricConfig {
            n_control_pcs: 0,
            ..Default::default()
        };
        assert!(matches!(
            no_control_pcs.validate(),
            Err(SconeError::InvalidParameter(_))
        ));
        let no_qc_pcs = MetricConfig {
            n_qc_pcs: 0,
            ..Default::default()
        };
        assert!(no_qc_pcs.validate().is_ok());
        assert!(MetricConfig::default().validate().is_ok());
    }
}
