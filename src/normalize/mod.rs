//! Scaling normalizations, the second pipeline stage.
//!
//! Every method is a pure function of the (possibly imputed) count matrix:
//!
//! - **FQ**: Full-quantile normalization (all samples share one distribution)
//! - **UQ**: Upper quartile of positive counts as the per-sample factor
//! - **TMM**: Trimmed mean of M-values (robust to asymmetric changes)
//! - **DESeq**: Median of ratios to the per-feature geometric mean
//!
//! Factor-based methods divide each sample by its factor and multiply by the
//! mean factor, which keeps the output on the count scale.

pub mod deseq;
pub mod quantile;
pub mod tmm;
pub mod upper_quartile;

pub use deseq::{deseq_factors, norm_deseq};
pub use quantile::norm_full_quantile;
pub use tmm::{norm_tmm, norm_tmm_with_config, tmm_factors, TmmConfig};
pub use upper_quartile::{norm_upper_quartile, upper_quartile_factors};

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use serde::{Deserialize, Serialize};

/// Signature shared by all scaling transforms.
pub type ScalingFn = fn(&ExpressionMatrix) -> Result<ExpressionMatrix>;

/// Scaling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingMethod {
    /// No scaling.
    #[serde(rename = "none")]
    None,
    /// Full-quantile normalization.
    #[serde(rename = "fq")]
    FullQuantile,
    /// Upper quartile of positive counts.
    #[serde(rename = "uq")]
    UpperQuartile,
    /// Trimmed mean of M-values.
    #[serde(rename = "tmm")]
    Tmm,
    /// DESeq median of ratios.
    #[serde(rename = "deseq")]
    Deseq,
}

impl ScalingMethod {
    /// All scaling options in catalog order.
    pub const ALL: [ScalingMethod; 5] = [
        ScalingMethod::None,
        ScalingMethod::FullQuantile,
        ScalingMethod::UpperQuartile,
        ScalingMethod::Tmm,
        ScalingMethod::Deseq,
    ];

    /// Label token for this option.
    pub fn name(&self) -> &'static str {
        match self {
            ScalingMethod::None => "none",
            ScalingMethod::FullQuantile => "fq",
            ScalingMethod::UpperQuartile => "uq",
            ScalingMethod::Tmm => "tmm",
            ScalingMethod::Deseq => "deseq",
        }
    }

    /// Parse a label token.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// The transform behind this option; `None` means pass-through.
    pub fn transform(&self) -> Option<ScalingFn> {
        match self {
            ScalingMethod::None => None,
            ScalingMethod::FullQuantile => Some(norm_full_quantile),
            ScalingMethod::UpperQuartile => Some(norm_upper_quartile),
            ScalingMethod::Tmm => Some(norm_tmm),
            ScalingMethod::Deseq => Some(norm_deseq),
        }
    }
}

/// Divide each sample by its factor and multiply by the mean factor.
pub fn scale_by_factors(expr: &ExpressionMatrix, factors: &[f64]) -> Result<ExpressionMatrix> {
    if factors.len() != expr.n_samples() {
        return Err(SconeError::DimensionMismatch {
            expected: expr.n_samples(),
            actual: factors.len(),
        });
    }
    if let Some((j, f)) = factors
        .iter()
        .enumerate()
        .find(|(_, f)| !f.is_finite() || **f <= 0.0)
    {
        return Err(SconeError::Numerical(format!(
            "Scale factor for sample {} is {}",
            expr.sample_ids[j], f
        )));
    }

    let mean_factor = factors.iter().sum::<f64>() / factors.len() as f64;
    let mut data = expr.data.clone();
    for (j, &factor) in factors.iter().enumerate() {
        let multiplier = mean_factor / factor;
        data.column_mut(j).iter_mut().for_each(|v| *v *= multiplier);
    }
    Ok(expr.with_data(data))
}

/// Column sums of a dense expression matrix.
pub(crate) fn library_sizes(expr: &ExpressionMatrix) -> Vec<f64> {
    (0..expr.n_samples())
        .map(|j| expr.data.column(j).sum())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_names_roundtrip() {
        for method in ScalingMethod::ALL {
            assert_eq!(ScalingMethod::from_name(method.name()), Some(method));
        }
        assert!(ScalingMethod::None.transform().is_none());
        assert!(ScalingMethod::Deseq.transform().is_some());
    }

    #[test]
    fn test_scale_by_factors() {
        let expr = ExpressionMatrix::new(
            DMatrix::from_row_slice(1, 2, &[10.0, 40.0]),
            vec!["g".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap();
        let scaled = scale_by_factors(&expr, &[1.0, 4.0]).unwrap();
        // mean factor 2.5
        assert_relative_eq!(scaled.get(0, 0), 25.0);
        assert_relative_eq!(scaled.get(0, 1), 25.0);
    }

    #[test]
    fn test_scale_rejects_zero_factor() {
        let expr = ExpressionMatrix::new(
            DMatrix::from_row_slice(1, 2, &[10.0, 40.0]),
            vec!["g".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap();
        assert!(scale_by_factors(&expr, &[1.0, 0.0]).is_err());
    }
}
