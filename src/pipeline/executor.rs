//! Applies one configuration's chain of transforms to the counts.

use crate::adjust::{qc_factors, remove_unwanted, ruvg_factors, UvAdjust};
use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use crate::pipeline::{EvaluationInputs, PipelineConfiguration};
use log::trace;
use nalgebra::DMatrix;

/// Runs imputation, scaling, unwanted-variation removal, batch and biological
/// adjustment in that order.
///
/// Imputation and scaling work on the count scale. When any adjustment stage
/// is active the matrix moves to `ln(1 + x)`, one regression removes W and the
/// batch indicators while protecting the biological indicators, and the
/// result is mapped back with `exp(x) - 1`. Any stage failure or non-finite
/// output becomes [`SconeError::Transform`] naming the stage.
#[derive(Debug, Clone)]
pub struct TransformExecutor<'a> {
    inputs: &'a EvaluationInputs,
    rezero: bool,
}

impl<'a> TransformExecutor<'a> {
    pub fn new(inputs: &'a EvaluationInputs) -> Self {
        Self {
            inputs,
            rezero: false,
        }
    }

    /// Restore zeros of the input after scaling.
    pub fn with_rezero(mut self, rezero: bool) -> Self {
        self.rezero = rezero;
        self
    }

    /// Produce the normalized matrix for `config`.
    pub fn execute(&self, config: &PipelineConfiguration) -> Result<ExpressionMatrix> {
        let counts = self.inputs.counts();
        let mut expr = counts.clone();

        if let Some(impute) = config.imputation.transform() {
            expr = impute(&expr).map_err(|e| SconeError::transform("imputation", e.to_string()))?;
            check_finite(&expr, "imputation")?;
        }

        if let Some(scale) = config.scaling.transform() {
            expr = scale(&expr).map_err(|e| SconeError::transform("scaling", e.to_string()))?;
            if self.rezero {
                for (v, original) in expr.data.iter_mut().zip(counts.data.iter()) {
                    if *original == 0.0 {
                        *v = 0.0;
                    }
                }
            }
            check_finite(&expr, "scaling")?;
        }

        if !config.adjusts() {
            return Ok(expr);
        }

        let stage = adjustment_stage(config);
        let log_data = expr.data.map(|x| x.ln_1p());
        if log_data.iter().any(|v| !v.is_finite()) {
            return Err(SconeError::transform(stage, "log transform produced non-finite values"));
        }

        let n_samples = expr.n_samples();
        let w = self
            .unwanted_factors(&config.uv, &log_data)
            .map_err(|e| SconeError::transform("uv", e.to_string()))?;

        let mut unwanted_columns: Vec<Vec<f64>> = w
            .column_iter()
            .map(|c| c.iter().copied().collect())
            .collect();
        if config.batch.is_active() {
            let batch = self.inputs.batch().ok_or_else(|| {
                SconeError::Configuration("Batch adjustment requested without a batch factor".to_string())
            })?;
            unwanted_columns.extend(batch.dummy_columns());
        }
        let protected_columns = if config.bio.is_active() {
            self.inputs
                .bio()
                .ok_or_else(|| {
                    SconeError::Configuration(
                        "Biological adjustment requested without a biological factor".to_string(),
                    )
                })?
                .dummy_columns()
        } else {
            Vec::new()
        };
        trace!(
            "{}: {} unwanted and {} protected design columns",
            config.label(),
            unwanted_columns.len(),
            protected_columns.len()
        );

        let adjusted = remove_unwanted(
            &log_data,
            &design_block(n_samples, &protected_columns),
            &design_block(n_samples, &unwanted_columns),
        )
        .map_err(|e| SconeError::transform(stage, e.to_string()))?;

        let result = expr.with_data(adjusted.map(|x| x.exp_m1()));
        check_finite(&result, stage)?;
        Ok(result)
    }

    fn unwanted_factors(&self, uv: &UvAdjust, log_data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        match uv {
            UvAdjust::None => Ok(DMatrix::zeros(log_data.ncols(), 0)),
            UvAdjust::Ruv { k } => {
                let rows = self.inputs.negative_rows().ok_or_else(|| {
                    SconeError::Configuration("RUVg requested without negative controls".to_string())
                })?;
                ruvg_factors(log_data, rows, *k)
            }
            UvAdjust::Qc { k } => {
                let qc = self.inputs.qc().ok_or_else(|| {
                    SconeError::Configuration("QC adjustment requested without a QC matrix".to_string())
                })?;
                qc_factors(qc, *k)
            }
        }
    }
}

/// Name of the last active adjustment stage, blamed for a failed joint fit.
fn adjustment_stage(config: &PipelineConfiguration) -> &'static str {
    if config.bio.is_active() {
        "bio"
    } else if config.batch.is_active() {
        "batch"
    } else {
        "uv"
    }
}

fn design_block(n_samples: usize, columns: &[Vec<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(n_samples, columns.len(), |i, j| columns[j][i])
}

fn check_finite(expr: &ExpressionMatrix, stage: &str) -> Result<()> {
    match expr.first_non_finite() {
        Some((i, j)) => Err(SconeError::transform(
            stage,
            format!(
                "non-finite value for feature '{}' in sample '{}'",
                expr.feature_ids[i], expr.sample_ids[j]
            ),
        )),
        None => Ok(()),
    }
}
