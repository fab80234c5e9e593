//! Per-stage option menus.

use crate::adjust::{BatchAdjust, BioAdjust, UvAdjust};
use crate::error::{Result, SconeError};
use crate::impute::ImputeMethod;
use crate::normalize::ScalingMethod;
use crate::pipeline::EvaluationInputs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The selectable options of every pipeline stage, in catalog order.
///
/// Catalogs are plain data and round-trip through YAML using the label
/// tokens, e.g.
///
/// ```yaml
/// imputation: [none, impute_mean]
/// scaling: [none, deseq]
/// uv: [no_uv, ruv_k=1]
/// bio: [no_bio, bio]
/// batch: [no_batch, batch]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCatalog {
    pub imputation: Vec<ImputeMethod>,
    pub scaling: Vec<ScalingMethod>,
    pub uv: Vec<UvAdjust>,
    pub bio: Vec<BioAdjust>,
    pub batch: Vec<BatchAdjust>,
}

impl StepCatalog {
    /// Every built-in option, with `ruv_k=` and `qc_k=` for `1..=max_k`.
    pub fn default_for(max_k: usize) -> Self {
        let mut uv = vec![UvAdjust::None];
        uv.extend((1..=max_k).map(|k| UvAdjust::Ruv { k }));
        uv.extend((1..=max_k).map(|k| UvAdjust::Qc { k }));
        Self {
            imputation: ImputeMethod::ALL.to_vec(),
            scaling: ScalingMethod::ALL.to_vec(),
            uv,
            bio: BioAdjust::ALL.to_vec(),
            batch: BatchAdjust::ALL.to_vec(),
        }
    }

    /// Only the no-op option in every stage.
    pub fn identity() -> Self {
        Self {
            imputation: vec![ImputeMethod::None],
            scaling: vec![ScalingMethod::None],
            uv: vec![UvAdjust::None],
            bio: vec![BioAdjust::No],
            batch: vec![BatchAdjust::No],
        }
    }

    /// Drop the options whose prerequisite input is absent.
    pub fn gated(&self, inputs: &EvaluationInputs) -> Self {
        let mut gated = self.clone();
        gated.uv.retain(|o| missing_input_uv(o, inputs).is_none());
        if inputs.bio().is_none() {
            gated.bio.retain(|o| !o.is_active());
        }
        if inputs.batch().is_none() {
            gated.batch.retain(|o| !o.is_active());
        }
        gated
    }

    /// Reject empty stages, duplicated options and zero factor counts.
    pub fn validate(&self) -> Result<()> {
        check_stage("imputation", &self.imputation, |o| o.name().to_string())?;
        check_stage("scaling", &self.scaling, |o| o.name().to_string())?;
        check_stage("uv", &self.uv, |o| o.name())?;
        check_stage("bio", &self.bio, |o| o.name().to_string())?;
        check_stage("batch", &self.batch, |o| o.name().to_string())?;
        if let Some(option) = self.uv.iter().find(|o| o.is_active() && o.k() == 0) {
            return Err(SconeError::Configuration(format!(
                "Option '{}' must estimate at least one factor",
                option.name()
            )));
        }
        Ok(())
    }

    /// Fail if any option needs an input that was not supplied.
    pub fn check_inputs(&self, inputs: &EvaluationInputs) -> Result<()> {
        for option in &self.uv {
            if let Some(missing) = missing_input_uv(option, inputs) {
                return Err(SconeError::Configuration(format!(
                    "Option '{}' requires {} but none was supplied",
                    option.name(),
                    missing
                )));
            }
        }
        if self.bio.iter().any(|o| o.is_active()) && inputs.bio().is_none() {
            return Err(SconeError::Configuration(
                "Option 'bio' requires a biological factor but none was supplied".to_string(),
            ));
        }
        if self.batch.iter().any(|o| o.is_active()) && inputs.batch().is_none() {
            return Err(SconeError::Configuration(
                "Option 'batch' requires a batch factor but none was supplied".to_string(),
            ));
        }
        Ok(())
    }

    /// Size of the unfiltered cartesian product.
    pub fn n_combinations(&self) -> usize {
        self.imputation.len() * self.scaling.len() * self.uv.len() * self.bio.len() * self.batch.len()
    }

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(SconeError::from)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Write to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::default_for(1)
    }
}

fn missing_input_uv(option: &UvAdjust, inputs: &EvaluationInputs) -> Option<&'static str> {
    match option {
        UvAdjust::None => None,
        UvAdjust::Ruv { .. } if inputs.negative_controls().is_none() => Some("negative control features"),
        UvAdjust::Qc { .. } if inputs.qc().is_none() => Some("a QC matrix"),
        _ => None,
    }
}

fn check_stage<T>(stage: &str, options: &[T], name: impl Fn(&T) -> String) -> Result<()> {
    if options.is_empty() {
        return Err(SconeError::Configuration(format!(
            "Stage '{}' has no options",
            stage
        )));
    }
    let mut seen = HashSet::new();
    for option in options {
        let n = name(option);
        if !seen.insert(n.clone()) {
            return Err(SconeError::Configuration(format!(
                "Stage '{}' lists option '{}' twice",
                stage, n
            )));
        }
    }
    Ok(())
}
