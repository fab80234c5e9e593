//! Cartesian enumeration of pipeline configurations.

use crate::adjust::{BatchAdjust, BioAdjust, UvAdjust};
use crate::error::{Result, SconeError};
use crate::impute::ImputeMethod;
use crate::normalize::ScalingMethod;
use crate::pipeline::{EvaluationInputs, StepCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One option per stage plus the creation index assigned by the enumerator.
///
/// The identity of a configuration is its label: the option names joined by
/// commas in the order `imputation,scaling,uv,bio,batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    pub index: usize,
    pub imputation: ImputeMethod,
    pub scaling: ScalingMethod,
    pub uv: UvAdjust,
    pub bio: BioAdjust,
    pub batch: BatchAdjust,
}

impl PipelineConfiguration {
    /// Comma-joined option names.
    pub fn label(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.imputation.name(),
            self.scaling.name(),
            self.uv.name(),
            self.bio.name(),
            self.batch.name()
        )
    }

    /// Parse a label back into a configuration with creation index 0.
    ///
    /// The label must be exactly what [`PipelineConfiguration::label`]
    /// renders: no surrounding whitespace and canonical tokens.
    pub fn from_label(label: &str) -> Result<Self> {
        let parts: Vec<&str> = label.split(',').collect();
        if parts.len() != 5 {
            return Err(SconeError::Configuration(format!(
                "Label '{}' must have 5 comma-separated options, found {}",
                label,
                parts.len()
            )));
        }
        let unknown = |stage: &str, token: &str| {
            SconeError::Configuration(format!("Unknown {} option '{}' in label '{}'", stage, token, label))
        };
        Ok(Self {
            index: 0,
            imputation: ImputeMethod::from_name(parts[0]).ok_or_else(|| unknown("imputation", parts[0]))?,
            scaling: ScalingMethod::from_name(parts[1]).ok_or_else(|| unknown("scaling", parts[1]))?,
            uv: UvAdjust::from_name(parts[2]).ok_or_else(|| unknown("uv", parts[2]))?,
            bio: BioAdjust::from_name(parts[3]).ok_or_else(|| unknown("bio", parts[3]))?,
            batch: BatchAdjust::from_name(parts[4]).ok_or_else(|| unknown("batch", parts[4]))?,
        })
    }

    /// Same options with another creation index.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Biological adjustment without batch adjustment is not allowed.
    pub fn is_consistent(&self) -> bool {
        !(self.bio.is_active() && !self.batch.is_active())
    }

    /// Whether any of the log-scale adjustment stages is active.
    pub fn adjusts(&self) -> bool {
        self.uv.is_active() || self.batch.is_active() || self.bio.is_active()
    }

    /// Whether every stage passes its input through.
    pub fn is_identity(&self) -> bool {
        self.imputation == ImputeMethod::None && self.scaling == ScalingMethod::None && !self.adjusts()
    }

    /// Fail if this configuration needs an input that was not supplied.
    pub fn check_inputs(&self, inputs: &EvaluationInputs) -> Result<()> {
        let catalog = StepCatalog {
            imputation: vec![self.imputation],
            scaling: vec![self.scaling],
            uv: vec![self.uv],
            bio: vec![self.bio],
            batch: vec![self.batch],
        };
        catalog.check_inputs(inputs)
    }
}

impl fmt::Display for PipelineConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Builds the ordered, duplicate-free list of configurations from a catalog.
#[derive(Debug, Clone)]
pub struct ConfigurationEnumerator {
    catalog: StepCatalog,
}

impl ConfigurationEnumerator {
    /// Validate the catalog and wrap it.
    pub fn new(catalog: StepCatalog) -> Result<Self> {
        catalog.validate()?;
        Ok(Self { catalog })
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    /// All consistent configurations in stage order, options in catalog
    /// order. Creation indices run from 0 over the accepted configurations.
    pub fn configurations(&self) -> Vec<PipelineConfiguration> {
        let c = &self.catalog;
        let mut out = Vec::with_capacity(self.expected_count());
        for &imputation in &c.imputation {
            for &scaling in &c.scaling {
                for &uv in &c.uv {
                    for &bio in &c.bio {
                        for &batch in &c.batch {
                            let config = PipelineConfiguration {
                                index: out.len(),
                                imputation,
                                scaling,
                                uv,
                                bio,
                                batch,
                            };
                            if config.is_consistent() {
                                out.push(config);
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Check prerequisites against the inputs, then enumerate.
    pub fn enumerate(&self, inputs: &EvaluationInputs) -> Result<Vec<PipelineConfiguration>> {
        self.catalog.check_inputs(inputs)?;
        Ok(self.configurations())
    }

    /// Product of stage sizes minus the bio-without-batch combinations.
    pub fn expected_count(&self) -> usize {
        let c = &self.catalog;
        let bio_yes = c.bio.iter().filter(|o| o.is_active()).count();
        let batch_no = c.batch.iter().filter(|o| !o.is_active()).count();
        c.n_combinations() - c.imputation.len() * c.scaling.len() * c.uv.len() * bio_yes * batch_no
    }
}
