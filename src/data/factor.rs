//! Categorical sample labels (biological group, batch).

use crate::data::{Metadata, Variable};
use crate::error::{Result, SconeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A categorical label for every sample, aligned to a sample-id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorVector {
    /// Name of the factor (e.g. "batch").
    pub name: String,
    /// Sample identifiers, in matrix column order.
    sample_ids: Vec<String>,
    /// One label per sample.
    labels: Vec<String>,
}

impl FactorVector {
    /// Create a factor from parallel sample-id and label vectors.
    pub fn new(name: &str, sample_ids: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if sample_ids.len() != labels.len() {
            return Err(SconeError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: labels.len(),
            });
        }
        if labels.iter().any(|l| l.is_empty()) {
            return Err(SconeError::InvalidParameter(format!(
                "Factor '{}' has an empty label",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            sample_ids,
            labels,
        })
    }

    /// Build a factor from a metadata column, ordered like `sample_ids`.
    ///
    /// Every sample must be present in the metadata with a non-missing value.
    /// Numeric columns are rendered as their textual value.
    pub fn from_metadata(metadata: &Metadata, column: &str, sample_ids: &[String]) -> Result<Self> {
        if !metadata.has_column(column) {
            return Err(SconeError::MissingColumn(column.to_string()));
        }
        let mut labels = Vec::with_capacity(sample_ids.len());
        for sid in sample_ids {
            let value = metadata.get(sid, column).ok_or_else(|| {
                SconeError::SampleMismatch(format!("Sample '{}' not found in metadata", sid))
            })?;
            let label = match value {
                Variable::Categorical(s) => s.clone(),
                Variable::Continuous(v) => v.to_string(),
                Variable::Missing => {
                    return Err(SconeError::SampleMismatch(format!(
                        "Sample '{}' has no value for '{}'",
                        sid, column
                    )))
                }
            };
            labels.push(label);
        }
        Self::new(column, sample_ids.to_vec(), labels)
    }

    /// Sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Labels in sample order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the factor has no samples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct levels, sorted.
    pub fn levels(&self) -> Vec<String> {
        self.groups().into_keys().collect()
    }

    /// Sample indices per level, levels sorted.
    pub fn groups(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, label) in self.labels.iter().enumerate() {
            groups.entry(label.clone()).or_default().push(idx);
        }
        groups
    }

    /// Integer code per sample (index into `levels()`).
    pub fn codes(&self) -> Vec<usize> {
        let levels = self.levels();
        self.labels
            .iter()
            .map(|l| levels.binary_search(l).unwrap_or(0))
            .collect()
    }

    /// Whether the factor supports contrast: at least two levels, each with
    /// at least `min_per_level` samples.
    pub fn has_contrast(&self, min_per_level: usize) -> bool {
        let groups = self.groups();
        groups.len() >= 2 && groups.values().all(|g| g.len() >= min_per_level)
    }

    /// Reorder this factor to follow `sample_ids`.
    ///
    /// The factor must label exactly the given samples, each once; only the
    /// order may differ.
    pub fn aligned_to(&self, sample_ids: &[String]) -> Result<FactorVector> {
        let mut by_id: HashMap<&str, &String> = HashMap::with_capacity(self.sample_ids.len());
        for (sid, label) in self.sample_ids.iter().zip(&self.labels) {
            if by_id.insert(sid.as_str(), label).is_some() {
                return Err(SconeError::SampleMismatch(format!(
                    "Factor '{}' lists sample '{}' more than once",
                    self.name, sid
                )));
            }
        }
        if by_id.len() != sample_ids.len() {
            return Err(SconeError::SampleMismatch(format!(
                "Factor '{}' has {} samples, matrix has {}",
                self.name,
                by_id.len(),
                sample_ids.len()
            )));
        }
        let labels = sample_ids
            .iter()
            .map(|sid| {
                by_id.get(sid.as_str()).map(|l| (*l).clone()).ok_or_else(|| {
                    SconeError::SampleMismatch(format!(
                        "Factor '{}' has no label for matrix column '{}'",
                        self.name, sid
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: self.name.clone(),
            sample_ids: sample_ids.to_vec(),
            labels,
        })
    }

    /// Treatment-coded indicator columns (first level is the reference).
    pub fn dummy_columns(&self) -> Vec<Vec<f64>> {
        let codes = self.codes();
        (1..self.levels().len())
            .map(|level| {
                codes
                    .iter()
                    .map(|&c| if c == level { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect()
    }
}
