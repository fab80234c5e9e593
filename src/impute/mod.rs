//! Imputation of zero counts, the first pipeline stage.

pub mod mean;

pub use mean::impute_mean_zeros;

use crate::data::ExpressionMatrix;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Signature shared by all imputation transforms.
pub type ImputeFn = fn(&ExpressionMatrix) -> Result<ExpressionMatrix>;

/// Imputation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImputeMethod {
    /// Leave the counts untouched.
    #[serde(rename = "none")]
    None,
    /// Replace zeros with the feature's mean non-zero value.
    #[serde(rename = "impute_mean")]
    Mean,
}

impl ImputeMethod {
    /// All imputation options in catalog order.
    pub const ALL: [ImputeMethod; 2] = [ImputeMethod::None, ImputeMethod::Mean];

    /// Label token for this option.
    pub fn name(&self) -> &'static str {
        match self {
            ImputeMethod::None => "none",
            ImputeMethod::Mean => "impute_mean",
        }
    }

    /// Parse a label token.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// The transform behind this option; `None` means pass-through.
    pub fn transform(&self) -> Option<ImputeFn> {
        match self {
            ImputeMethod::None => None,
            ImputeMethod::Mean => Some(impute_mean_zeros),
        }
    }
}
