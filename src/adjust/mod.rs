//! Removal of unwanted variation and factor adjustment.
//!
//! The last three pipeline stages share one regression on the log scale:
//!
//! - **Unwanted variation** contributes estimated factors W, either from
//!   negative control features (RUVg) or from QC covariates
//! - **Batch** contributes indicator columns for batch membership
//! - **Biology** contributes indicator columns that are protected, i.e. kept
//!   in the fit so that batch and W are estimated conditional on them but
//!   never subtracted
//!
//! See [`regress::remove_unwanted`] for the fit itself.

pub mod qc;
pub mod regress;
pub mod ruv;

pub use qc::qc_factors;
pub use regress::remove_unwanted;
pub use ruv::ruvg_factors;

use serde::{Deserialize, Serialize};

/// Unwanted-variation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UvAdjust {
    /// No unwanted-variation removal.
    None,
    /// RUVg with `k` factors estimated from negative control features.
    Ruv { k: usize },
    /// Regress out the leading `k` principal components of the QC matrix.
    Qc { k: usize },
}

impl UvAdjust {
    /// Label token for this option.
    pub fn name(&self) -> String {
        match self {
            UvAdjust::None => "no_uv".to_string(),
            UvAdjust::Ruv { k } => format!("ruv_k={}", k),
            UvAdjust::Qc { k } => format!("qc_k={}", k),
        }
    }

    /// Parse a label token. Only the form produced by [`UvAdjust::name`] is
    /// accepted, so `ruv_k=01` and `qc_k=+2` are rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        let option = if name == "no_uv" {
            UvAdjust::None
        } else if let Some(k) = name.strip_prefix("ruv_k=") {
            UvAdjust::Ruv { k: k.parse().ok()? }
        } else if let Some(k) = name.strip_prefix("qc_k=") {
            UvAdjust::Qc { k: k.parse().ok()? }
        } else {
            return None;
        };
        (option.name() == name).then_some(option)
    }

    /// Number of factors, zero when inactive.
    pub fn k(&self) -> usize {
        match self {
            UvAdjust::None => 0,
            UvAdjust::Ruv { k } | UvAdjust::Qc { k } => *k,
        }
    }

    /// Whether this option changes the data.
    pub fn is_active(&self) -> bool {
        !matches!(self, UvAdjust::None)
    }
}

impl TryFrom<String> for UvAdjust {
    type Error = String;

    fn try_from(name: String) -> std::result::Result<Self, Self::Error> {
        UvAdjust::from_name(&name).ok_or_else(|| format!("unknown unwanted-variation option '{}'", name))
    }
}

impl From<UvAdjust> for String {
    fn from(option: UvAdjust) -> Self {
        option.name()
    }
}

/// Batch adjustment options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchAdjust {
    #[serde(rename = "no_batch")]
    No,
    #[serde(rename = "batch")]
    Yes,
}

impl BatchAdjust {
    /// All batch options in catalog order.
    pub const ALL: [BatchAdjust; 2] = [BatchAdjust::No, BatchAdjust::Yes];

    /// Label token for this option.
    pub fn name(&self) -> &'static str {
        match self {
            BatchAdjust::No => "no_batch",
            BatchAdjust::Yes => "batch",
        }
    }

    /// Parse a label token.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }

    pub fn is_active(&self) -> bool {
        *self == BatchAdjust::Yes
    }
}

/// Biological adjustment options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BioAdjust {
    #[serde(rename = "no_bio")]
    No,
    #[serde(rename = "bio")]
    Yes,
}

impl BioAdjust {
    /// All biological options in catalog order.
    pub const ALL: [BioAdjust; 2] = [BioAdjust::No, BioAdjust::Yes];

    /// Label token for this option.
    pub fn name(&self) -> &'static str {
        match self {
            BioAdjust::No => "no_bio",
            BioAdjust::Yes => "bio",
        }
    }

    /// Parse a label token.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }

    pub fn is_active(&self) -> bool {
        *self == BioAdjust::Yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_names() {
        assert_eq!(UvAdjust::None.name(), "no_uv");
        assert_eq!(UvAdjust::Ruv { k: 2 }.name(), "ruv_k=2");
        assert_eq!(UvAdjust::from_name("qc_k=3"), Some(UvAdjust::Qc { k: 3 }));
        assert_eq!(UvAdjust::from_name("ruv_k=x"), None);
        assert_eq!(UvAdjust::from_name("ruv"), None);
        assert_eq!(UvAdjust::from_name("ruv_k=01"), None);
        assert_eq!(UvAdjust::from_name("qc_k=+2"), None);
        assert_eq!(UvAdjust::from_name("ruv_k=10"), Some(UvAdjust::Ruv { k: 10 }));
        assert_eq!(UvAdjust::Ruv { k: 4 }.k(), 4);
        assert!(!UvAdjust::None.is_active());
    }

    #[test]
    fn test_factor_names() {
        for option in BatchAdjust::ALL {
            assert_eq!(BatchAdjust::from_name(option.name()), Some(option));
        }
        for option in BioAdjust::ALL {
            assert_eq!(BioAdjust::from_name(option.name()), Some(option));
        }
        assert_eq!(BatchAdjust::from_name("bio"), None);
    }

    #[test]
    fn test_serde_uses_tokens() {
        let yaml = serde_yaml::to_string(&vec![UvAdjust::None, UvAdjust::Ruv { k: 1 }]).unwrap();
        assert!(yaml.contains("ruv_k=1"));
        let back: Vec<UvAdjust> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, vec![UvAdjust::None, UvAdjust::Ruv { k: 1 }]);
        assert!(serde_yaml::from_str::<UvAdjust>("ruv_k=002").is_err());
        let json = serde_json::to_string(&BioAdjust::Yes).unwrap();
        assert_eq!(json, "\"bio\"");
    }
}
