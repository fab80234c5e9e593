//! Error types for the composable-scone library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum SconeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Duplicate identifier '{0}'")]
    DuplicateId(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An option combination or catalog is invalid, or an option needs an
    /// input that was not supplied.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stage failed numerically while normalizing one configuration.
    #[error("Transform error in {stage} stage: {reason}")]
    Transform { stage: String, reason: String },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SconeError {
    /// Build a transform error for a named stage.
    pub fn transform(stage: &str, reason: impl Into<String>) -> Self {
        SconeError::Transform {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error isolates a single configuration rather than the run.
    pub fn is_transform(&self) -> bool {
        matches!(self, SconeError::Transform { .. })
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, SconeError>;
