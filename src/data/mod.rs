//! Data structures for normalization evaluation.

mod count_matrix;
mod expression;
mod factor;
mod feature_set;
mod metadata;
mod qc;

pub use count_matrix::CountMatrix;
pub use expression::ExpressionMatrix;
pub use factor::FactorVector;
pub use feature_set::FeatureSet;
pub use metadata::{Metadata, Variable};
pub use qc::QcMatrix;
