//! Upstream filtering primitives, applied once before any configuration runs
//! so every configuration is scored on the same features and samples.

pub mod expression;
pub mod library_size;

pub use expression::filter_expressed;
pub use library_size::filter_library_size;
