//! Composable Normalization Evaluation Library
//!
//! Enumerates candidate normalization pipelines for count data, runs each one
//! and ranks them by data-driven quality metrics, so a normalization strategy
//! can be chosen from the data rather than fixed a priori.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (CountMatrix, ExpressionMatrix, FactorVector, FeatureSet, QcMatrix, Metadata)
//! - **filter**: Upstream feature and sample filtering
//! - **impute**: Zero imputation (first stage)
//! - **normalize**: Scaling normalizations FQ, UQ, TMM, DESeq (second stage)
//! - **adjust**: RUVg, QC-factor, batch and biological adjustment (last stages)
//! - **metrics**: Silhouette, PC correlation and RLE quality metrics
//! - **pipeline**: Catalog, enumeration, execution, ranking and parallel runs
//!
//! # Example
//!
//! ```no_run
//! use composable_scone::prelude::*;
//!
//! let counts = CountMatrix::from_tsv("counts.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//! let batch = FactorVector::from_metadata(&metadata, "batch", counts.sample_ids()).unwrap();
//! let controls = FeatureSet::from_file("negative", "controls.txt").unwrap();
//!
//! let inputs = EvaluationInputs::new(&counts)
//!     .unwrap()
//!     .with_batch(batch)
//!     .unwrap()
//!     .with_negative_controls(controls)
//!     .unwrap();
//! let catalog = StepCatalog::default_for(2).gated(&inputs);
//!
//! let output = run(&inputs, &catalog, &RunConfig::default(), &CancelToken::new()).unwrap();
//! for entry in output.ranked.top(5) {
//!     println!("{}\t{:?}", entry.label, entry.composite);
//! }
//! ```

pub mod adjust;
pub mod data;
pub mod error;
pub mod filter;
pub mod impute;
pub mod metrics;
pub mod normalize;
pub mod pca;
pub mod pipeline;
pub mod stats;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::adjust::{BatchAdjust, BioAdjust, UvAdjust};
    pub use crate::data::{
        CountMatrix, ExpressionMatrix, FactorVector, FeatureSet, Metadata, QcMatrix, Variable,
    };
    pub use crate::error::{Result, SconeError};
    pub use crate::filter::{filter_expressed, filter_library_size};
    pub use crate::impute::ImputeMethod;
    pub use crate::metrics::{Metric, MetricConfig, MetricScores, MetricSuite};
    pub use crate::normalize::{ScalingMethod, TmmConfig};
    pub use crate::pipeline::{
        normalize_configuration, run, run_with_progress, Aggregation, CancelToken,
        ConfigurationEnumerator, EvaluationInputs, PipelineConfiguration, RankedEntry,
        RankedResult, Ranker, RunConfig, RunOutput, RunReport, ScoreRow, StepCatalog,
        TransformExecutor,
    };
}
