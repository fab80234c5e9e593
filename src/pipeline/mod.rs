//! Enumeration, execution, scoring and ranking of normalization pipelines.
//!
//! Control flow of a run:
//!
//! ```text
//! StepCatalog -> ConfigurationEnumerator -> (per configuration, in parallel)
//!     TransformExecutor -> MetricSuite -> Ranker
//! ```

mod catalog;
mod enumerate;
mod executor;
mod inputs;
mod rank;
mod runner;

pub use catalog::StepCatalog;
pub use enumerate::{ConfigurationEnumerator, PipelineConfiguration};
pub use executor::TransformExecutor;
pub use inputs::EvaluationInputs;
pub use rank::{Aggregation, RankedEntry, RankedResult, Ranker, ScoreRow};
pub use runner::{
    normalize_configuration, run, run_with_progress, CancelToken, RunConfig, RunOutput, RunReport,
};
