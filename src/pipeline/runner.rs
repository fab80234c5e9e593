//! Parallel evaluation of every configuration in a catalog.

use crate::data::ExpressionMatrix;
use crate::error::{Result, SconeError};
use crate::metrics::{MetricConfig, MetricSuite};
use crate::pipeline::{
    Aggregation, ConfigurationEnumerator, EvaluationInputs, PipelineConfiguration, RankedResult,
    Ranker, ScoreRow, StepCatalog, TransformExecutor,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub metrics: MetricConfig,
    /// Restore input zeros after scaling.
    pub rezero: bool,
    /// Worker threads (None = all cores).
    pub threads: Option<usize>,
    /// Stop dispatching configurations after this many seconds.
    pub timeout_secs: Option<u64>,
    pub aggregation: Aggregation,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            metrics: MetricConfig::default(),
            rezero: false,
            threads: None,
            timeout_secs: None,
            aggregation: Aggregation::Mean,
        }
    }
}

impl RunConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(SconeError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(SconeError::from)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

/// Shared abort signal for a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new configurations.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Configurations enumerated.
    pub total: usize,
    /// Configurations scored.
    pub completed: usize,
    /// Configurations whose transform failed.
    pub failed: usize,
    /// Configurations never started because the run was cancelled or timed out.
    pub skipped: usize,
    pub cancelled: bool,
    pub timed_out: bool,
    pub elapsed_secs: f64,
    /// RFC 3339 start time.
    pub started_at: String,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} configurations: {} scored, {} failed, {} skipped in {:.2}s",
            self.total, self.completed, self.failed, self.skipped, self.elapsed_secs
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        if self.timed_out {
            write!(f, " (timed out)")?;
        }
        Ok(())
    }
}

/// Ranked results and the run summary.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ranked: RankedResult,
    pub report: RunReport,
}

enum Outcome {
    Scored(ScoreRow),
    Failed(ScoreRow),
    Skipped,
}

/// Enumerate, normalize and score every configuration, then rank.
///
/// Configuration errors (malformed catalog, option without its input) are
/// fatal and returned before anything runs. A failing transform only marks
/// its own row. Configurations not started before cancellation or timeout
/// are left out of the ranking.
pub fn run(
    inputs: &EvaluationInputs,
    catalog: &StepCatalog,
    config: &RunConfig,
    cancel: &CancelToken,
) -> Result<RunOutput> {
    run_with_progress(inputs, catalog, config, cancel, |_| {})
}

/// Like [`run`], calling `on_row` on the worker thread as soon as each
/// configuration has been scored or has failed.
///
/// Rows are reported in completion order. Cancelling from `on_row` stops
/// every configuration not yet started.
pub fn run_with_progress<F>(
    inputs: &EvaluationInputs,
    catalog: &StepCatalog,
    config: &RunConfig,
    cancel: &CancelToken,
    on_row: F,
) -> Result<RunOutput>
where
    F: Fn(&ScoreRow) + Sync,
{
    let started_at = chrono::Local::now().to_rfc3339();
    let started = Instant::now();

    let enumerator = ConfigurationEnumerator::new(catalog.clone())?;
    let configurations = enumerator.enumerate(inputs)?;
    if configurations.is_empty() {
        return Err(SconeError::Configuration(
            "Catalog yields no consistent configurations".to_string(),
        ));
    }
    let suite = MetricSuite::new(inputs, config.metrics.clone())?;
    let executor = TransformExecutor::new(inputs).with_rezero(config.rezero);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()
        .map_err(|e| SconeError::InvalidParameter(format!("Cannot build worker pool: {}", e)))?;

    info!(
        "Evaluating {} configurations on {} features x {} samples with {} threads",
        configurations.len(),
        inputs.counts().n_features(),
        inputs.counts().n_samples(),
        pool.current_num_threads()
    );

    let deadline = config.timeout_secs.map(|s| started + Duration::from_secs(s));
    let timed_out = AtomicBool::new(false);
    let finished = AtomicUsize::new(0);
    let total = configurations.len();

    let outcomes: Vec<Outcome> = pool.install(|| {
        configurations
            .par_iter()
            .map(|configuration| {
                if cancel.is_cancelled() {
                    return Outcome::Skipped;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    timed_out.store(true, Ordering::SeqCst);
                    return Outcome::Skipped;
                }
                let outcome = evaluate(&executor, &suite, configuration);
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("[{}/{}] {}", done, total, configuration.label());
                if let Outcome::Scored(row) | Outcome::Failed(row) = &outcome {
                    on_row(row);
                }
                outcome
            })
            .collect()
    });

    let mut rows = Vec::with_capacity(total);
    let (mut completed, mut failed, mut skipped) = (0, 0, 0);
    for outcome in outcomes {
        match outcome {
            Outcome::Scored(row) => {
                completed += 1;
                rows.push(row);
            }
            Outcome::Failed(row) => {
                failed += 1;
                rows.push(row);
            }
            Outcome::Skipped => skipped += 1,
        }
    }

    let cancelled = cancel.is_cancelled();
    let timed_out = timed_out.load(Ordering::SeqCst);
    if skipped > 0 {
        warn!(
            "Run stopped early ({}): {} of {} configurations skipped",
            if timed_out { "timeout" } else { "cancelled" },
            skipped,
            total
        );
    }

    let ranked = Ranker::new(config.aggregation).rank(rows);
    let report = RunReport {
        total,
        completed,
        failed,
        skipped,
        cancelled,
        timed_out,
        elapsed_secs: started.elapsed().as_secs_f64(),
        started_at,
    };
    info!("{}", report);
    Ok(RunOutput { ranked, report })
}

fn evaluate(
    executor: &TransformExecutor<'_>,
    suite: &MetricSuite,
    configuration: &PipelineConfiguration,
) -> Outcome {
    match executor.execute(configuration) {
        Ok(normalized) => Outcome::Scored(ScoreRow::scored(*configuration, suite.score(&normalized))),
        Err(e) => {
            if e.is_transform() {
                warn!("Configuration {} failed: {}", configuration.label(), e);
            } else {
                warn!("Configuration {} failed before normalizing: {}", configuration.label(), e);
            }
            Outcome::Failed(ScoreRow::failed(*configuration, e.to_string()))
        }
    }
}

/// Re-run one configuration by label and return its normalized matrix.
pub fn normalize_configuration(
    inputs: &EvaluationInputs,
    label: &str,
    rezero: bool,
) -> Result<ExpressionMatrix> {
    let configuration = PipelineConfiguration::from_label(label)?;
    if !configuration.is_consistent() {
        return Err(SconeError::Configuration(format!(
            "Configuration '{}' adjusts for biology without adjusting for batch",
            label
        )));
    }
    configuration.check_inputs(inputs)?;
    TransformExecutor::new(inputs)
        .with_rezero(rezero)
        .execute(&configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, FactorVector};

    fn inputs() -> EvaluationInputs {
        let rows = vec![
            vec![10, 12, 30, 40, 12, 35],
            vec![5, 8, 6, 40, 44, 38],
            vec![100, 120, 90, 300, 280, 310],
            vec![50, 60, 45, 150, 140, 160],
        ];
        let sample_ids: Vec<String> = (0..6).map(|j| format!("s{}", j)).collect();
        let counts = CountMatrix::from_rows(
            &rows,
            (0..4).map(|i| format!("g{}", i)).collect(),
            sample_ids.clone(),
        )
        .unwrap();
        let batch = ["a", "a", "a", "b", "b", "b"].iter().map(|s| s.to_string()).collect();
        EvaluationInputs::new(&counts)
            .unwrap()
            .with_batch(FactorVector::new("batch", sample_ids, batch).unwrap())
            .unwrap()
    }

    fn catalog() -> StepCatalog {
        let mut catalog = StepCatalog::default_for(0);
        catalog.bio.truncate(1);
        catalog
    }

    #[test]
    fn test_run_scores_everything() {
        let output = run(&inputs(), &catalog(), &RunConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(output.report.total, 2 * 5 * 2);
        assert_eq!(output.report.completed + output.report.failed, output.report.total);
        assert_eq!(output.report.skipped, 0);
        assert!(!output.report.cancelled);
        assert_eq!(output.ranked.len(), output.report.total);
        assert!(output.ranked.best().is_some());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let output = run(&inputs(), &catalog(), &RunConfig::default(), &cancel).unwrap();
        assert!(output.report.cancelled);
        assert_eq!(output.report.skipped, output.report.total);
        assert!(output.ranked.is_empty());
    }

    #[test]
    fn test_progress_sees_every_row() {
        let seen = AtomicUsize::new(0);
        let output = run_with_progress(
            &inputs(),
            &catalog(),
            &RunConfig::default(),
            &CancelToken::new(),
            |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), output.report.total);
    }

    #[test]
    fn test_cancel_from_progress_stops_dispatch() {
        let cancel = CancelToken::new();
        let config = RunConfig {
            threads: Some(1),
            ..Default::default()
        };
        let output = run_with_progress(&inputs(), &catalog(), &config, &cancel, |_| cancel.cancel()).unwrap();
        assert!(output.report.cancelled);
        assert_eq!(output.report.completed + output.report.failed, 1);
        assert_eq!(output.report.skipped, output.report.total - 1);
        assert_eq!(output.ranked.len(), 1);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let catalog = StepCatalog::default_for(1);
        let result = run(&inputs(), &catalog, &RunConfig::default(), &CancelToken::new());
        assert!(matches!(result, Err(SconeError::Configuration(_))));
    }

    #[test]
    fn test_single_thread_matches_parallel() {
        let single = RunConfig {
            threads: Some(1),
            ..Default::default()
        };
        let a = run(&inputs(), &catalog(), &single, &CancelToken::new()).unwrap();
        let b = run(&inputs(), &catalog(), &RunConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(a.ranked, b.ranked);
    }

    #[test]
    fn test_normalize_configuration() {
        let inputs = inputs();
        let matrix = normalize_configuration(&inputs, "none,none,no_uv,no_bio,no_batch", false).unwrap();
        assert_eq!(&matrix, inputs.counts());
        assert!(normalize_configuration(&inputs, "none,none,no_uv,bio,no_batch", false).is_err());
        assert!(normalize_configuration(&inputs, "none,none,ruv_k=1,no_bio,no_batch", false).is_err());
        assert!(normalize_configuration(&inputs, "none,tmm,no_uv,no_bio,batch", false).is_ok());
    }

    #[test]
    fn test_config_yaml() {
        let config = RunConfig {
            rezero: true,
            timeout_secs: Some(30),
            aggregation: Aggregation::Median,
            ..Default::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert_eq!(RunConfig::from_yaml(&yaml).unwrap(), config);
        let partial = RunConfig::from_yaml("rezero: true\n").unwrap();
        assert!(partial.rezero);
        assert_eq!(partial.metrics, MetricConfig::default());
    }
}
