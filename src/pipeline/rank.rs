//! Composite scoring and ranking of configurations.

use crate::error::Result;
use crate::metrics::{Metric, MetricScores};
use crate::pipeline::PipelineConfiguration;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Spread below which a metric is treated as constant across configurations.
const MIN_SPREAD: f64 = 1e-12;

/// Metric scores of one configuration, or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub configuration: PipelineConfiguration,
    pub scores: MetricScores,
    /// Transform failure message; all metrics are unavailable when set.
    pub error: Option<String>,
}

impl ScoreRow {
    pub fn scored(configuration: PipelineConfiguration, scores: MetricScores) -> Self {
        Self {
            configuration,
            scores,
            error: None,
        }
    }

    pub fn failed(configuration: PipelineConfiguration, error: impl Into<String>) -> Self {
        Self {
            configuration,
            scores: MetricScores::unavailable(),
            error: Some(error.into()),
        }
    }
}

/// How oriented metric scores combine into the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Mean,
    Median,
}

impl Aggregation {
    fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Aggregation::Mean => stats::mean(values),
            Aggregation::Median => stats::median(values),
        }
    }
}

/// A configuration with its scores and composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub configuration: PipelineConfiguration,
    pub scores: MetricScores,
    /// Sign-corrected z-scores of the available metrics.
    pub oriented: BTreeMap<Metric, f64>,
    /// `None` for failed rows and rows without any available metric.
    pub composite: Option<f64>,
    pub error: Option<String>,
}

/// Converts score rows into a ranked table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker {
    aggregation: Aggregation,
}

impl Ranker {
    pub fn new(aggregation: Aggregation) -> Self {
        Self { aggregation }
    }

    /// Rank rows by composite score, descending, ties by creation index.
    ///
    /// Each metric is z-scored over the rows where it is available (a metric
    /// with no spread scores 0) and multiplied by its sign. Rows are put in
    /// creation order first, so the submission order never matters.
    pub fn rank(&self, mut rows: Vec<ScoreRow>) -> RankedResult {
        rows.sort_by_key(|r| r.configuration.index);

        let mut oriented: Vec<BTreeMap<Metric, f64>> = vec![BTreeMap::new(); rows.len()];
        for metric in Metric::ALL {
            let available: Vec<(usize, f64)> = rows
                .iter()
                .enumerate()
                .filter(|(_, r)| r.error.is_none())
                .filter_map(|(i, r)| r.scores.get(metric).map(|v| (i, v)))
                .collect();
            if available.is_empty() {
                continue;
            }
            let values: Vec<f64> = available.iter().map(|(_, v)| *v).collect();
            let mean = stats::mean(&values);
            let sd = if values.len() > 1 {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt()
            } else {
                0.0
            };
            for (i, v) in available {
                let z = if sd > MIN_SPREAD { (v - mean) / sd } else { 0.0 };
                oriented[i].insert(metric, metric.sign() * z);
            }
        }

        let mut entries: Vec<RankedEntry> = rows
            .into_iter()
            .zip(oriented)
            .map(|(row, oriented)| {
                let values: Vec<f64> = oriented.values().copied().collect();
                let composite = if row.error.is_some() || values.is_empty() {
                    None
                } else {
                    Some(self.aggregation.apply(&values)).filter(|c| c.is_finite())
                };
                RankedEntry {
                    label: row.configuration.label(),
                    configuration: row.configuration,
                    scores: row.scores,
                    oriented,
                    composite,
                    error: row.error,
                }
            })
            .collect();

        entries.sort_by(|a, b| match (a.composite, b.composite) {
            (Some(x), Some(y)) => y
                .total_cmp(&x)
                .then(a.configuration.index.cmp(&b.configuration.index)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.configuration.index.cmp(&b.configuration.index),
        });

        RankedResult { entries }
    }
}

/// Ranked configurations, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    entries: Vec<RankedEntry>,
}

impl RankedResult {
    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-ranked configuration with a composite score.
    pub fn best(&self) -> Option<&RankedEntry> {
        self.entries.first().filter(|e| e.composite.is_some())
    }

    /// The first `n` entries.
    pub fn top(&self, n: usize) -> &[RankedEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Entries whose configuration satisfies `predicate`, in rank order.
    pub fn filter<F>(&self, predicate: F) -> Vec<&RankedEntry>
    where
        F: Fn(&PipelineConfiguration) -> bool,
    {
        self.entries
            .iter()
            .filter(|e| predicate(&e.configuration))
            .collect()
    }

    /// Entries whose label matches `pattern`.
    ///
    /// A pattern with `*` is a glob over the whole label, otherwise it is a
    /// substring match.
    pub fn matching(&self, pattern: &str) -> Vec<&RankedEntry> {
        self.entries
            .iter()
            .filter(|e| label_matches(&e.label, pattern))
            .collect()
    }

    /// Zero-based rank of the configuration with `label`.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.label == label)
    }

    /// Write the table as TSV: rank, label, stage options, metrics, composite
    /// and error. Unavailable values are written as `NA`.
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);

        let mut header = vec![
            "rank".to_string(),
            "label".to_string(),
            "imputation".to_string(),
            "scaling".to_string(),
            "uv".to_string(),
            "bio".to_string(),
            "batch".to_string(),
        ];
        header.extend(Metric::ALL.iter().map(|m| m.name().to_string()));
        header.push("composite".to_string());
        header.push("error".to_string());
        wtr.write_record(&header)?;

        for (rank, entry) in self.entries.iter().enumerate() {
            let c = &entry.configuration;
            let mut record = vec![
                (rank + 1).to_string(),
                entry.label.clone(),
                c.imputation.name().to_string(),
                c.scaling.name().to_string(),
                c.uv.name(),
                c.bio.name().to_string(),
                c.batch.name().to_string(),
            ];
            record.extend(Metric::ALL.iter().map(|&m| format_value(entry.scores.get(m))));
            record.push(format_value(entry.composite));
            record.push(entry.error.clone().unwrap_or_default());
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table as TSV to a file.
    pub fn to_tsv_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_tsv(std::io::BufWriter::new(file))
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| format!("{:.6}", v))
}

fn label_matches(label: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return label.contains(pattern);
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = label.strip_prefix(first) else {
        return false;
    };
    let last = rest.len() - 1;
    for (i, part) in rest.iter().enumerate() {
        if i == last {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::BioAdjust;
    use approx::assert_relative_eq;

    fn config(label: &str, index: usize) -> PipelineConfiguration {
        PipelineConfiguration::from_label(label).unwrap().with_index(index)
    }

    fn row(label: &str, index: usize, values: &[(Metric, f64)]) -> ScoreRow {
        let mut scores = MetricScores::unavailable();
        for &(m, v) in values {
            scores.set(m, Some(v));
        }
        ScoreRow::scored(config(label, index), scores)
    }

    fn rows() -> Vec<ScoreRow> {
        vec![
            row("none,none,no_uv,no_bio,no_batch", 0, &[(Metric::RleMed, 0.5), (Metric::BioSil, 0.1)]),
            row("none,deseq,no_uv,no_bio,no_batch", 1, &[(Metric::RleMed, 0.1), (Metric::BioSil, 0.3)]),
            row("none,tmm,no_uv,no_bio,no_batch", 2, &[(Metric::RleMed, 0.3), (Metric::BioSil, 0.2)]),
            ScoreRow::failed(config("none,uq,no_uv,no_bio,no_batch", 3), "scaling failed"),
        ]
    }

    #[test]
    fn test_orientation_and_order() {
        let ranked = Ranker::default().rank(rows());
        let labels: Vec<&str> = ranked.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "none,deseq,no_uv,no_bio,no_batch",
                "none,tmm,no_uv,no_bio,no_batch",
                "none,none,no_uv,no_bio,no_batch",
                "none,uq,no_uv,no_bio,no_batch",
            ]
        );
        let best = ranked.best().unwrap();
        // Lower RLE_MED is better, so the oriented score is positive
        assert!(best.oriented[&Metric::RleMed] > 0.0);
        assert_relative_eq!(best.composite.unwrap(), 1.0, epsilon = 1e-12);
        assert!(ranked.entries()[3].composite.is_none());
    }

    #[test]
    fn test_permutation_invariant() {
        let forward = Ranker::default().rank(rows());
        let mut shuffled = rows();
        shuffled.reverse();
        shuffled.swap(0, 2);
        assert_eq!(Ranker::default().rank(shuffled), forward);
    }

    #[test]
    fn test_ties_by_creation_index() {
        let tied = vec![
            row("none,tmm,no_uv,no_bio,no_batch", 5, &[(Metric::RleIqr, 0.2)]),
            row("none,none,no_uv,no_bio,no_batch", 2, &[(Metric::RleIqr, 0.2)]),
        ];
        let ranked = Ranker::default().rank(tied);
        assert_eq!(ranked.entries()[0].configuration.index, 2);
        assert_eq!(ranked.entries()[0].composite, Some(0.0));
    }

    #[test]
    fn test_median_aggregation() {
        let ranked = Ranker::new(Aggregation::Median).rank(rows());
        assert_eq!(ranked.len(), 4);
        assert!(ranked.best().is_some());
    }

    #[test]
    fn test_queries() {
        let ranked = Ranker::default().rank(rows());
        assert_eq!(ranked.top(2).len(), 2);
        assert_eq!(ranked.top(10).len(), 4);
        assert_eq!(ranked.position("none,tmm,no_uv,no_bio,no_batch"), Some(1));
        assert_eq!(ranked.position("missing"), None);
        assert_eq!(ranked.matching("deseq").len(), 1);
        assert_eq!(ranked.matching("none,*,no_batch").len(), 4);
        assert_eq!(ranked.matching("*,tmm,*").len(), 1);
        assert!(ranked.filter(|c| c.bio == BioAdjust::Yes).is_empty());
    }

    #[test]
    fn test_glob() {
        assert!(label_matches("none,deseq,ruv_k=1,no_bio,no_batch", "*ruv_k=1*"));
        assert!(label_matches("none,deseq,ruv_k=1,no_bio,no_batch", "none*batch"));
        assert!(!label_matches("none,deseq,ruv_k=1,no_bio,no_batch", "*ruv_k=2*"));
        assert!(!label_matches("none,deseq", "deseq*"));
    }

    #[test]
    fn test_tsv_and_json() {
        let ranked = Ranker::default().rank(rows());
        let mut buffer = Vec::new();
        ranked.write_tsv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("rank\tlabel\timputation"));
        assert!(lines[0].contains("BIO_SIL"));
        assert!(lines[4].contains("NA"));
        assert!(lines[4].ends_with("scaling failed"));

        let json = ranked.to_json().unwrap();
        let back: RankedResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 4);
        assert_eq!(back.entries()[0].label, ranked.entries()[0].label);
    }

    #[test]
    fn test_tsv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranked.tsv");
        Ranker::default().rank(rows()).to_tsv_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
    }
}
