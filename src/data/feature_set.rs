//! Named subsets of features, such as negative control probes.

use crate::error::{Result, SconeError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A named set of row identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Name of the set (e.g. "negative_controls").
    pub name: String,
    /// Member identifiers, in insertion order, without duplicates.
    ids: Vec<String>,
}

impl FeatureSet {
    /// Create a feature set, dropping repeated identifiers.
    pub fn new(name: &str, ids: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if ids.is_empty() {
            return Err(SconeError::EmptyData(format!("Feature set '{}' is empty", name)));
        }
        Ok(Self {
            name: name.to_string(),
            ids,
        })
    }

    /// Load a feature set from a file with one identifier per line.
    ///
    /// Blank lines and lines starting with `#` are ignored; only the first
    /// tab-separated field of each line is used.
    pub fn from_file<P: AsRef<Path>>(name: &str, path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut ids = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(id) = trimmed.split('\t').next() {
                ids.push(id.to_string());
            }
        }
        Self::new(name, ids)
    }

    /// Member identifiers.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether an identifier is a member.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|m| m == id)
    }

    /// Map members to row indices of a matrix with `row_ids`.
    ///
    /// Fails if any member is not a row of the matrix. Indices are returned
    /// sorted by row position.
    pub fn resolve(&self, row_ids: &[String]) -> Result<Vec<usize>> {
        let index: HashMap<&str, usize> = row_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut rows = Vec::with_capacity(self.ids.len());
        for id in &self.ids {
            match index.get(id.as_str()) {
                Some(&row) => rows.push(row),
                None => {
                    return Err(SconeError::Configuration(format!(
                        "Feature set '{}' member '{}' is not a row of the count matrix",
                        self.name, id
                    )))
                }
            }
        }
        rows.sort_unstable();
        Ok(rows)
    }

    /// Keep only members present in `row_ids`; returns the restricted set and
    /// the number of members dropped.
    pub fn restrict_to(&self, row_ids: &[String]) -> Result<(Self, usize)> {
        let present: HashSet<&str> = row_ids.iter().map(|s| s.as_str()).collect();
        let kept: Vec<String> = self
            .ids
            .iter()
            .filter(|id| present.contains(id.as_str()))
            .cloned()
            .collect();
        let dropped = self.ids.len() - kept.len();
        Ok((Self::new(&self.name, kept)?, dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn rows() -> Vec<String> {
        vec!["g1".into(), "ERCC-1".into(), "g2".into(), "ERCC-2".into()]
    }

    #[test]
    fn test_resolve() {
        let set = FeatureSet::new("neg", vec!["ERCC-2".into(), "ERCC-1".into()]).unwrap();
        assert_eq!(set.resolve(&rows()).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_resolve_missing_member() {
        let set = FeatureSet::new("neg", vec!["ERCC-9".into()]).unwrap();
        let err = set.resolve(&rows()).unwrap_err();
        assert!(matches!(err, SconeError::Configuration(_)));
    }

    #[test]
    fn test_duplicates_and_empty() {
        let set = FeatureSet::new("neg", vec!["a".into(), "a".into(), "b".into()]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(FeatureSet::new("neg", vec![]).is_err());
    }

    #[test]
    fn test_restrict_to() {
        let set = FeatureSet::new("neg", vec!["ERCC-1".into(), "gone".into()]).unwrap();
        let (kept, dropped) = set.restrict_to(&rows()).unwrap();
        assert_eq!(kept.ids(), &["ERCC-1"]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# negative controls").unwrap();
        writeln!(file, "ERCC-1\tspike").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "ERCC-2").unwrap();
        file.flush().unwrap();

        let set = FeatureSet::from_file("neg", file.path()).unwrap();
        assert_eq!(set.ids(), &["ERCC-1", "ERCC-2"]);
        assert!(set.contains("ERCC-2"));
    }
}
