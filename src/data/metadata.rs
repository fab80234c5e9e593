//! Sample sheet handling: per-sample batch labels, biological groups and
//! quality measures.

use crate::error::{Result, SconeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A sample-sheet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

/// Column type inferred when loading a sample sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableType {
    Categorical,
    Continuous,
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Sample IDs in file order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
}

fn is_missing_token(raw: &str) -> bool {
    raw.is_empty() || raw == "NA" || raw == "na"
}

impl Metadata {
    /// Load metadata from a TSV file.
    ///
    /// The first column holds sample IDs. A column is continuous when every
    /// non-missing value parses as a number, otherwise categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| SconeError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.trim_end().split('\t').collect();
        if header.len() < 2 {
            return Err(SconeError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        let mut raw_rows: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
            let values = fields[1..].iter().map(|s| s.trim().to_string()).collect();
            raw_rows.push((fields[0].to_string(), values));
        }

        if raw_rows.is_empty() {
            return Err(SconeError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_rows.iter().all(|(_, values)| {
                values
                    .get(col_idx)
                    .map(|v| is_missing_token(v) || v.parse::<f64>().is_ok())
                    .unwrap_or(true)
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(raw_rows.len());
        let mut data = HashMap::with_capacity(raw_rows.len());
        for (sample_id, values) in raw_rows {
            if data.contains_key(&sample_id) {
                return Err(SconeError::DuplicateId(sample_id));
            }
            let mut sample_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx) {
                    Some(raw) if !is_missing_token(raw) => match column_types[col_name] {
                        VariableType::Continuous => raw
                            .parse::<f64>()
                            .map(Variable::Continuous)
                            .unwrap_or(Variable::Missing),
                        VariableType::Categorical => Variable::Categorical(raw.clone()),
                    },
                    _ => Variable::Missing,
                };
                sample_data.insert(col_name.clone(), var);
            }
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
        })
    }

    /// Sample IDs in file order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tbio\tbatch\tdepth").unwrap();
        writeln!(file, "S1\tTE\tB1\t25000").unwrap();
        writeln!(file, "S2\tICM\tB2\t30000").unwrap();
        writeln!(file, "S3\tTE\tB1\tNA").unwrap();
        writeln!(file, "S4\tICM\t\t28000").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_metadata() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.n_samples(), 4);
        assert_eq!(meta.sample_ids(), &["S1", "S2", "S3", "S4"]);
        assert_eq!(meta.column_names(), &["bio", "batch", "depth"]);
        assert!(meta.has_column("batch"));
    }

    #[test]
    fn test_type_inference() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.get("S2", "depth"), Some(&Variable::Continuous(30000.0)));
        assert_eq!(meta.get("S1", "bio"), Some(&Variable::Categorical("TE".to_string())));
        assert!(meta.get("S9", "bio").is_none());
    }

    #[test]
    fn test_missing_values() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.get("S3", "depth"), Some(&Variable::Missing));
        assert_eq!(meta.get("S4", "batch"), Some(&Variable::Missing));
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tbatch").unwrap();
        writeln!(file, "S1\tA").unwrap();
        writeln!(file, "S1\tB").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            Metadata::from_tsv(file.path()),
            Err(SconeError::DuplicateId(_))
        ));
    }
}
