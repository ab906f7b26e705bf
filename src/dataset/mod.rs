//! Input-table loading and feature selection
//!
//! Reads the observation table (CSV) and the newline-delimited feature-list
//! file, then materializes the usable dataset: the selected feature columns
//! plus target and identifier, restricted to fully populated rows.

use crate::error::{Result, SweepError};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Name of the target column (known retention time).
pub const TARGET_COLUMN: &str = "time";

/// Name of the per-row identifier column.
pub const ID_COLUMN: &str = "IDENTIFIER";

/// Token in the feature-list file that names the system itself, not a column.
const SYSTEM_TOKEN: &str = "system";

/// Read a newline-delimited feature-list file.
///
/// Lines are trimmed; empty lines and the literal `system` token are
/// dropped. The target and identifier columns may appear in the list but
/// are never treated as features.
pub fn read_feature_list(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .map_err(|e| SweepError::DataError(format!("{}: {}", path.display(), e)))?;

    let mut names = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let name = line.trim();
        if name.is_empty() || name == SYSTEM_TOKEN {
            continue;
        }
        names.push(name.to_string());
    }

    Ok(names)
}

/// The usable dataset: dense feature matrix, target vector, and row
/// identifiers, with incomplete rows already excluded.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    target: Array1<f64>,
    identifiers: Vec<String>,
    feature_names: Vec<String>,
}

/// A row subset of the dataset (train or test side of a split).
#[derive(Debug, Clone)]
pub struct Table {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
    pub identifiers: Vec<String>,
}

impl Table {
    pub fn n_rows(&self) -> usize {
        self.target.len()
    }
}

impl Dataset {
    /// Load a CSV table and select the named columns.
    pub fn load(path: &Path, feature_names: &[String]) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| SweepError::DataError(e.to_string()))?
            .finish()
            .map_err(|e| SweepError::DataError(e.to_string()))?;

        Self::from_frame(&df, feature_names)
    }

    /// Build the usable dataset from an already loaded frame.
    ///
    /// `feature_names` is the feature-list file content; target and
    /// identifier entries in it are ignored as features but both columns
    /// must exist in the frame. Rows with a missing value in any selected
    /// column are excluded.
    pub fn from_frame(df: &DataFrame, feature_names: &[String]) -> Result<Self> {
        let feature_names: Vec<String> = feature_names
            .iter()
            .filter(|n| n.as_str() != TARGET_COLUMN && n.as_str() != ID_COLUMN)
            .cloned()
            .collect();

        if feature_names.is_empty() {
            return Err(SweepError::DataError(
                "feature list selects no feature columns".to_string(),
            ));
        }

        let columns: Vec<Vec<Option<f64>>> = feature_names
            .iter()
            .map(|name| column_f64(df, name))
            .collect::<Result<Vec<_>>>()?;
        let target = column_f64(df, TARGET_COLUMN)?;
        let identifiers = column_str(df, ID_COLUMN)?;

        // Keep only rows populated across every selected column.
        let keep: Vec<usize> = (0..df.height())
            .filter(|&i| {
                target[i].is_some()
                    && identifiers[i].is_some()
                    && columns.iter().all(|c| c[i].is_some())
            })
            .collect();

        let features = Array2::from_shape_fn((keep.len(), columns.len()), |(r, c)| {
            columns[c][keep[r]].unwrap_or(0.0)
        });
        let target = Array1::from_iter(keep.iter().map(|&i| target[i].unwrap_or(0.0)));
        let identifiers = keep
            .iter()
            .map(|&i| identifiers[i].clone().unwrap_or_default())
            .collect();

        Ok(Self {
            features,
            target,
            identifiers,
            feature_names,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Materialize the rows at the given positions as a dense table.
    pub fn select(&self, rows: &[usize]) -> Table {
        Table {
            features: self.features.select(Axis(0), rows),
            target: self.target.select(Axis(0), rows),
            identifiers: rows.iter().map(|&i| self.identifiers[i].clone()).collect(),
        }
    }
}

/// Extract a column as f64 values, casting if needed.
fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| SweepError::FeatureNotFound(name.to_string()))?;
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|e| SweepError::DataError(e.to_string()))?;
    Ok(casted
        .f64()
        .map_err(|e| SweepError::DataError(e.to_string()))?
        .into_iter()
        .collect())
}

/// Extract a column as strings, casting if needed.
fn column_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| SweepError::FeatureNotFound(name.to_string()))?;
    let casted = column
        .cast(&DataType::String)
        .map_err(|e| SweepError::DataError(e.to_string()))?;
    Ok(casted
        .as_materialized_series()
        .str()
        .map_err(|e| SweepError::DataError(e.to_string()))?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_df() -> DataFrame {
        df!(
            "IDENTIFIER" => &["a", "b", "c", "d"],
            "time" => &[Some(1.0), Some(2.0), None, Some(4.0)],
            "f1" => &[Some(0.1), Some(0.2), Some(0.3), None],
            "f2" => &[1.0, 2.0, 3.0, 4.0],
            "unrelated" => &[9.0, 9.0, 9.0, 9.0]
        )
        .unwrap()
    }

    #[test]
    fn test_incomplete_rows_excluded() {
        let names = vec!["f1".to_string(), "f2".to_string()];
        let ds = Dataset::from_frame(&sample_df(), &names).unwrap();

        // Rows "c" (missing time) and "d" (missing f1) are dropped.
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.identifiers, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ds.feature_names(), &["f1".to_string(), "f2".to_string()]);
    }

    #[test]
    fn test_target_and_id_not_features() {
        let names = vec![
            "time".to_string(),
            "IDENTIFIER".to_string(),
            "f1".to_string(),
        ];
        let ds = Dataset::from_frame(&sample_df(), &names).unwrap();
        assert_eq!(ds.feature_names(), &["f1".to_string()]);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let names = vec!["nope".to_string()];
        let err = Dataset::from_frame(&sample_df(), &names).unwrap_err();
        assert!(matches!(err, SweepError::FeatureNotFound(_)));
    }

    #[test]
    fn test_select_rows() {
        let names = vec!["f1".to_string(), "f2".to_string()];
        let ds = Dataset::from_frame(&sample_df(), &names).unwrap();
        let table = ds.select(&[1]);

        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.identifiers, vec!["b".to_string()]);
        assert!((table.target[0] - 2.0).abs() < 1e-12);
        assert!((table.features[[0, 1]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_read_feature_list_filters_system_token() {
        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .unwrap();
        writeln!(file, "f1").unwrap();
        writeln!(file, "system").unwrap();
        writeln!(file, "  f2  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "time").unwrap();

        let names = read_feature_list(file.path()).unwrap();
        assert_eq!(
            names,
            vec!["f1".to_string(), "f2".to_string(), "time".to_string()]
        );
    }
}
