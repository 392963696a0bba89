//! CSV loading/saving and row-level table helpers

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Separator used when joining cell values into a row key
const KEY_SEPARATOR: char = '\u{1f}';

/// Load a CSV table with a header row
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

/// Write a table as CSV, creating parent directories as needed
pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)?;

    Ok(())
}

/// Read a column as optional f64 values (casting numeric and boolean types)
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    let values = casted
        .as_materialized_series()
        .f64()?
        .into_iter()
        .collect();
    Ok(values)
}

/// Read a column as optional strings (any dtype is rendered to text)
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(name.to_string()))?;
    let casted = column.cast(&DataType::String)?;
    let values = casted
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Whether a column holds free-form strings
pub fn is_text_column(df: &DataFrame, name: &str) -> Result<bool> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(name.to_string()))?;
    Ok(matches!(column.dtype(), DataType::String))
}

/// Column names in table order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Select rows by position, preserving the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Drop rows whose given column is null
pub fn drop_null_rows(df: &DataFrame, name: &str) -> Result<DataFrame> {
    let values = column_as_strings(df, name)?;
    let keep: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_some())
        .map(|(i, _)| i)
        .collect();
    if keep.len() == df.height() {
        return Ok(df.clone());
    }
    take_rows(df, &keep)
}

/// Render every row to a single comparable key
pub fn row_keys(df: &DataFrame) -> Result<Vec<String>> {
    let columns: Vec<Vec<Option<String>>> = column_names(df)
        .iter()
        .map(|name| column_as_strings(df, name))
        .collect::<Result<_>>()?;

    let keys = (0..df.height())
        .map(|row| {
            let mut key = String::new();
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    key.push(KEY_SEPARATOR);
                }
                match &column[row] {
                    Some(v) => key.push_str(v),
                    None => key.push_str("\u{0}null"),
                }
            }
            key
        })
        .collect();

    Ok(keys)
}

/// Drop exact duplicate rows, keeping the first occurrence
pub fn dedup_rows(df: &DataFrame) -> Result<DataFrame> {
    let keys = row_keys(df)?;
    let mut seen = HashSet::with_capacity(keys.len());
    let keep: Vec<usize> = keys
        .into_iter()
        .enumerate()
        .filter(|(_, key)| seen.insert(key.clone()))
        .map(|(i, _)| i)
        .collect();

    if keep.len() == df.height() {
        return Ok(df.clone());
    }
    take_rows(df, &keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "a" => &[1.0, 2.0, 1.0, 3.0],
            "b" => &["x", "y", "x", "z"]
        )
        .unwrap()
    }

    #[test]
    fn test_dedup_rows_keeps_first() {
        let df = sample_df();
        let deduped = dedup_rows(&df).unwrap();
        assert_eq!(deduped.height(), 3);
        let a = column_as_f64(&deduped, "a").unwrap();
        assert_eq!(a, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_take_rows_order() {
        let df = sample_df();
        let taken = take_rows(&df, &[3, 0]).unwrap();
        let b = column_as_strings(&taken, "b").unwrap();
        assert_eq!(b, vec![Some("z".to_string()), Some("x".to_string())]);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = sample_df();
        let err = column_as_f64(&df, "label").unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_is_text_column() {
        let df = sample_df();
        assert!(is_text_column(&df, "b").unwrap());
        assert!(!is_text_column(&df, "a").unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_csv(Path::new("/nonexistent/train.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("t.csv");
        let mut df = sample_df();
        save_csv(&mut df, &path).unwrap();
        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.height(), 4);
        assert_eq!(column_names(&loaded), vec!["a", "b"]);
    }
}
