//! Label column normalization

use crate::config::DatasetParams;
use crate::data::loader::{column_as_f64, column_as_strings, take_rows};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Rewrite the label column of `df` as Float64 class ids.
///
/// With a label vocabulary, values are trimmed and matched case-insensitively
/// and unmatched rows are dropped. Without one, the column is cast to a
/// number and rows that fail the cast are dropped.
pub fn normalize_labels(df: &DataFrame, dataset: &DatasetParams) -> Result<DataFrame> {
    let label = dataset.label_column.as_str();

    let values: Vec<Option<f64>> = match &dataset.label_map {
        Some(map) => {
            let lowered: BTreeMap<String, i64> = map
                .iter()
                .map(|(k, v)| (k.trim().to_lowercase(), *v))
                .collect();
            column_as_strings(df, label)?
                .into_iter()
                .map(|v| {
                    v.and_then(|s| lowered.get(&s.trim().to_lowercase()).map(|&c| c as f64))
                })
                .collect()
        }
        None => column_as_f64(df, label)?,
    };

    let keep: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_some())
        .map(|(i, _)| i)
        .collect();

    let dropped = df.height() - keep.len();
    if dropped > 0 {
        warn!(dataset = %dataset.name, dropped, "Dropped rows with missing or unmapped labels");
    }

    let labels: Vec<f64> = keep.iter().filter_map(|&i| values[i]).collect();
    let mut out = take_rows(df, &keep)?;
    out.with_column(Series::new(label.into(), labels))?;
    debug!(dataset = %dataset.name, rows = out.height(), "Normalized labels");

    Ok(out)
}

/// Check that every label is 0 or 1
pub fn ensure_binary(labels: &[f64], dataset: &str) -> Result<()> {
    if let Some(bad) = labels.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::Data(format!(
            "dataset '{}' has label {} outside {{0, 1}}",
            dataset, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentiment() -> DatasetParams {
        DatasetParams {
            name: "imdb".to_string(),
            label_column: "sentiment".to_string(),
            label_map: Some(
                [("positive".to_string(), 1), ("negative".to_string(), 0)]
                    .into_iter()
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_label_map_case_insensitive() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "sentiment" => &[Some("Positive"), Some(" negative "), Some("neutral"), None]
        )
        .unwrap();

        let out = normalize_labels(&df, &sentiment()).unwrap();
        assert_eq!(out.height(), 2);
        let y = column_as_f64(&out, "sentiment").unwrap();
        assert_eq!(y, vec![Some(1.0), Some(0.0)]);
        let x = column_as_f64(&out, "x").unwrap();
        assert_eq!(x, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_numeric_labels() {
        let dataset = DatasetParams {
            name: "heart".to_string(),
            label_column: "target".to_string(),
            label_map: None,
        };
        let df = df!("age" => &[50, 60, 70], "target" => &[Some(1i64), None, Some(0)]).unwrap();
        let out = normalize_labels(&df, &dataset).unwrap();
        assert_eq!(column_as_f64(&out, "target").unwrap(), vec![Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_missing_label_column() {
        let df = df!("x" => &[1.0]).unwrap();
        let err = normalize_labels(&df, &sentiment()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_ensure_binary() {
        assert!(ensure_binary(&[0.0, 1.0, 1.0], "heart").is_ok());
        assert!(ensure_binary(&[0.0, 2.0], "heart").is_err());
    }
}
