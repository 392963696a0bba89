//! Feature column selection and matrix encoding

use crate::data::loader::{column_as_f64, column_as_strings, column_names, is_text_column};
use crate::data::text::{CLEAN_SUFFIX, TFIDF_PREFIX};
use crate::error::{PipelineError, Result};
use crate::preprocessing::encoder::LabelEncoder;
use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

/// Model-ready matrices for one dataset
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Feature column names, in matrix column order
    pub columns: Vec<String>,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    /// Encoders fitted on the train partition, one per categorical column
    pub encoders: Vec<LabelEncoder>,
}

/// Pick feature columns, fit categorical encoders on `train` and encode both
/// partitions.
///
/// The label column never becomes a feature. `_clean` text columns, the raw
/// text columns they were cleaned from and free-text columns (more than
/// `max_categories` distinct train values) are dropped; numeric nulls read
/// as 0.0.
pub fn select_features(
    train: &DataFrame,
    test: &DataFrame,
    label: &str,
    max_categories: usize,
) -> Result<FeatureSet> {
    let mut columns = Vec::new();
    let mut encoders = Vec::new();
    let mut dropped = Vec::new();

    let all_columns = column_names(train);
    let vectorized: HashSet<String> = all_columns
        .iter()
        .filter_map(|c| c.strip_suffix(CLEAN_SUFFIX))
        .map(str::to_string)
        .collect();

    for name in all_columns.iter().cloned() {
        // a column with a `_clean` sibling is raw text already covered by tfidf_*
        if name == label || name.ends_with(CLEAN_SUFFIX) || vectorized.contains(&name) {
            dropped.push(name);
            continue;
        }

        if is_text_column(train, &name)? {
            let values = column_as_strings(train, &name)?;
            let distinct: HashSet<&str> = values.iter().flatten().map(String::as_str).collect();
            if !name.starts_with(TFIDF_PREFIX) && distinct.len() > max_categories {
                dropped.push(name);
                continue;
            }

            let mut encoder = LabelEncoder::new(name.as_str());
            encoder.fit(&values)?;
            encoders.push(encoder);
        }

        columns.push(name);
    }

    debug!(?dropped, "Dropped non-feature columns");
    info!(
        features = columns.len(),
        categorical = encoders.len(),
        "Selected feature columns"
    );

    let x_train = encode_frame(train, &columns, &encoders)?;
    let x_test = encode_frame(test, &columns, &encoders)?;

    Ok(FeatureSet {
        columns,
        x_train,
        x_test,
        encoders,
    })
}

/// Build the feature matrix for `columns`, coding categorical columns with
/// their already fitted encoders.
pub fn encode_frame(df: &DataFrame, columns: &[String], encoders: &[LabelEncoder]) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let encoded: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| {
            if df.column(name).is_err() {
                return Err(PipelineError::Schema(name.clone()));
            }
            match encoders.iter().find(|e| e.column() == name) {
                Some(encoder) => encoder.transform(&column_as_strings(df, name)?),
                None => Ok(column_as_f64(df, name)?
                    .into_iter()
                    .map(|v| v.unwrap_or(0.0))
                    .collect()),
            }
        })
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| encoded[j][i]))
}
