//! Preparation stages that turn raw tables into train/test partitions

use crate::config::Params;
use crate::data::loader::{
    column_as_f64, column_as_strings, dedup_rows, drop_null_rows, load_csv, save_csv, take_rows,
};
use crate::data::split::stratified_split;
use crate::data::synthetic::ToyGenerator;
use crate::data::text::{clean_text, TfidfVectorizer, CLEAN_SUFFIX};
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where a preparation stage wrote its partitions
#[derive(Debug, Clone)]
pub struct PreparedSplit {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub train_rows: usize,
    pub test_rows: usize,
    pub columns: usize,
}

/// Toy two-feature dataset: source rows plus synthetic rows, deduplicated,
/// stratified on `label`, written to `<out_dir>/train.csv` and `<out_dir>/test.csv`.
pub fn prepare_toy_dataset(params: &Params, source: &Path, out_dir: &Path) -> Result<PreparedSplit> {
    let raw = load_csv(source)?;
    let feature1 = column_as_f64(&raw, "feature1")?;
    let feature2 = column_as_f64(&raw, "feature2")?;
    let label = column_as_f64(&raw, "label")?;
    info!(path = %source.display(), rows = raw.height(), "Loaded source table");

    let synthetic = ToyGenerator::new(params.train.random_state).generate(params.data.synthetic_samples)?;
    let syn_f1 = column_as_f64(&synthetic, "feature1")?;
    let syn_f2 = column_as_f64(&synthetic, "feature2")?;
    let syn_label = column_as_f64(&synthetic, "label")?;

    let mut f1 = Vec::with_capacity(raw.height() + synthetic.height());
    let mut f2 = Vec::with_capacity(raw.height() + synthetic.height());
    let mut y = Vec::with_capacity(raw.height() + synthetic.height());
    for ((a, b), c) in feature1
        .into_iter()
        .zip(feature2)
        .zip(label)
        .chain(syn_f1.into_iter().zip(syn_f2).zip(syn_label))
    {
        // rows without a label cannot be stratified
        let Some(c) = c else { continue };
        f1.push(a);
        f2.push(b);
        y.push(c.round() as i64);
    }

    let combined = df!(
        "feature1" => f1,
        "feature2" => f2,
        "label" => y
    )?;
    let combined = dedup_rows(&combined)?;
    info!(
        rows = combined.height(),
        synthetic = params.data.synthetic_samples,
        "Combined and deduplicated"
    );

    let (mut train, mut test) = split_frame(&combined, "label", params)?;
    let train_path = out_dir.join("train.csv");
    let test_path = out_dir.join("test.csv");
    save_csv(&mut train, &train_path)?;
    save_csv(&mut test, &test_path)?;

    info!(
        train_shape = ?train.shape(),
        test_shape = ?test.shape(),
        dir = %out_dir.display(),
        "Wrote toy partitions"
    );

    Ok(PreparedSplit {
        train_path,
        test_path,
        train_rows: train.height(),
        test_rows: test.height(),
        columns: train.width(),
    })
}

/// Named dataset (e.g. `imdb`, `heart`): raw table from `data.raw.<name>`,
/// optional TF-IDF expansion of its text column, written to
/// `<data.dir>/<name>_train.csv` and `<data.dir>/<name>_test.csv`.
pub fn prepare_named_dataset(params: &Params, name: &str) -> Result<PreparedSplit> {
    let raw_spec = params
        .data
        .raw
        .get(name)
        .ok_or_else(|| PipelineError::Config(format!("data.raw.{} is not configured", name)))?;
    let dataset = params
        .datasets()
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| PipelineError::Config(format!("dataset '{}' is not configured", name)))?;

    let raw = load_csv(&raw_spec.path)?;
    info!(dataset = name, path = %raw_spec.path.display(), rows = raw.height(), "Loaded raw table");

    let raw = drop_null_rows(&raw, &dataset.label_column)?;
    let raw = dedup_rows(&raw)?;
    let (mut train, mut test) = split_frame(&raw, &dataset.label_column, params)?;

    if let Some(text_column) = &raw_spec.text_column {
        let (train_docs, test_docs) = (clean_column(&train, text_column)?, clean_column(&test, text_column)?);
        let clean_name = format!("{}{}", text_column, CLEAN_SUFFIX);
        train.with_column(Series::new(clean_name.as_str().into(), train_docs.clone()))?;
        test.with_column(Series::new(clean_name.as_str().into(), test_docs.clone()))?;

        let mut vectorizer = TfidfVectorizer::new(params.features.max_tfidf_features);
        let train_tfidf = vectorizer.fit_transform(&train_docs)?;
        let test_tfidf = vectorizer.transform(&test_docs)?;
        let names = vectorizer.feature_names();

        train = train.hstack(&matrix_columns(&names, &train_tfidf))?;
        test = test.hstack(&matrix_columns(&names, &test_tfidf))?;
        info!(dataset = name, terms = names.len(), "Vectorized text column");
    }

    let train_path = params.train_path(name);
    let test_path = params.test_path(name);
    save_csv(&mut train, &train_path)?;
    save_csv(&mut test, &test_path)?;

    info!(
        dataset = name,
        train_shape = ?train.shape(),
        test_shape = ?test.shape(),
        "Wrote dataset partitions"
    );

    Ok(PreparedSplit {
        train_path,
        test_path,
        train_rows: train.height(),
        test_rows: test.height(),
        columns: train.width(),
    })
}

fn split_frame(df: &DataFrame, label: &str, params: &Params) -> Result<(DataFrame, DataFrame)> {
    let labels: Vec<String> = column_as_strings(df, label)?
        .into_iter()
        .map(|v| v.unwrap_or_default())
        .collect();
    let split = stratified_split(&labels, params.train.test_size, params.train.random_state)?;
    Ok((take_rows(df, &split.train)?, take_rows(df, &split.test)?))
}

fn clean_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    Ok(column_as_strings(df, name)?
        .into_iter()
        .map(|v| v.as_deref().map(clean_text).unwrap_or_default())
        .collect())
}

fn matrix_columns(names: &[String], matrix: &Array2<f64>) -> Vec<Column> {
    names
        .iter()
        .enumerate()
        .map(|(j, name)| Column::from(Series::new(name.as_str().into(), matrix.column(j).to_vec())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::column_names;

    fn params(dir: &Path) -> Params {
        let doc = format!(
            r#"
train:
  test_size: 0.25
  sample_size: 100
  random_state: 42
  cv_folds: 3
data:
  label_column: sentiment
  heart_label_column: target
  dir: {dir}
  synthetic_samples: 40
  raw:
    imdb:
      path: {dir}/imdb.csv
      text_column: review
features:
  max_tfidf_features: 5
models:
  lr:
    enabled: true
    params:
      C: [1.0]
"#,
            dir = dir.display()
        );
        Params::from_yaml_str(&doc).unwrap()
    }

    #[test]
    fn test_prepare_toy_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("dataset.csv");
        std::fs::write(&source, "feature1,feature2,label\n1.0,2.0,0\n1.0,2.0,0\n8.0,7.5,1\n").unwrap();

        let params = params(dir.path());
        let out = dir.path().join("data");
        let prepared = prepare_toy_dataset(&params, &source, &out).unwrap();

        // 3 source rows with one duplicate + 40 synthetic rows
        assert_eq!(prepared.train_rows + prepared.test_rows, 42);
        assert_eq!(prepared.test_rows, 11);
        assert!(prepared.train_path.exists());
        assert!(prepared.test_path.exists());
    }

    #[test]
    fn test_prepare_toy_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let params = params(dir.path());
        let err = prepare_toy_dataset(&params, &dir.path().join("nope.csv"), dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_prepare_named_dataset_with_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("review,sentiment\n");
        for i in 0..12 {
            csv.push_str(&format!("\"Great movie, loved it {}\",positive\n", i));
            csv.push_str(&format!("\"Awful <br/> plot, boring {}\",negative\n", i));
        }
        csv.push_str("\"no label here\",\n");
        std::fs::write(dir.path().join("imdb.csv"), csv).unwrap();

        let params = params(dir.path());
        let prepared = prepare_named_dataset(&params, "imdb").unwrap();
        assert_eq!(prepared.train_rows + prepared.test_rows, 24);
        assert_eq!(prepared.test_rows, 6);

        let train = load_csv(&prepared.train_path).unwrap();
        let names = column_names(&train);
        assert!(names.contains(&"review_clean".to_string()));
        let tfidf = names.iter().filter(|n| n.starts_with("tfidf_")).count();
        assert_eq!(tfidf, 5);
    }

    #[test]
    fn test_prepare_unknown_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let params = params(dir.path());
        let err = prepare_named_dataset(&params, "heart").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
