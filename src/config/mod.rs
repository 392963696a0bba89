//! Pipeline parameters
//!
//! Everything the stages need is read once from `params.yaml` into [`Params`]
//! and passed down by reference. Required keys:
//!
//! - `train.test_size` (or `train.split`), `train.sample_size`,
//!   `train.random_state`, `train.cv_folds`
//! - `data.label_column`, `data.heart_label_column`
//! - `models.<name>.enabled`, `models.<name>.params`
//!
//! Missing any of them is a configuration error.

use crate::error::{PipelineError, Result};
use crate::training::ModelKind;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root parameter document
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    pub train: TrainParams,
    pub data: DataParams,
    #[serde(default)]
    pub features: FeatureParams,
    #[serde(default)]
    pub output: OutputParams,
    /// Candidate models in file order
    #[serde(deserialize_with = "ordered_models")]
    pub models: Vec<ModelSpec>,
}

/// `train.*` section
#[derive(Debug, Clone, Deserialize)]
pub struct TrainParams {
    /// Fraction of rows held out for the test partition
    #[serde(alias = "split")]
    pub test_size: f64,
    /// Row budget for the class-balanced training sample
    pub sample_size: usize,
    /// Seed shared by every random stage
    pub random_state: u64,
    /// Folds used by grid search
    pub cv_folds: usize,
    /// Worker threads for grid search (None = all cores)
    #[serde(default)]
    pub n_jobs: Option<usize>,
}

/// `data.*` section
#[derive(Debug, Clone, Deserialize)]
pub struct DataParams {
    /// Label column of the sentiment dataset
    pub label_column: String,
    /// Label column of the clinical dataset
    pub heart_label_column: String,
    /// Directory holding the train/test partitions
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    /// Source table for the toy two-feature dataset
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Synthetic rows appended to the toy dataset
    #[serde(default = "default_synthetic_samples")]
    pub synthetic_samples: usize,
    /// Raw tables for the named datasets, keyed by dataset name
    #[serde(default)]
    pub raw: BTreeMap<String, RawDataset>,
    /// Datasets the trainer walks through (defaults to sentiment + clinical)
    #[serde(default)]
    pub datasets: Option<Vec<DatasetParams>>,
}

/// `data.raw.<name>` entry
#[derive(Debug, Clone, Deserialize)]
pub struct RawDataset {
    pub path: PathBuf,
    /// Free-text column to vectorize into `tfidf_*` features
    #[serde(default)]
    pub text_column: Option<String>,
}

/// One dataset the trainer handles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetParams {
    pub name: String,
    pub label_column: String,
    /// Text label vocabulary (matched case-insensitively)
    #[serde(default)]
    pub label_map: Option<BTreeMap<String, i64>>,
}

/// `features.*` section
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureParams {
    #[serde(default = "default_max_tfidf_features")]
    pub max_tfidf_features: usize,
    /// String columns with more distinct training values are treated as free text
    #[serde(default = "default_max_categories")]
    pub max_categories: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_tfidf_features: default_max_tfidf_features(),
            max_categories: default_max_categories(),
        }
    }
}

/// `output.*` section
#[derive(Debug, Clone, Deserialize)]
pub struct OutputParams {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,
    /// Summary of every dataset's candidates, written after training
    #[serde(default = "default_metrics_path")]
    pub metrics_path: PathBuf,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            tracking_dir: default_tracking_dir(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// A candidate model family and its hyperparameter grid
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub enabled: bool,
    pub grid: BTreeMap<String, Vec<ParamValue>>,
}

#[derive(Deserialize)]
struct RawModelSpec {
    enabled: bool,
    params: BTreeMap<String, GridValues>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GridValues {
    Many(Vec<ParamValue>),
    One(ParamValue),
}

fn ordered_models<'de, D>(deserializer: D) -> std::result::Result<Vec<ModelSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    mapping
        .into_iter()
        .map(|(key, value)| {
            let name = key
                .as_str()
                .ok_or_else(|| D::Error::custom("model names must be strings"))?
                .to_string();
            let raw: RawModelSpec = serde_yaml::from_value(value)
                .map_err(|e| D::Error::custom(format!("models.{}: {}", name, e)))?;
            let grid = raw
                .params
                .into_iter()
                .map(|(k, v)| {
                    let values = match v {
                        GridValues::Many(values) => values,
                        GridValues::One(value) => vec![value],
                    };
                    (k, values)
                })
                .collect();
            Ok(ModelSpec {
                name,
                enabled: raw.enabled,
                grid,
            })
        })
        .collect()
}

/// A single hyperparameter value from the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            other => Err(invalid(name, other, "expected a number")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            other => Err(invalid(name, other, "expected a non-negative integer")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(invalid(name, other, "expected a boolean")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Str(v) => Ok(v),
            other => Err(invalid(name, other, "expected a string")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
        }
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl Params {
    /// Load and validate a parameter file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let params = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), models = params.models.len(), "Loaded parameters");
        Ok(params)
    }

    /// Parse and validate a parameter document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let params: Params = serde_yaml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if !(self.train.test_size > 0.0 && self.train.test_size < 1.0) {
            return Err(PipelineError::Config(format!(
                "train.test_size must be in (0, 1), got {}",
                self.train.test_size
            )));
        }
        if self.train.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "train.cv_folds must be at least 2, got {}",
                self.train.cv_folds
            )));
        }
        if self.train.sample_size == 0 {
            return Err(PipelineError::Config("train.sample_size must be positive".to_string()));
        }
        if self.models.is_empty() {
            return Err(PipelineError::Config("models must list at least one model".to_string()));
        }
        // disabled entries must still name a known family
        for model in &self.models {
            model.name.parse::<ModelKind>()?;
        }
        Ok(())
    }

    /// Enabled models in file order
    pub fn enabled_models(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.iter().filter(|m| m.enabled)
    }

    /// Datasets for the trainer; defaults to the sentiment and clinical sets
    pub fn datasets(&self) -> Vec<DatasetParams> {
        if let Some(datasets) = &self.data.datasets {
            return datasets.clone();
        }

        let sentiment: BTreeMap<String, i64> = [("positive".to_string(), 1), ("negative".to_string(), 0)]
            .into_iter()
            .collect();

        vec![
            DatasetParams {
                name: "imdb".to_string(),
                label_column: self.data.label_column.clone(),
                label_map: Some(sentiment),
            },
            DatasetParams {
                name: "heart".to_string(),
                label_column: self.data.heart_label_column.clone(),
                label_map: None,
            },
        ]
    }

    /// Train partition path for a named dataset
    pub fn train_path(&self, dataset: &str) -> PathBuf {
        self.data.dir.join(format!("{}_train.csv", dataset))
    }

    /// Test partition path for a named dataset
    pub fn test_path(&self, dataset: &str) -> PathBuf {
        self.data.dir.join(format!("{}_test.csv", dataset))
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_source() -> PathBuf {
    PathBuf::from("dataset.csv")
}

fn default_synthetic_samples() -> usize {
    1000
}

fn default_max_tfidf_features() -> usize {
    1500
}

fn default_max_categories() -> usize {
    50
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("metrics/train_metrics.json")
}
