//! Per-dataset training loop
//!
//! For every configured dataset: load the partitions, normalize labels,
//! balance the training sample, encode features, tune every enabled model
//! family with grid search, keep the one with the best test accuracy and
//! persist it together with its encoders. Each dataset gets one tracker run.

use crate::config::{DatasetParams, Params};
use crate::data::loader::{column_as_f64, load_csv};
use crate::data::sampler::balanced_sample;
use crate::error::{PipelineError, Result};
use crate::preprocessing::{ensure_binary, normalize_labels, select_features, FeatureSet};
use crate::training::artifact::ModelArtifact;
use crate::training::estimator::{Estimator, ParamSet};
use crate::training::grid_search::GridSearch;
use crate::training::models::Classifier;
use crate::tracking::{ExperimentTracker, RunStatus};
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Tuned result of one model family on one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub model_name: String,
    pub best_params: ParamSet,
    pub cv_score: Option<f64>,
    pub test_accuracy: f64,
    pub search_secs: f64,
}

/// Outcome of training one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetOutcome {
    pub dataset: String,
    pub best_model: String,
    pub test_accuracy: f64,
    pub artifact_path: PathBuf,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_columns: usize,
    pub candidates: Vec<CandidateResult>,
}

/// Summary of a full training run, written to the metrics file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub datasets: Vec<DatasetOutcome>,
}

impl TrainingSummary {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

struct Winner {
    candidate: CandidateResult,
    estimator: Estimator,
}

/// Trains every configured dataset against the enabled model families
pub struct Trainer<'a> {
    params: &'a Params,
    tracker: &'a ExperimentTracker,
    pool: Option<rayon::ThreadPool>,
}

impl<'a> Trainer<'a> {
    pub fn new(params: &'a Params, tracker: &'a ExperimentTracker) -> Result<Self> {
        let pool = match params.train.n_jobs {
            Some(n) if n > 0 => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| PipelineError::Training(format!("Thread pool error: {}", e)))?,
            ),
            _ => None,
        };
        Ok(Self { params, tracker, pool })
    }

    /// Train all datasets in order; the first failure aborts the run
    pub fn run(&self) -> Result<TrainingSummary> {
        let mut summary = TrainingSummary::default();
        for dataset in self.params.datasets() {
            summary.datasets.push(self.train_dataset(&dataset)?);
        }
        summary.save(&self.params.output.metrics_path)?;
        info!(
            datasets = summary.datasets.len(),
            path = %self.params.output.metrics_path.display(),
            "Wrote training summary"
        );
        Ok(summary)
    }

    /// Load, encode, tune and persist the best model for one dataset
    pub fn train_dataset(&self, dataset: &DatasetParams) -> Result<DatasetOutcome> {
        let start = Instant::now();
        let label = dataset.label_column.as_str();
        info!(dataset = %dataset.name, "Training dataset");

        let train = normalize_labels(&load_csv(&self.params.train_path(&dataset.name))?, dataset)?;
        let test = normalize_labels(&load_csv(&self.params.test_path(&dataset.name))?, dataset)?;

        let train = balanced_sample(
            &train,
            label,
            self.params.train.sample_size,
            self.params.train.random_state,
        )?;

        let y_train = label_array(&train, label)?;
        let y_test = label_array(&test, label)?;
        ensure_binary(&y_train.to_vec(), &dataset.name)?;
        ensure_binary(&y_test.to_vec(), &dataset.name)?;
        if y_train.is_empty() || y_test.is_empty() {
            return Err(PipelineError::Data(format!(
                "dataset '{}' has an empty partition after label normalization",
                dataset.name
            )));
        }

        let features = select_features(&train, &test, label, self.params.features.max_categories)?;
        for encoder in &features.encoders {
            encoder.save(&self.params.output.models_dir)?;
        }

        info!(
            dataset = %dataset.name,
            train_rows = y_train.len(),
            test_rows = y_test.len(),
            features = features.columns.len(),
            "Prepared training matrices"
        );

        self.tracker.set_experiment(&format!("{}_experiment", dataset.name))?;
        self.tracker.start_run(dataset.name.as_str())?;

        match self.search_and_persist(dataset, &features, &y_train, &y_test) {
            Ok(outcome) => {
                self.tracker.end_run(RunStatus::Finished)?;
                info!(
                    dataset = %dataset.name,
                    best_model = %outcome.best_model,
                    test_accuracy = outcome.test_accuracy,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "Dataset finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(end_err) = self.tracker.end_run(RunStatus::Failed) {
                    warn!(error = %end_err, "Could not close failed run");
                }
                Err(e)
            }
        }
    }

    fn search_and_persist(
        &self,
        dataset: &DatasetParams,
        features: &FeatureSet,
        y_train: &Array1<f64>,
        y_test: &Array1<f64>,
    ) -> Result<DatasetOutcome> {
        let train = &self.params.train;
        let tracker = self.tracker;

        tracker.log_params([
            ("dataset", dataset.name.clone()),
            ("label_column", dataset.label_column.clone()),
            ("sample_size", train.sample_size.to_string()),
            ("cv_folds", train.cv_folds.to_string()),
            ("random_state", train.random_state.to_string()),
            ("train_rows", y_train.len().to_string()),
            ("n_features", features.columns.len().to_string()),
        ])?;

        let mut candidates = Vec::new();
        let mut winner: Option<Winner> = None;

        for spec in self.params.enabled_models() {
            let search = GridSearch::from_spec(spec)?
                .with_cv_folds(train.cv_folds)
                .with_random_state(train.random_state);

            let result = match &self.pool {
                Some(pool) => pool.install(|| search.fit(&features.x_train, y_train))?,
                None => search.fit(&features.x_train, y_train)?,
            };

            let test_accuracy = result.estimator.score(&features.x_test, y_test)?;
            tracker.log_metric(format!("{}_acc", spec.name), test_accuracy, None)?;
            if let Some(cv) = result.best_score {
                tracker.log_metric(format!("{}_cv_score", spec.name), cv, None)?;
            }

            info!(
                dataset = %dataset.name,
                model = %spec.name,
                cv_score = ?result.best_score,
                test_accuracy,
                "Tuned candidate"
            );

            let candidate = CandidateResult {
                model_name: spec.name.clone(),
                best_params: result.best_params,
                cv_score: result.best_score,
                test_accuracy,
                search_secs: result.elapsed_secs,
            };

            let improves = winner
                .as_ref()
                .map_or(true, |w| test_accuracy > w.candidate.test_accuracy);
            if improves {
                winner = Some(Winner {
                    candidate: candidate.clone(),
                    estimator: result.estimator,
                });
            }
            candidates.push(candidate);
        }

        let Winner { candidate, estimator } = winner
            .ok_or_else(|| PipelineError::Config("no enabled models to train".to_string()))?;

        let artifact = ModelArtifact {
            dataset: dataset.clone(),
            model_name: candidate.model_name.clone(),
            feature_columns: features.columns.clone(),
            encoders: features.encoders.clone(),
            best_params: candidate.best_params.clone(),
            cv_score: candidate.cv_score,
            test_accuracy: candidate.test_accuracy,
            estimator,
            created_at: chrono::Utc::now(),
        };
        let artifact_path = artifact.save(&self.params.output.models_dir)?;

        tracker.log_param("best_model", &candidate.model_name)?;
        tracker.log_tag("model_family", artifact.estimator.kind().name())?;
        tracker.log_params(
            candidate
                .best_params
                .iter()
                .map(|(k, v)| (format!("{}.{}", candidate.model_name, k), v)),
        )?;
        tracker.log_metric("best_acc", candidate.test_accuracy, None)?;
        tracker.log_artifact(format!("{}_model", dataset.name), &artifact_path)?;

        Ok(DatasetOutcome {
            dataset: dataset.name.clone(),
            best_model: candidate.model_name,
            test_accuracy: candidate.test_accuracy,
            artifact_path,
            train_rows: y_train.len(),
            test_rows: y_test.len(),
            feature_columns: features.columns.len(),
            candidates,
        })
    }
}

fn label_array(df: &DataFrame, label: &str) -> Result<Array1<f64>> {
    Ok(column_as_f64(df, label)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}
