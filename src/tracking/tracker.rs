//! Experiment tracker
//!
//! Experiments group runs by name; a run collects parameters, metrics and
//! artifacts until it is ended, at which point it is appended to its
//! experiment and the store is saved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::storage::{LocalStorage, StorageBackend};
use crate::error::{PipelineError, Result};

/// A single metric value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub step: u64,
    pub timestamp: DateTime<Utc>,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// A run within an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    /// Latest value per metric
    pub metrics: BTreeMap<String, f64>,
    pub metrics_history: Vec<Metric>,
    pub tags: BTreeMap<String, String>,
    /// Artifact name to stored location
    pub artifacts: BTreeMap<String, String>,
    pub status: RunStatus,
}

impl Run {
    fn new(run_name: impl Into<String>, experiment_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            experiment_id: experiment_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            metrics_history: Vec::new(),
            tags: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            status: RunStatus::Running,
        }
    }

    /// Run duration in seconds
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
    pub tags: BTreeMap<String, String>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            runs: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

/// Experiment tracker over a pluggable storage backend
pub struct ExperimentTracker {
    storage: Arc<dyn StorageBackend>,
    current_experiment: RwLock<Option<String>>,
    current_run: RwLock<Option<Run>>,
    experiments: RwLock<BTreeMap<String, Experiment>>,
}

fn poisoned<T>(_: T) -> PipelineError {
    PipelineError::Tracking("tracker lock poisoned".to_string())
}

impl ExperimentTracker {
    /// Open a tracker over `storage`, loading what it already holds
    pub fn new(storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let experiments = storage
            .load_experiments()?
            .into_iter()
            .map(|e| (e.experiment_id.clone(), e))
            .collect();

        Ok(Self {
            storage,
            current_experiment: RwLock::new(None),
            current_run: RwLock::new(None),
            experiments: RwLock::new(experiments),
        })
    }

    /// Tracker backed by a local directory such as `mlruns/`
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(Arc::new(LocalStorage::new(dir)))
    }

    /// Select the experiment called `name`, creating it if needed; returns its id
    pub fn set_experiment(&self, name: &str) -> Result<String> {
        let mut experiments = self.experiments.write().map_err(poisoned)?;
        let id = match experiments.values().find(|e| e.name == name) {
            Some(existing) => existing.experiment_id.clone(),
            None => {
                let experiment = Experiment::new(name);
                let id = experiment.experiment_id.clone();
                experiments.insert(id.clone(), experiment);
                info!(experiment = name, id = %id, "Created experiment");
                id
            }
        };
        *self.current_experiment.write().map_err(poisoned)? = Some(id.clone());
        Ok(id)
    }

    /// Start a run in the current experiment; returns the run id
    pub fn start_run(&self, run_name: impl Into<String>) -> Result<String> {
        let experiment_id = self
            .current_experiment
            .read()
            .map_err(poisoned)?
            .clone()
            .ok_or_else(|| PipelineError::Tracking("no experiment selected".to_string()))?;

        let mut current = self.current_run.write().map_err(poisoned)?;
        if let Some(active) = current.as_ref() {
            return Err(PipelineError::Tracking(format!("run {} is still active", active.run_id)));
        }

        let run = Run::new(run_name, &experiment_id);
        let run_id = run.run_id.clone();
        debug!(run_id = %run_id, experiment_id = %experiment_id, "Started run");
        *current = Some(run);
        Ok(run_id)
    }

    fn with_run<T>(&self, f: impl FnOnce(&mut Run) -> Result<T>) -> Result<T> {
        let mut guard = self.current_run.write().map_err(poisoned)?;
        let run = guard
            .as_mut()
            .ok_or_else(|| PipelineError::Tracking("no active run".to_string()))?;
        f(run)
    }

    pub fn log_param(&self, key: impl Into<String>, value: impl ToString) -> Result<()> {
        self.with_run(|r| {
            r.params.insert(key.into(), value.to_string());
            Ok(())
        })
    }

    pub fn log_params<K, V>(&self, params: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: ToString,
    {
        self.with_run(|r| {
            r.params
                .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
            Ok(())
        })
    }

    pub fn log_metric(&self, name: impl Into<String>, value: f64, step: Option<u64>) -> Result<()> {
        let name = name.into();
        self.with_run(|r| {
            r.metrics.insert(name.clone(), value);
            r.metrics_history.push(Metric {
                name,
                value,
                step: step.unwrap_or(0),
                timestamp: Utc::now(),
            });
            Ok(())
        })
    }

    pub fn log_tag(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.with_run(|r| {
            r.tags.insert(key.into(), value.into());
            Ok(())
        })
    }

    /// Store a copy of `path` under the active run as artifact `name`
    pub fn log_artifact(&self, name: impl Into<String>, path: &Path) -> Result<String> {
        let name = name.into();
        let storage = Arc::clone(&self.storage);
        self.with_run(|r| {
            let location = storage.store_artifact(&r.experiment_id, &r.run_id, &name, path)?;
            debug!(artifact = %name, location = %location, "Logged artifact");
            r.artifacts.insert(name, location.clone());
            Ok(location)
        })
    }

    /// Close the active run, attach it to its experiment and persist the store
    pub fn end_run(&self, status: RunStatus) -> Result<Run> {
        let mut run = self
            .current_run
            .write()
            .map_err(poisoned)?
            .take()
            .ok_or_else(|| PipelineError::Tracking("no active run".to_string()))?;
        run.end_time = Some(Utc::now());
        run.status = status;

        {
            let mut experiments = self.experiments.write().map_err(poisoned)?;
            let experiment = experiments
                .get_mut(&run.experiment_id)
                .ok_or_else(|| PipelineError::Tracking(format!("unknown experiment {}", run.experiment_id)))?;
            experiment.runs.push(run.clone());
        }
        self.save()?;

        info!(
            run_id = %run.run_id,
            status = ?run.status,
            metrics = run.metrics.len(),
            duration_secs = run.duration_secs(),
            "Ended run"
        );
        Ok(run)
    }

    /// Snapshot of the active run
    pub fn current_run(&self) -> Option<Run> {
        self.current_run.read().ok().and_then(|r| r.clone())
    }

    pub fn get_experiment_by_name(&self, name: &str) -> Option<Experiment> {
        self.experiments
            .read()
            .ok()?
            .values()
            .find(|e| e.name == name)
            .cloned()
    }

    pub fn list_experiments(&self) -> Vec<Experiment> {
        self.experiments
            .read()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Persist every experiment to the backend
    pub fn save(&self) -> Result<()> {
        let experiments: Vec<Experiment> = self.experiments.read().map_err(poisoned)?.values().cloned().collect();
        self.storage.save_experiments(&experiments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::storage::InMemoryStorage;

    fn tracker() -> ExperimentTracker {
        ExperimentTracker::new(Arc::new(InMemoryStorage::new())).unwrap()
    }

    #[test]
    fn test_tracker_basic() {
        let tracker = tracker();
        let exp_id = tracker.set_experiment("heart_experiment").unwrap();
        assert!(!exp_id.is_empty());

        tracker.start_run("heart").unwrap();
        tracker.log_param("sample_size", 2000).unwrap();
        tracker.log_params([("best_model", "gbm")]).unwrap();
        tracker.log_metric("gbm_acc", 0.85, None).unwrap();
        let run = tracker.end_run(RunStatus::Finished).unwrap();

        assert_eq!(run.params["sample_size"], "2000");
        assert_eq!(run.metrics["gbm_acc"], 0.85);
        let exp = tracker.get_experiment_by_name("heart_experiment").unwrap();
        assert_eq!(exp.runs.len(), 1);
        assert_eq!(exp.runs[0].status, RunStatus::Finished);
    }

    #[test]
    fn test_set_experiment_reuses_name() {
        let tracker = tracker();
        let a = tracker.set_experiment("imdb_experiment").unwrap();
        let b = tracker.set_experiment("imdb_experiment").unwrap();
        assert_eq!(a, b);
        assert_eq!(tracker.list_experiments().len(), 1);
    }

    #[test]
    fn test_run_requires_experiment() {
        assert!(tracker().start_run("x").is_err());
    }

    #[test]
    fn test_logging_without_run_fails() {
        let tracker = tracker();
        tracker.set_experiment("e").unwrap();
        assert!(tracker.log_metric("acc", 1.0, None).is_err());
        assert!(tracker.end_run(RunStatus::Finished).is_err());
    }

    #[test]
    fn test_metrics_history() {
        let tracker = tracker();
        tracker.set_experiment("test").unwrap();
        tracker.start_run("run").unwrap();
        tracker.log_metric("loss", 1.0, Some(0)).unwrap();
        tracker.log_metric("loss", 0.5, Some(1)).unwrap();

        let run = tracker.current_run().unwrap();
        assert_eq!(run.metrics_history.len(), 2);
        assert_eq!(run.metrics.get("loss"), Some(&0.5));
    }

    #[test]
    fn test_local_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("heart_best.json");
        std::fs::write(&model, "{}").unwrap();
        {
            let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns")).unwrap();
            tracker.set_experiment("heart_experiment").unwrap();
            tracker.start_run("heart").unwrap();
            tracker.log_artifact("heart_model", &model).unwrap();
            tracker.end_run(RunStatus::Finished).unwrap();
        }
        let reopened = ExperimentTracker::with_dir(dir.path().join("mlruns")).unwrap();
        let exp = reopened.get_experiment_by_name("heart_experiment").unwrap();
        assert_eq!(exp.runs.len(), 1);
        assert!(Path::new(&exp.runs[0].artifacts["heart_model"]).exists());
    }
}
