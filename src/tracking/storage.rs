//! Storage backends for experiment tracking

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::tracker::Experiment;
use crate::error::{PipelineError, Result};

/// Where experiments and run artifacts are persisted
pub trait StorageBackend: Send + Sync {
    /// Save experiments to storage
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()>;

    /// Load experiments from storage
    fn load_experiments(&self) -> Result<Vec<Experiment>>;

    /// Copy a file into a run's artifact area, returning its stored location
    fn store_artifact(&self, experiment_id: &str, run_id: &str, name: &str, source: &Path) -> Result<String>;
}

/// Local file system storage: `experiments.json` plus
/// `<experiment_id>/<run_id>/artifacts/<name>/<file>`
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiments_file(&self) -> PathBuf {
        self.base_dir.join("experiments.json")
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.base_dir.join(experiment_id)
    }
}

impl StorageBackend for LocalStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string_pretty(experiments)?;
        fs::write(self.experiments_file(), json)?;
        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let file_path = self.experiments_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&file_path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn store_artifact(&self, experiment_id: &str, run_id: &str, name: &str, source: &Path) -> Result<String> {
        let file_name = source
            .file_name()
            .ok_or_else(|| PipelineError::Tracking(format!("artifact path {} has no file name", source.display())))?;
        let dir = self
            .experiment_dir(experiment_id)
            .join(run_id)
            .join("artifacts")
            .join(name);
        fs::create_dir_all(&dir)?;
        let dest = dir.join(file_name);
        fs::copy(source, &dest)?;
        Ok(dest.display().to_string())
    }
}

/// Process-local storage, used by tests and dry runs
#[derive(Default)]
pub struct InMemoryStorage {
    experiments: Mutex<Vec<Experiment>>,
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored artifact bytes by location
    pub fn artifact(&self, location: &str) -> Option<Vec<u8>> {
        self.artifacts.lock().ok()?.get(location).cloned()
    }
}

fn poisoned<T>(_: T) -> PipelineError {
    PipelineError::Tracking("storage lock poisoned".to_string())
}

impl StorageBackend for InMemoryStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        *self.experiments.lock().map_err(poisoned)? = experiments.to_vec();
        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.lock().map_err(poisoned)?.clone())
    }

    fn store_artifact(&self, experiment_id: &str, run_id: &str, name: &str, source: &Path) -> Result<String> {
        let bytes = fs::read(source)?;
        let location = format!("memory://{}/{}/{}", experiment_id, run_id, name);
        self.artifacts
            .lock()
            .map_err(poisoned)?
            .insert(location.clone(), bytes);
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_storage_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let mut exp = Experiment::new("heart_experiment");
        exp.tags.insert("env".to_string(), "test".to_string());
        storage.save_experiments(&[exp.clone()]).unwrap();

        assert!(storage.experiments_file().exists());
        let loaded = storage.load_experiments().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "heart_experiment");
        assert_eq!(loaded[0].tags["env"], "test");
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("mlruns"));
        assert!(storage.load_experiments().unwrap().is_empty());
    }

    #[test]
    fn test_local_artifact_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("heart_best.json");
        std::fs::write(&source, "{}").unwrap();

        let storage = LocalStorage::new(dir.path().join("mlruns"));
        let exp = Experiment::new("heart_experiment");
        storage.save_experiments(&[exp.clone()]).unwrap();
        let location = storage
            .store_artifact(&exp.experiment_id, "run1", "heart_model", &source)
            .unwrap();
        assert!(Path::new(&location).exists());
        assert!(location.contains("heart_model"));
        assert_eq!(std::fs::read_to_string(&location).unwrap(), "{}");
    }

    #[test]
    fn test_in_memory_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("model.json");
        std::fs::write(&source, "abc").unwrap();

        let storage = InMemoryStorage::new();
        let location = storage.store_artifact("e", "r", "m", &source).unwrap();
        assert_eq!(storage.artifact(&location).unwrap(), b"abc");
        assert!(storage.artifact("memory://e/r/other").is_none());
    }
}
