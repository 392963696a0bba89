//! Local experiment tracking

pub mod storage;
pub mod tracker;

pub use storage::{InMemoryStorage, LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentTracker, Metric, Run, RunStatus};
