//! Baseline MLOps pipeline
//!
//! Prepares tabular data, tunes a handful of classical binary classifiers
//! with cross-validated grid search, tracks every run, persists the best
//! model per dataset and serves a dashboard for inspecting predictions.
//!
//! # Modules
//!
//! - [`config`] - `params.yaml` parameters
//! - [`data`] - CSV I/O, synthetic rows, stratified split, TF-IDF, balanced sampling
//! - [`preprocessing`] - Label normalization, feature selection, categorical encoders
//! - [`training`] - Classifiers, cross-validation, grid search, per-dataset trainer
//! - [`tracking`] - Local experiment tracking
//! - [`server`] - Prediction dashboard
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Pipeline stages
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod tracking;

// Services
pub mod server;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DatasetParams, ModelSpec, ParamValue, Params};
    pub use crate::error::{PipelineError, Result};

    pub use crate::data::{balanced_sample, prepare_named_dataset, prepare_toy_dataset, stratified_split, ToyGenerator};

    pub use crate::preprocessing::{select_features, FeatureSet, LabelEncoder};

    pub use crate::training::{
        Classifier, ClassificationReport, ConfusionMatrix, Estimator, GridSearch, ModelArtifact, ModelKind,
        Trainer,
    };

    pub use crate::tracking::{Experiment, ExperimentTracker, Run, RunStatus};

    pub use crate::server::{create_router, AppState, Dashboard, ServerConfig};
}
