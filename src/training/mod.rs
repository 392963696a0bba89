//! Model training
//!
//! Binary classifiers behind the [`Classifier`] trait:
//! - Logistic regression
//! - Linear support vector classifier
//! - XGBoost-style second-order boosting
//! - Gradient boosting on regression trees
//!
//! plus cross-validation, grid search, metrics and the per-dataset trainer.

mod models;
pub mod artifact;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod grid_search;
pub mod linear_models;
pub mod metrics;
pub mod svm;
pub mod trainer;
pub mod xgboost;

pub use artifact::{Evaluation, ModelArtifact};
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{DecisionTree, TreeNode};
pub use estimator::{Estimator, ModelKind, ParamSet};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{expand_grid, CandidateScore, GridSearch, SearchResult};
pub use linear_models::{LogisticRegression, LogisticRegressionConfig};
pub use metrics::{accuracy, ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use models::Classifier;
pub use svm::{LinearSvc, LinearSvcConfig, SvmLoss};
pub use trainer::{CandidateResult, DatasetOutcome, Trainer, TrainingSummary};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
