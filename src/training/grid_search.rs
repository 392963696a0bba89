//! Exhaustive hyperparameter search with cross-validation

use crate::config::{ModelSpec, ParamValue};
use crate::error::{PipelineError, Result};
use crate::training::cross_validation::{CVStrategy, CrossValidator};
use crate::training::estimator::{Estimator, ModelKind, ParamSet};
use crate::training::models::Classifier;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Every combination of the grid, keys in sorted order and values in the
/// order they were listed.
pub fn expand_grid(grid: &BTreeMap<String, Vec<ParamValue>>) -> Vec<ParamSet> {
    let mut combos: Vec<ParamSet> = vec![ParamSet::new()];
    for (key, values) in grid {
        if values.is_empty() {
            continue;
        }
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |v| {
                    let mut next = combo.clone();
                    next.insert(key.clone(), v.clone());
                    next
                })
            })
            .collect();
    }
    combos
}

/// Score of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

/// Outcome of a search: the best parameters refitted on all rows
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub kind: ModelKind,
    pub best_params: ParamSet,
    /// Mean CV accuracy of the best parameters (None when CV was skipped)
    pub best_score: Option<f64>,
    pub candidates: Vec<CandidateScore>,
    pub estimator: Estimator,
    pub elapsed_secs: f64,
}

/// Grid search over one model family, scoring mean accuracy over
/// stratified folds
#[derive(Debug, Clone)]
pub struct GridSearch {
    kind: ModelKind,
    grid: BTreeMap<String, Vec<ParamValue>>,
    cv_folds: usize,
    random_state: u64,
}

impl GridSearch {
    pub fn new(kind: ModelKind, grid: BTreeMap<String, Vec<ParamValue>>) -> Self {
        Self {
            kind,
            grid,
            cv_folds: 5,
            random_state: 0,
        }
    }

    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        Ok(Self::new(spec.name.parse()?, spec.grid.clone()))
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Evaluate every combination on the current rayon pool and refit the
    /// best one on the full sample. With fewer than two rows the first
    /// combination is fitted directly.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult> {
        let start = Instant::now();
        let combos = expand_grid(&self.grid);

        // Surface unknown keys before doing any work
        for params in &combos {
            Estimator::build(self.kind, params, self.random_state)?;
        }

        if x.nrows() < 2 {
            let best_params = combos.into_iter().next().unwrap_or_default();
            let mut estimator = Estimator::build(self.kind, &best_params, self.random_state)?;
            estimator.fit(x, y)?;
            info!(model = %self.kind, rows = x.nrows(), "Too few rows for cross-validation, fitted directly");
            return Ok(SearchResult {
                kind: self.kind,
                best_params,
                best_score: None,
                candidates: Vec::new(),
                estimator,
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
        }

        let splits = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.cv_folds,
            shuffle: true,
        })
        .with_random_state(self.random_state)
        .split(x.nrows(), Some(y))?;

        let candidates: Vec<CandidateScore> = combos
            .par_iter()
            .map(|params| {
                let fold_scores = splits
                    .iter()
                    .map(|split| {
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(Axis(0), &split.train_indices);
                        let x_test = x.select(Axis(0), &split.test_indices);
                        let y_test = y.select(Axis(0), &split.test_indices);

                        let mut estimator = Estimator::build(self.kind, params, self.random_state)?;
                        estimator.fit(&x_train, &y_train)?;
                        estimator.score(&x_test, &y_test)
                    })
                    .collect::<Result<Vec<f64>>>()?;

                let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                debug!(model = %self.kind, ?params, mean_score, "Scored grid point");
                Ok(CandidateScore {
                    params: params.clone(),
                    mean_score,
                    fold_scores,
                })
            })
            .collect::<Result<_>>()?;

        let best = candidates
            .iter()
            .fold(None, |best: Option<&CandidateScore>, c| match best {
                Some(b) if b.mean_score >= c.mean_score => Some(b),
                _ => Some(c),
            })
            .ok_or_else(|| PipelineError::Training(format!("empty grid for {}", self.kind)))?;

        let mut estimator = Estimator::build(self.kind, &best.params, self.random_state)?;
        estimator.fit(x, y)?;

        info!(
            model = %self.kind,
            combinations = candidates.len(),
            folds = splits.len(),
            best_score = best.mean_score,
            "Grid search finished"
        );

        Ok(SearchResult {
            kind: self.kind,
            best_params: best.params.clone(),
            best_score: Some(best.mean_score),
            estimator,
            elapsed_secs: start.elapsed().as_secs_f64(),
            candidates,
        })
    }
}
