//! Gradient boosting classifier
//!
//! First-order boosting of regression trees on the log-loss residuals
//! `y - p`, starting from the prior log odds.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_fit_input, check_width, proba_matrix, sigmoid, single_class, threshold, Classifier};
use crate::error::{PipelineError, Result};

/// Gradient boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            min_samples_split: 2,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// Gradient boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    n_features: usize,
    constant: Option<f64>,
    is_fitted: bool,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            constant: None,
            is_fitted: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(invalid("subsample", c.subsample, "must be in (0, 1]"));
        }
        if c.learning_rate <= 0.0 {
            return Err(invalid("learning_rate", c.learning_rate, "must be positive"));
        }
        Ok(())
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut raw = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(raw)
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        check_width(x, self.n_features)?;
        if let Some(class) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), class));
        }
        Ok(self.raw_scores(x)?.mapv(sigmoid))
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.trees.clear();
        self.constant = single_class(y);
        self.is_fitted = true;
        if self.constant.is_some() {
            return Ok(());
        }

        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let sample_size = ((n_samples as f64) * self.config.subsample).ceil() as usize;
        let mut all_rows: Vec<usize> = (0..n_samples).collect();

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, lo)| yi - sigmoid(*lo))
                .collect();

            let rows: Vec<usize> = if sample_size < n_samples {
                all_rows.shuffle(&mut rng);
                let mut rows = all_rows[..sample_size].to_vec();
                rows.sort_unstable();
                rows
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_min_samples_split(self.config.min_samples_split);
            tree.fit_indices(x, &residuals, &rows)?;

            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            self.trees.push(tree);
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold(&self.positive_proba(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(proba_matrix(&self.positive_proba(x)?))
    }
}

fn invalid(name: &str, value: f64, reason: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_gbm_classifier() {
        let (x, y) = classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 30);
        let acc = model.score(&x, &y).unwrap();
        assert!(acc >= 0.95, "GBM accuracy = {}", acc);
    }

    #[test]
    fn test_gbm_subsample_is_seeded() {
        let (x, y) = classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            subsample: 0.5,
            ..Default::default()
        };
        let mut a = GradientBoostingClassifier::new(config.clone());
        let mut b = GradientBoostingClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_gbm_single_class() {
        let (x, _) = classification_data();
        let mut model = GradientBoostingClassifier::default();
        model.fit(&x, &Array1::ones(50)).unwrap();
        assert_eq!(model.score(&x, &Array1::ones(50)).unwrap(), 1.0);
    }

    #[test]
    fn test_gbm_invalid_subsample() {
        let (x, y) = classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(model.fit(&x, &y).is_err());
    }
}
