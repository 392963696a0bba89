//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient and hessian of the logistic loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)], kept only above γ
//! - L1 (alpha) soft-thresholding of leaf weights
//! - Minimum child weight constraint

use crate::error::{PipelineError, Result};
use crate::training::models::{check_fit_input, check_width, proba_matrix, sigmoid, single_class, threshold, Classifier};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Gradient statistics shared by every node of one tree
struct GradStats<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

/// Grow a tree with exact greedy split finding
fn build_xgb_tree(stats: &GradStats<'_>, indices: &[usize], depth: usize) -> XGBNode {
    let config = stats.config;
    let g_sum: f64 = indices.iter().map(|&i| stats.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| stats.hess[i]).sum();
    let leaf = XGBNode::Leaf {
        weight: compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha),
    };

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    let candidates: Vec<(usize, f64, f64)> = stats
        .features
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(stats, indices, f, g_sum, h_sum))
        .collect();

    // first feature wins ties
    let best = candidates.into_iter().fold(None, |best: Option<(usize, f64, f64)>, c| match best {
        Some(b) if b.2 >= c.2 => Some(b),
        _ => Some(c),
    });

    match best {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| stats.x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(build_xgb_tree(stats, &left_idx, depth + 1)),
                right: Box::new(build_xgb_tree(stats, &right_idx, depth + 1)),
            }
        }
        _ => leaf,
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

fn find_best_split_for_feature(
    stats: &GradStats<'_>,
    indices: &[usize],
    feature: usize,
    g_total: f64,
    h_total: f64,
) -> Option<(usize, f64, f64)> {
    let x = stats.x;
    let config = stats.config;
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let lambda = config.reg_lambda;
    let parent = g_total * g_total / (h_total + lambda);
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(usize, f64, f64)> = None;

    for pos in 0..sorted.len() - 1 {
        let idx = sorted[pos];
        g_left += stats.grad[idx];
        h_left += stats.hess[idx];

        let here = x[[idx, feature]];
        let next = x[[sorted[pos + 1], feature]];
        if next - here <= 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda) - parent);

        if best.map_or(true, |(_, _, g)| gain > g) {
            best = Some((feature, (here + next) / 2.0, gain));
        }
    }

    best
}

/// XGBoost classifier (logistic loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
    constant: Option<f64>,
    is_fitted: bool,
}

impl Default for XGBoostClassifier {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
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
        for (name, value) in [("subsample", c.subsample), ("colsample_bytree", c.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }
        if c.reg_lambda < 0.0 || c.reg_alpha < 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "reg_lambda/reg_alpha".to_string(),
                value: format!("{}/{}", c.reg_lambda, c.reg_alpha),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    fn raw_row(&self, row: &ArrayView1<f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + self.config.learning_rate * tree.predict(row))
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        check_width(x, self.n_features)?;
        if let Some(class) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), class));
        }
        Ok(x.rows().into_iter().map(|row| sigmoid(self.raw_row(&row))).collect())
    }
}

impl Classifier for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;
        self.trees.clear();
        self.constant = single_class(y);
        self.is_fitted = true;
        if self.constant.is_some() {
            return Ok(());
        }

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        for _ in 0..self.config.n_estimators {
            let probs: Array1<f64> = raw_preds.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let features = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let stats = GradStats {
                x,
                grad: &grad,
                hess: &hess,
                features: &features,
                config: &self.config,
            };
            let tree = build_xgb_tree(&stats, &rows, 0);

            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += self.config.learning_rate * tree.predict(&row);
            }
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

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
