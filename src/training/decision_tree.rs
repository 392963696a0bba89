//! Regression tree used as the weak learner of gradient boosting

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Variance-reduction regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_regressor()
    }
}

impl DecisionTree {
    pub fn new_regressor() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Fit on the rows of `x` listed in `indices`
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(PipelineError::Training("cannot grow a tree on zero rows".to_string()));
        }

        self.n_features = x.ncols();
        self.root = Some(self.build_tree(x, y, indices, 0));
        Ok(self)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        Ok(x.rows().into_iter().map(|row| root.predict(&row)).collect())
    }

    pub fn predict_row(&self, row: &ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        Ok(root.predict(row))
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    fn build_tree(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let value = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;
        let leaf = TreeNode::Leaf { value, n_samples };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d);
        if should_stop {
            return leaf;
        }

        let Some((feature_idx, threshold)) = self.find_best_split(x, y, indices) else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Best (feature, threshold) by squared-error reduction; the lowest
    /// feature index wins ties.
    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let parent_score = total_sum * total_sum / n as f64;

        let candidates: Vec<Option<(usize, f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature| {
                let mut sorted = indices.to_vec();
                sorted.sort_by(|&a, &b| {
                    x[[a, feature]]
                        .partial_cmp(&x[[b, feature]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut best: Option<(usize, f64, f64)> = None;
                let mut left_sum = 0.0;

                for pos in 0..n - 1 {
                    left_sum += y[sorted[pos]];
                    let left_count = pos + 1;
                    let right_count = n - left_count;

                    let here = x[[sorted[pos], feature]];
                    let next = x[[sorted[pos + 1], feature]];
                    if next - here <= 1e-12 {
                        continue;
                    }
                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    // SSE reduction = sum_l²/n_l + sum_r²/n_r - sum²/n
                    let right_sum = total_sum - left_sum;
                    let gain = left_sum * left_sum / left_count as f64
                        + right_sum * right_sum / right_count as f64
                        - parent_score;

                    if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                        best = Some((feature, (here + next) / 2.0, gain));
                    }
                }
                best
            })
            .collect();

        candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, c| match best {
                Some(b) if b.2 >= c.2 => Some(b),
                _ => Some(c),
            })
            .map(|(feature, threshold, _)| (feature, threshold))
    }
}
