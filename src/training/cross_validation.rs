//! Cross-validation splitters

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits; the fold count is clamped to `n_samples`
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        if n_samples < 2 {
            return Err(PipelineError::Training(format!(
                "cross-validation needs at least 2 samples, got {}",
                n_samples
            )));
        }

        match &self.strategy {
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    PipelineError::Training("StratifiedKFold requires target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(PipelineError::Shape {
                        expected: format!("y length = {}", n_samples),
                        actual: format!("y length = {}", y.len()),
                    });
                }
                self.stratified_k_fold_split(y, clamp_splits(*n_splits, n_samples)?, *shuffle)
            }
        }
    }

    /// Deal each class's rows across the folds in turn, continuing the
    /// rotation from one class to the next so fold sizes stay even.
    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut slot = 0;

        for indices in class_indices.values_mut() {
            if shuffle {
                indices.shuffle(&mut rng);
            }
            for &idx in indices.iter() {
                folds[slot % n_splits].push(idx);
                slot += 1;
            }
        }

        Ok(to_splits(folds))
    }
}

fn clamp_splits(n_splits: usize, n_samples: usize) -> Result<usize> {
    if n_splits < 2 {
        return Err(PipelineError::InvalidParameter {
            name: "n_splits".to_string(),
            value: n_splits.to_string(),
            reason: "must be at least 2".to_string(),
        });
    }
    Ok(n_splits.min(n_samples))
}

fn to_splits(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
    (0..folds.len())
        .map(|fold_idx| CVSplit {
            test_indices: folds[fold_idx].clone(),
            train_indices: folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect(),
            fold_idx,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_folds_clamped_to_samples() {
        let y = Array1::from_vec(vec![0.0, 1.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true });
        let splits = cv.split(3, Some(&y)).unwrap();
        assert_eq!(splits.len(), 3);
        assert!(splits.iter().all(|s| s.test_indices.len() == 1));
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(1, Some(&Array1::zeros(1))).is_err());
    }

    #[test]
    fn test_stratified_requires_y() {
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(10, None).is_err());
    }
}
