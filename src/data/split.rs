//! Stratified train/test splitting

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Row positions of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row positions so that each label class keeps its share in the
/// test partition.
///
/// `n_test = ceil(test_size * n)` rows go to test, distributed across classes
/// proportionally with the largest-remainder rule (class order breaks ties).
pub fn stratified_split(labels: &[String], test_size: f64, seed: u64) -> Result<SplitIndices> {
    let n = labels.len();
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::Data(format!(
            "test_size {} leaves an empty partition for {} rows",
            test_size, n
        )));
    }

    let mut classes: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        classes.entry(label.as_str()).or_default().push(i);
    }

    // Floor of each class quota, then hand out the remaining slots by
    // descending fractional part.
    let mut quotas: Vec<(usize, f64)> = classes
        .values()
        .map(|rows| {
            let exact = n_test as f64 * rows.len() as f64 / n as f64;
            (exact.floor() as usize, exact - exact.floor())
        })
        .collect();

    let assigned: usize = quotas.iter().map(|(q, _)| q).sum();
    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        quotas[b]
            .1
            .partial_cmp(&quotas[a].1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for &k in order.iter().take(n_test - assigned) {
        quotas[k].0 += 1;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);

    for ((class, rows), (quota, _)) in classes.into_iter().zip(quotas) {
        let mut rows = rows;
        rows.shuffle(&mut rng);
        debug!(class, rows = rows.len(), test_rows = quota, "Stratum");
        test.extend_from_slice(&rows[..quota]);
        train.extend_from_slice(&rows[quota..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(pos: usize, neg: usize) -> Vec<String> {
        let mut v = vec!["1".to_string(); pos];
        v.extend(vec!["0".to_string(); neg]);
        v
    }

    #[test]
    fn test_split_sizes() {
        let y = labels(700, 300);
        let split = stratified_split(&y, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 200);
        assert_eq!(split.train.len(), 800);

        let pos_test = split.test.iter().filter(|&&i| y[i] == "1").count();
        assert_eq!(pos_test, 140);
    }

    #[test]
    fn test_split_disjoint_and_complete() {
        let y = labels(37, 64);
        let split = stratified_split(&y, 0.25, 3).unwrap();

        let train: HashSet<usize> = split.train.iter().copied().collect();
        let test: HashSet<usize> = split.test.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), y.len());
    }

    #[test]
    fn test_split_largest_remainder() {
        // 10 rows, test_size 0.3 -> 3 test rows; quotas 1.5 / 1.5 -> 2 / 1
        let y = labels(5, 5);
        let split = stratified_split(&y, 0.3, 0).unwrap();
        assert_eq!(split.test.len(), 3);
        let neg_test = split.test.iter().filter(|&&i| y[i] == "0").count();
        assert_eq!(neg_test, 2);
    }

    #[test]
    fn test_split_deterministic() {
        let y = labels(50, 50);
        let a = stratified_split(&y, 0.2, 11).unwrap();
        let b = stratified_split(&y, 0.2, 11).unwrap();
        let c = stratified_split(&y, 0.2, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_too_small() {
        let y = labels(1, 0);
        assert!(stratified_split(&y, 0.2, 0).is_err());
        assert!(stratified_split(&labels(5, 5), 1.5, 0).is_err());
    }
}
