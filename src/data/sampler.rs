//! Class-balanced row sampling

use crate::data::loader::{column_as_f64, take_rows};
use crate::error::Result;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// Sample up to `n` rows with positives (`label == 1`) and negatives
/// (`label == 0`) each capped at `n / 2`.
///
/// Returns the table unchanged when `n` covers it or when either class is
/// missing.
pub fn balanced_sample(df: &DataFrame, label: &str, n: usize, seed: u64) -> Result<DataFrame> {
    if n >= df.height() {
        return Ok(df.clone());
    }

    let labels = column_as_f64(df, label)?;
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for (i, value) in labels.iter().enumerate() {
        match value {
            Some(v) if *v == 1.0 => positives.push(i),
            Some(v) if *v == 0.0 => negatives.push(i),
            _ => {}
        }
    }

    let half = n / 2;
    let n_pos = positives.len().min(half);
    let n_neg = negatives.len().min(half);
    if n_pos == 0 || n_neg == 0 {
        warn!(
            positives = positives.len(),
            negatives = negatives.len(),
            requested = n,
            "Cannot balance classes, using the full table"
        );
        return Ok(df.clone());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);

    let mut picked: Vec<usize> = positives[..n_pos]
        .iter()
        .chain(&negatives[..n_neg])
        .copied()
        .collect();
    picked.shuffle(&mut rng);

    debug!(n_pos, n_neg, "Balanced sample drawn");
    take_rows(df, &picked)
}
