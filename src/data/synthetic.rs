//! Synthetic two-feature rows for the toy dataset

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Generator for correlated `feature1`/`feature2` rows with a threshold label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToyGenerator {
    /// Upper bound of the uniform `feature1` draw
    pub feature1_max: f64,
    /// Slope linking `feature2` to `feature1`
    pub slope: f64,
    /// Standard deviation of the `feature2` noise
    pub noise_std: f64,
    /// `label = 1` when `feature1 + feature2` exceeds this
    pub threshold: f64,
    seed: u64,
}

impl ToyGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            feature1_max: 10.0,
            slope: 0.8,
            noise_std: 1.0,
            threshold: 5.0,
            seed,
        }
    }

    /// Draw `n` rows as a `feature1, feature2, label` table
    pub fn generate(&self, n: usize) -> Result<DataFrame> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.noise_std)
            .map_err(|e| PipelineError::Data(format!("invalid noise distribution: {}", e)))?;

        let mut feature1 = Vec::with_capacity(n);
        let mut feature2 = Vec::with_capacity(n);
        let mut label = Vec::with_capacity(n);

        for _ in 0..n {
            let f1: f64 = rng.gen_range(0.0..self.feature1_max);
            let f2 = self.slope * f1 + noise.sample(&mut rng);
            feature1.push(f1);
            feature2.push(f2);
            label.push(i64::from(f1 + f2 > self.threshold));
        }

        let df = df!(
            "feature1" => feature1,
            "feature2" => feature2,
            "label" => label
        )?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::column_as_f64;

    #[test]
    fn test_generate_shape_and_rule() {
        let df = ToyGenerator::new(42).generate(200).unwrap();
        assert_eq!(df.height(), 200);

        let f1 = column_as_f64(&df, "feature1").unwrap();
        let f2 = column_as_f64(&df, "feature2").unwrap();
        let label = column_as_f64(&df, "label").unwrap();
        for i in 0..200 {
            let (a, b, y) = (f1[i].unwrap(), f2[i].unwrap(), label[i].unwrap());
            assert!((0.0..10.0).contains(&a));
            assert_eq!(y, if a + b > 5.0 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_generate_is_seeded() {
        let a = ToyGenerator::new(7).generate(50).unwrap();
        let b = ToyGenerator::new(7).generate(50).unwrap();
        let c = ToyGenerator::new(8).generate(50).unwrap();
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }
}
