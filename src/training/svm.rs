//! Linear support vector classifier
//!
//! Trained in the dual with coordinate descent (one multiplier at a time,
//! visited in a seeded random order), for either the hinge or the squared
//! hinge loss. The intercept is learned as the weight of a constant feature.
//! Probabilities come from a sigmoid fitted to the training decision values.

use crate::error::{PipelineError, Result};
use crate::training::models::{
    check_fit_input, check_width, column_stats, proba_matrix, sigmoid, single_class, standardize,
    Classifier,
};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Loss minimized by the linear SVC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmLoss {
    Hinge,
    SquaredHinge,
}

impl std::str::FromStr for SvmLoss {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hinge" => Ok(SvmLoss::Hinge),
            "squared_hinge" => Ok(SvmLoss::SquaredHinge),
            other => Err(PipelineError::InvalidParameter {
                name: "loss".to_string(),
                value: other.to_string(),
                reason: "expected 'hinge' or 'squared_hinge'".to_string(),
            }),
        }
    }
}

/// Linear SVC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvcConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub loss: SvmLoss,
    /// Maximum passes over the data
    pub max_iter: usize,
    /// Stop once the projected gradient spread drops below this
    pub tol: f64,
    pub random_state: u64,
}

impl Default for LinearSvcConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            loss: SvmLoss::SquaredHinge,
            max_iter: 1000,
            tol: 1e-4,
            random_state: 42,
        }
    }
}

/// Sigmoid mapping of decision values, `p(1 | f) = 1 / (1 + exp(a f + b))`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PlattScaling {
    a: f64,
    b: f64,
}

impl PlattScaling {
    /// Newton iterations on Platt's smoothed targets
    fn fit(decision: &Array1<f64>, y: &Array1<f64>) -> Self {
        let n_pos = y.iter().filter(|&&v| v > 0.5).count() as f64;
        let n_neg = y.len() as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();

        for _ in 0..100 {
            let (mut g_a, mut g_b) = (0.0, 0.0);
            let (mut h_aa, mut h_ab, mut h_bb) = (1e-12, 0.0, 1e-12);

            for (&f, &label) in decision.iter().zip(y.iter()) {
                let t = if label > 0.5 { target_pos } else { target_neg };
                let p = sigmoid(-(a * f + b));
                let d1 = t - p;
                let d2 = p * (1.0 - p);
                g_a += f * d1;
                g_b += d1;
                h_aa += f * f * d2;
                h_ab += f * d2;
                h_bb += d2;
            }

            let det = h_aa * h_bb - h_ab * h_ab;
            if det.abs() < 1e-18 {
                break;
            }
            let delta_a = (h_bb * g_a - h_ab * g_b) / det;
            let delta_b = (h_aa * g_b - h_ab * g_a) / det;
            a -= delta_a;
            b -= delta_b;

            if delta_a.abs() < 1e-9 && delta_b.abs() < 1e-9 {
                break;
            }
        }

        Self { a, b }
    }

    fn transform(&self, f: f64) -> f64 {
        sigmoid(-(self.a * f + self.b))
    }
}

/// Linear support vector classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvc {
    pub config: LinearSvcConfig,
    weights: Option<Array1<f64>>,
    intercept: f64,
    mean: Array1<f64>,
    std: Array1<f64>,
    platt: Option<PlattScaling>,
    constant: Option<f64>,
}

impl Default for LinearSvc {
    fn default() -> Self {
        Self::new(LinearSvcConfig::default())
    }
}

impl LinearSvc {
    pub fn new(config: LinearSvcConfig) -> Self {
        Self {
            config,
            weights: None,
            intercept: 0.0,
            mean: Array1::zeros(0),
            std: Array1::zeros(0),
            platt: None,
            constant: None,
        }
    }

    /// Signed distance to the separating hyperplane
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_width(x, weights.len())?;
        Ok(standardize(x, &self.mean, &self.std).dot(weights) + self.intercept)
    }

    /// Dual coordinate descent; returns the weights and intercept
    fn solve(&self, xs: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = xs.nrows();
        let signs: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();

        let (upper, diag) = match self.config.loss {
            SvmLoss::Hinge => (self.config.c, 0.0),
            SvmLoss::SquaredHinge => (f64::INFINITY, 0.5 / self.config.c),
        };

        // The trailing constant 1 of every row carries the intercept.
        let q_diag: Vec<f64> = xs
            .rows()
            .into_iter()
            .map(|row| row.dot(&row) + 1.0 + diag)
            .collect();

        let mut w = Array1::<f64>::zeros(xs.ncols());
        let mut bias = 0.0;
        let mut alpha = vec![0.0; n];
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        for _ in 0..self.config.max_iter {
            order.shuffle(&mut rng);
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;

            for &i in &order {
                let row = xs.row(i);
                let g = signs[i] * (row.dot(&w) + bias) - 1.0 + diag * alpha[i];

                let pg = if alpha[i] == 0.0 {
                    g.min(0.0)
                } else if alpha[i] == upper {
                    g.max(0.0)
                } else {
                    g
                };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);

                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (alpha[i] - g / q_diag[i]).clamp(0.0, upper);
                    let step = (alpha[i] - old) * signs[i];
                    w.scaled_add(step, &row);
                    bias += step;
                }
            }

            if pg_max - pg_min < self.config.tol {
                break;
            }
        }

        (w, bias)
    }
}

impl Classifier for LinearSvc {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.c <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let (mean, std) = column_stats(x);
        self.mean = mean;
        self.std = std;
        self.constant = single_class(y);
        self.platt = None;

        if self.constant.is_some() {
            self.weights = Some(Array1::zeros(x.ncols()));
            self.intercept = 0.0;
            return Ok(());
        }

        let xs = standardize(x, &self.mean, &self.std);
        let (w, bias) = self.solve(&xs, y);
        self.weights = Some(w);
        self.intercept = bias;

        let decision = self.decision_function(x)?;
        self.platt = Some(PlattScaling::fit(&decision, y));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let decision = self.decision_function(x)?;
        if let Some(class) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), class));
        }
        Ok(decision.mapv(|f| if f > 0.0 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let decision = self.decision_function(x)?;
        let positive = match (self.constant, &self.platt) {
            (Some(class), _) => Array1::from_elem(x.nrows(), class),
            (None, Some(platt)) => decision.mapv(|f| platt.transform(f)),
            (None, None) => return Err(PipelineError::ModelNotFitted),
        };
        Ok(proba_matrix(&positive))
    }
}
