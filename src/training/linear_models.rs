//! L2-regularized logistic regression

use crate::error::{PipelineError, Result};
use crate::training::models::{
    check_fit_input, check_width, column_stats, proba_matrix, sigmoid, single_class, standardize,
    threshold, Classifier,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Logistic regression configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Stop once the gradient norm drops below this
    pub tol: f64,
    pub fit_intercept: bool,
    /// Initial step of the backtracking line search
    pub learning_rate: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            fit_intercept: true,
            learning_rate: 1.0,
        }
    }
}

const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 1e6;

/// Mean log loss of `sigmoid(x w + b)` against `y`
fn log_loss(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>, bias: f64) -> f64 {
    let z = x.dot(weights) + bias;
    // softplus(z) - y z, written to stay finite for large |z|
    z.iter()
        .zip(y.iter())
        .map(|(&z, &t)| z.max(0.0) + (-z.abs()).exp().ln_1p() - t * z)
        .sum::<f64>()
        / y.len().max(1) as f64
}

/// Logistic regression for binary classification
///
/// Minimizes mean log loss plus `||w||² / (2 C n)` by gradient descent with a
/// backtracking line search on standardized features; coefficients are kept
/// in the standardized space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub config: LogisticRegressionConfig,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    mean: Array1<f64>,
    std: Array1<f64>,
    /// Set when the training labels held a single class
    constant: Option<f64>,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticRegressionConfig::default())
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: 0.0,
            mean: Array1::zeros(0),
            std: Array1::zeros(0),
            constant: None,
            n_iter: 0,
        }
    }

    /// Iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_width(x, coefficients.len())?;

        if let Some(class) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), class));
        }

        let z = standardize(x, &self.mean, &self.std).dot(coefficients) + self.intercept;
        Ok(z.mapv(sigmoid))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.c <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.constant = single_class(y);
        self.n_iter = 0;
        self.intercept = 0.0;
        let (mean, std) = column_stats(x);
        self.mean = mean;
        self.std = std;

        if self.constant.is_some() {
            self.coefficients = Some(Array1::zeros(n_features));
            return Ok(());
        }

        let xs = standardize(x, &self.mean, &self.std);
        let alpha = 1.0 / (self.config.c * n_samples as f64);
        let objective = |w: &Array1<f64>, b: f64| log_loss(&xs, y, w, b) + 0.5 * alpha * w.dot(w);

        let mut weights = Array1::zeros(n_features);
        let mut bias = 0.0;
        let mut step = self.config.learning_rate;
        let mut loss = objective(&weights, bias);

        for iter in 0..self.config.max_iter {
            let predictions = (xs.dot(&weights) + bias).mapv(sigmoid);
            let errors = &predictions - y;

            let dw = xs.t().dot(&errors) / n_samples as f64 + alpha * &weights;
            let db = if self.config.fit_intercept {
                errors.mean().unwrap_or(0.0)
            } else {
                0.0
            };

            self.n_iter = iter + 1;
            let grad_sq = dw.dot(&dw) + db * db;
            if grad_sq.sqrt() < self.config.tol {
                break;
            }

            // Armijo backtracking: halve the step until the objective drops enough
            loop {
                let trial_w = &weights - &(step * &dw);
                let trial_b = bias - step * db;
                let trial_loss = objective(&trial_w, trial_b);
                if trial_loss <= loss - 0.5 * step * grad_sq {
                    weights = trial_w;
                    bias = trial_b;
                    loss = trial_loss;
                    break;
                }
                step *= 0.5;
                if step < MIN_STEP {
                    break;
                }
            }
            if step < MIN_STEP {
                break;
            }
            step = (step * 2.0).min(MAX_STEP);
        }

        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::Training(format!(
                "logistic regression diverged with C = {}",
                self.config.c
            )));
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold(&self.positive_proba(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(proba_matrix(&self.positive_proba(x)?))
    }
}
