//! Classifier interface shared by every estimator family

use crate::error::{PipelineError, Result};
use crate::training::metrics::accuracy;
use ndarray::{Array1, Array2};

/// Binary classifier over dense feature matrices with labels in `{0, 1}`
pub trait Classifier: Send + Sync {
    /// Fit on `x` (rows = samples) and `y`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predicted class per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class probabilities per row, columns ordered `[p(0), p(1)]`
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Mean accuracy on `x` against `y`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(accuracy(y, &y_pred))
    }
}

/// Reject mismatched or empty training input
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::Training("cannot fit on an empty sample".to_string()));
    }
    Ok(())
}

/// Reject prediction input whose width differs from the fitted width
pub(crate) fn check_width(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(PipelineError::Shape {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// The only class present in `y`, if there is just one
pub(crate) fn single_class(y: &Array1<f64>) -> Option<f64> {
    let first = *y.iter().next()?;
    y.iter().all(|&v| v == first).then_some(first)
}

/// Stack `p(1)` into a two-column `[p(0), p(1)]` matrix
pub(crate) fn proba_matrix(positive: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((positive.len(), 2), |(i, j)| {
        if j == 1 {
            positive[i]
        } else {
            1.0 - positive[i]
        }
    })
}

/// Threshold `p(1)` at 0.5
pub(crate) fn threshold(positive: &Array1<f64>) -> Array1<f64> {
    positive.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 })
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Per-column mean and standard deviation (zero deviations replaced by 1)
pub(crate) fn column_stats(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let n = x.nrows().max(1) as f64;
    let mean = x.sum_axis(ndarray::Axis(0)) / n;
    let var = x
        .rows()
        .into_iter()
        .fold(Array1::zeros(x.ncols()), |acc: Array1<f64>, row| {
            acc + (&row - &mean).mapv(|v| v * v)
        })
        / n;
    let std = var.mapv(|v| if v > 1e-12 { v.sqrt() } else { 1.0 });
    (mean, std)
}

pub(crate) fn standardize(x: &Array2<f64>, mean: &Array1<f64>, std: &Array1<f64>) -> Array2<f64> {
    (x - mean) / std
}
