//! Classification metrics: accuracy, per-class report, confusion matrix

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Fraction of rows whose prediction matches the truth
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Sorted class labels present in either array
fn labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Vec<i64> {
    y_true
        .iter()
        .chain(y_pred.iter())
        .map(|v| v.round() as i64)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Confusion matrix; rows are true classes, columns predicted classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<i64>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let labels = labels(y_true, y_pred);
        let k = labels.len();
        let mut matrix = vec![vec![0usize; k]; k];

        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let ti = labels.binary_search(&(t.round() as i64));
            let pi = labels.binary_search(&(p.round() as i64));
            if let (Ok(ti), Ok(pi)) = (ti, pi) {
                matrix[ti][pi] += 1;
            }
        }

        Self { labels, matrix }
    }
}

/// Precision, recall, F1 and support for one class (or an average)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class metrics plus accuracy and macro/weighted averages.
/// Undefined ratios (no predictions or no support) count as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let cm = ConfusionMatrix::compute(y_true, y_pred);
        let k = cm.labels.len();
        let total = y_true.len();

        let classes: Vec<ClassMetrics> = (0..k)
            .map(|c| {
                let tp = cm.matrix[c][c];
                let support: usize = cm.matrix[c].iter().sum();
                let predicted: usize = (0..k).map(|r| cm.matrix[r][c]).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: cm.labels[c].to_string(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let macro_avg = average("macro avg", &classes, |_| 1.0, total);
        let weighted_avg = average("weighted avg", &classes, |m| m.support as f64, total);

        Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn average(
    label: &str,
    classes: &[ClassMetrics],
    weight: impl Fn(&ClassMetrics) -> f64,
    total: usize,
) -> ClassMetrics {
    let weight_sum: f64 = classes.iter().map(&weight).sum();
    let avg = |f: fn(&ClassMetrics) -> f64| {
        if weight_sum == 0.0 {
            0.0
        } else {
            classes.iter().map(|m| weight(m) * f(m)).sum::<f64>() / weight_sum
        }
    };

    ClassMetrics {
        label: label.to_string(),
        precision: avg(|m| m.precision),
        recall: avg(|m| m.recall),
        f1_score: avg(|m| m.f1_score),
        support: total,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for m in [&self.macro_avg, &self.weighted_avg] {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        Ok(())
    }
}
