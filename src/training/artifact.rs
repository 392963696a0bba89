//! Persisted best model for one dataset

use crate::config::DatasetParams;
use crate::data::loader::column_as_f64;
use crate::error::{PipelineError, Result};
use crate::preprocessing::{encode_frame, normalize_labels, LabelEncoder};
use crate::training::estimator::{Estimator, ParamSet};
use crate::training::metrics::{ClassificationReport, ConfusionMatrix};
use crate::training::models::Classifier;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything needed to score raw rows of a dataset: the tuned estimator,
/// its feature layout and the encoders fitted on the train partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub dataset: DatasetParams,
    pub model_name: String,
    pub feature_columns: Vec<String>,
    pub encoders: Vec<LabelEncoder>,
    pub best_params: ParamSet,
    /// Mean CV accuracy of the winning parameters
    pub cv_score: Option<f64>,
    pub test_accuracy: f64,
    pub estimator: Estimator,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Held-out evaluation of an artifact against a test table
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub confusion_matrix: ConfusionMatrix,
    pub rows: usize,
}

impl ModelArtifact {
    /// `<dataset>_best.json`
    pub fn file_name(dataset: &str) -> String {
        format!("{}_best.json", dataset)
    }

    pub fn label_column(&self) -> &str {
        &self.dataset.label_column
    }

    /// Write to `<models_dir>/<dataset>_best.json`
    pub fn save(&self, models_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(models_dir)?;
        let path = models_dir.join(Self::file_name(&self.dataset.name));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        info!(path = %path.display(), model = %self.model_name, "Saved model artifact");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Feature matrix of `df` in this artifact's column order
    pub fn features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        encode_frame(df, &self.feature_columns, &self.encoders)
    }

    /// Normalized labels of `df`; returns the filtered table alongside
    pub fn labels(&self, df: &DataFrame) -> Result<(DataFrame, Array1<f64>)> {
        let df = normalize_labels(df, &self.dataset)?;
        let labels: Array1<f64> = column_as_f64(&df, self.label_column())?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();
        Ok((df, labels))
    }

    /// Score an already encoded row vector
    pub fn predict_row(&self, features: &[f64]) -> Result<(f64, [f64; 2])> {
        if features.len() != self.feature_columns.len() {
            return Err(PipelineError::Shape {
                expected: format!("{} features", self.feature_columns.len()),
                actual: format!("{} features", features.len()),
            });
        }
        let x = Array2::from_shape_vec((1, features.len()), features.to_vec())?;
        let label = self.estimator.predict(&x)?[0];
        let proba = self.estimator.predict_proba(&x)?;
        Ok((label, [proba[[0, 0]], proba[[0, 1]]]))
    }

    /// Accuracy, report and confusion matrix on a raw test table
    pub fn evaluate(&self, test: &DataFrame) -> Result<Evaluation> {
        let (test, y_true) = self.labels(test)?;
        let x = self.features(&test)?;
        let y_pred = self.estimator.predict(&x)?;
        let report = ClassificationReport::compute(&y_true, &y_pred);

        Ok(Evaluation {
            accuracy: report.accuracy,
            confusion_matrix: ConfusionMatrix::compute(&y_true, &y_pred),
            report,
            rows: y_true.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::estimator::ModelKind;
    use polars::prelude::*;

    fn fitted_artifact() -> ModelArtifact {
        let train = df!(
            "age" => &[30.0, 40.0, 50.0, 60.0, 35.0, 65.0],
            "thal" => &["a", "b", "a", "b", "a", "b"],
            "target" => &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        )
        .unwrap();
        let dataset = DatasetParams {
            name: "heart".to_string(),
            label_column: "target".to_string(),
            label_map: None,
        };
        let features = crate::preprocessing::select_features(&train, &train, "target", 10).unwrap();
        let y = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let mut estimator = Estimator::build(ModelKind::Lr, &ParamSet::new(), 0).unwrap();
        estimator.fit(&features.x_train, &y).unwrap();

        ModelArtifact {
            dataset,
            model_name: "lr".to_string(),
            feature_columns: features.columns,
            encoders: features.encoders,
            best_params: ParamSet::new(),
            cv_score: Some(1.0),
            test_accuracy: 1.0,
            estimator,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = fitted_artifact();
        let path = artifact.save(dir.path()).unwrap();
        assert!(path.ends_with("heart_best.json"));

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.feature_columns, vec!["age", "thal"]);
        assert_eq!(loaded.encoders.len(), 1);
        let x = Array2::from_shape_vec((2, 2), vec![30.0, 0.0, 65.0, 1.0]).unwrap();
        assert_eq!(
            loaded.estimator.predict(&x).unwrap(),
            artifact.estimator.predict(&x).unwrap()
        );
    }

    #[test]
    fn test_missing_artifact() {
        let err = ModelArtifact::load(Path::new("/nonexistent/heart_best.json")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_evaluate_with_unseen_category() {
        let artifact = fitted_artifact();
        let test = df!(
            "age" => &[32.0, 62.0],
            "thal" => &["a", "zzz"],
            "target" => &[0.0, 1.0]
        )
        .unwrap();
        let eval = artifact.evaluate(&test).unwrap();
        assert_eq!(eval.rows, 2);
        assert_eq!(eval.confusion_matrix.matrix.iter().flatten().sum::<usize>(), 2);
    }

    #[test]
    fn test_predict_row_checks_width() {
        let artifact = fitted_artifact();
        let (label, proba) = artifact.predict_row(&[64.0, 1.0]).unwrap();
        assert!(label == 0.0 || label == 1.0);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-9);
        assert!(matches!(artifact.predict_row(&[1.0]), Err(PipelineError::Shape { .. })));
    }
}
