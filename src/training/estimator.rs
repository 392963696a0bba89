//! Estimator families addressable by name from the parameter file

use crate::config::ParamValue;
use crate::error::{PipelineError, Result};
use crate::training::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use crate::training::linear_models::{LogisticRegression, LogisticRegressionConfig};
use crate::training::models::Classifier;
use crate::training::svm::{LinearSvc, LinearSvcConfig};
use crate::training::xgboost::{XGBoostClassifier, XGBoostConfig};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One assignment of hyperparameters
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Model families known to the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Lr,
    LinearSvc,
    Xgb,
    Gbm,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Lr => "lr",
            ModelKind::LinearSvc => "linearsvc",
            ModelKind::Xgb => "xgb",
            ModelKind::Gbm => "gbm",
        }
    }

    /// Hyperparameter keys the family accepts
    pub fn grid_keys(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Lr => &["C", "max_iter", "tol", "fit_intercept"],
            ModelKind::LinearSvc => &["C", "max_iter", "tol", "loss"],
            ModelKind::Xgb => &[
                "n_estimators",
                "learning_rate",
                "max_depth",
                "min_child_weight",
                "reg_lambda",
                "reg_alpha",
                "gamma",
                "subsample",
                "colsample_bytree",
            ],
            ModelKind::Gbm => &[
                "n_estimators",
                "learning_rate",
                "max_depth",
                "min_samples_leaf",
                "min_samples_split",
                "subsample",
            ],
        }
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lr" => Ok(ModelKind::Lr),
            "linearsvc" => Ok(ModelKind::LinearSvc),
            "xgb" => Ok(ModelKind::Xgb),
            "gbm" => Ok(ModelKind::Gbm),
            other => Err(PipelineError::Config(format!(
                "unknown model '{}' (expected lr, linearsvc, xgb or gbm)",
                other
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete estimator of one family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "lowercase")]
pub enum Estimator {
    Lr(LogisticRegression),
    LinearSvc(LinearSvc),
    Xgb(XGBoostClassifier),
    Gbm(GradientBoostingClassifier),
}

impl Estimator {
    /// Build an unfitted estimator; keys outside the family's grid are rejected
    pub fn build(kind: ModelKind, params: &ParamSet, random_state: u64) -> Result<Self> {
        if let Some(key) = params.keys().find(|k| !kind.grid_keys().contains(&k.as_str())) {
            return Err(PipelineError::Config(format!(
                "models.{}.params: unknown hyperparameter '{}'",
                kind, key
            )));
        }

        let get = |key: &str| params.get(key);

        let estimator = match kind {
            ModelKind::Lr => {
                let mut config = LogisticRegressionConfig::default();
                if let Some(v) = get("C") {
                    config.c = v.as_f64("C")?;
                }
                if let Some(v) = get("max_iter") {
                    config.max_iter = v.as_usize("max_iter")?;
                }
                if let Some(v) = get("tol") {
                    config.tol = v.as_f64("tol")?;
                }
                if let Some(v) = get("fit_intercept") {
                    config.fit_intercept = v.as_bool("fit_intercept")?;
                }
                Estimator::Lr(LogisticRegression::new(config))
            }
            ModelKind::LinearSvc => {
                let mut config = LinearSvcConfig {
                    random_state,
                    ..Default::default()
                };
                if let Some(v) = get("C") {
                    config.c = v.as_f64("C")?;
                }
                if let Some(v) = get("max_iter") {
                    config.max_iter = v.as_usize("max_iter")?;
                }
                if let Some(v) = get("tol") {
                    config.tol = v.as_f64("tol")?;
                }
                if let Some(v) = get("loss") {
                    config.loss = v.as_str("loss")?.parse()?;
                }
                Estimator::LinearSvc(LinearSvc::new(config))
            }
            ModelKind::Xgb => {
                let mut config = XGBoostConfig {
                    random_state,
                    ..Default::default()
                };
                if let Some(v) = get("n_estimators") {
                    config.n_estimators = v.as_usize("n_estimators")?;
                }
                if let Some(v) = get("learning_rate") {
                    config.learning_rate = v.as_f64("learning_rate")?;
                }
                if let Some(v) = get("max_depth") {
                    config.max_depth = v.as_usize("max_depth")?;
                }
                if let Some(v) = get("min_child_weight") {
                    config.min_child_weight = v.as_f64("min_child_weight")?;
                }
                if let Some(v) = get("reg_lambda") {
                    config.reg_lambda = v.as_f64("reg_lambda")?;
                }
                if let Some(v) = get("reg_alpha") {
                    config.reg_alpha = v.as_f64("reg_alpha")?;
                }
                if let Some(v) = get("gamma") {
                    config.gamma = v.as_f64("gamma")?;
                }
                if let Some(v) = get("subsample") {
                    config.subsample = v.as_f64("subsample")?;
                }
                if let Some(v) = get("colsample_bytree") {
                    config.colsample_bytree = v.as_f64("colsample_bytree")?;
                }
                Estimator::Xgb(XGBoostClassifier::new(config))
            }
            ModelKind::Gbm => {
                let mut config = GradientBoostingConfig {
                    random_state,
                    ..Default::default()
                };
                if let Some(v) = get("n_estimators") {
                    config.n_estimators = v.as_usize("n_estimators")?;
                }
                if let Some(v) = get("learning_rate") {
                    config.learning_rate = v.as_f64("learning_rate")?;
                }
                if let Some(v) = get("max_depth") {
                    config.max_depth = v.as_usize("max_depth")?;
                }
                if let Some(v) = get("min_samples_leaf") {
                    config.min_samples_leaf = v.as_usize("min_samples_leaf")?;
                }
                if let Some(v) = get("min_samples_split") {
                    config.min_samples_split = v.as_usize("min_samples_split")?;
                }
                if let Some(v) = get("subsample") {
                    config.subsample = v.as_f64("subsample")?;
                }
                Estimator::Gbm(GradientBoostingClassifier::new(config))
            }
        };

        Ok(estimator)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::Lr(_) => ModelKind::Lr,
            Estimator::LinearSvc(_) => ModelKind::LinearSvc,
            Estimator::Xgb(_) => ModelKind::Xgb,
            Estimator::Gbm(_) => ModelKind::Gbm,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Estimator::Lr(m) => m,
            Estimator::LinearSvc(m) => m,
            Estimator::Xgb(m) => m,
            Estimator::Gbm(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Estimator::Lr(m) => m,
            Estimator::LinearSvc(m) => m,
            Estimator::Xgb(m) => m,
            Estimator::Gbm(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(items: &[(&str, ParamValue)]) -> ParamSet {
        items.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [ModelKind::Lr, ModelKind::LinearSvc, ModelKind::Xgb, ModelKind::Gbm] {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
        assert!(matches!("rf".parse::<ModelKind>(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_build_applies_params() {
        let est = Estimator::build(
            ModelKind::Gbm,
            &params(&[("n_estimators", ParamValue::Int(7)), ("learning_rate", ParamValue::Float(0.2))]),
            3,
        )
        .unwrap();
        match est {
            Estimator::Gbm(m) => {
                assert_eq!(m.config.n_estimators, 7);
                assert_eq!(m.config.learning_rate, 0.2);
                assert_eq!(m.config.random_state, 3);
            }
            other => panic!("unexpected estimator {:?}", other.kind()),
        }
    }

    #[test]
    fn test_build_svc_loss() {
        let est = Estimator::build(
            ModelKind::LinearSvc,
            &params(&[("loss", ParamValue::Str("hinge".into()))]),
            0,
        )
        .unwrap();
        assert!(matches!(est, Estimator::LinearSvc(ref m) if m.config.loss == crate::training::svm::SvmLoss::Hinge));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Estimator::build(ModelKind::Lr, &params(&[("penalty", ParamValue::Str("l1".into()))]), 0)
            .unwrap_err();
        assert!(err.to_string().contains("penalty"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = Estimator::build(ModelKind::Lr, &params(&[("C", ParamValue::Str("big".into()))]), 0)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }

    #[test]
    fn test_serde_tagged() {
        let est = Estimator::build(ModelKind::Xgb, &ParamSet::new(), 0).unwrap();
        let json = serde_json::to_value(&est).unwrap();
        assert_eq!(json["family"], "xgb");
        let back: Estimator = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ModelKind::Xgb);
    }
}
