//! Integration tests for the model families and grid search

use mlops_baseline::config::ParamValue;
use mlops_baseline::data::{stratified_split, ToyGenerator};
use mlops_baseline::preprocessing::select_features;
use mlops_baseline::training::{accuracy, Classifier, GridSearch, ModelKind};
use ndarray::{Array1, Array2, Axis};
use std::collections::BTreeMap;

fn toy_split() -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
    let df = ToyGenerator::new(3).generate(600).unwrap();
    let features = select_features(&df, &df, "label", 50).unwrap();
    let y: Vec<f64> = df
        .column("label")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or(0) as f64)
        .collect();

    let strata: Vec<String> = y.iter().map(|v| v.to_string()).collect();
    let split = stratified_split(&strata, 0.25, 42).unwrap();
    let y = Array1::from_vec(y);
    (
        features.x_train.select(Axis(0), &split.train),
        y.select(Axis(0), &split.train),
        features.x_train.select(Axis(0), &split.test),
        y.select(Axis(0), &split.test),
    )
}

fn grid(pairs: &[(&str, Vec<ParamValue>)]) -> BTreeMap<String, Vec<ParamValue>> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn test_every_family_learns_toy_boundary() {
    let (x_train, y_train, x_test, y_test) = toy_split();
    let searches = [
        (ModelKind::Lr, grid(&[("C", vec![ParamValue::Float(0.1), ParamValue::Float(1.0)])])),
        (ModelKind::LinearSvc, grid(&[("C", vec![ParamValue::Float(1.0)])])),
        (
            ModelKind::Xgb,
            grid(&[("n_estimators", vec![ParamValue::Int(30)]), ("max_depth", vec![ParamValue::Int(3)])]),
        ),
        (
            ModelKind::Gbm,
            grid(&[("n_estimators", vec![ParamValue::Int(30)]), ("max_depth", vec![ParamValue::Int(3)])]),
        ),
    ];

    for (kind, grid) in searches {
        let result = GridSearch::new(kind, grid).with_cv_folds(3).fit(&x_train, &y_train).unwrap();
        let y_pred = result.estimator.predict(&x_test).unwrap();
        let acc = accuracy(&y_test, &y_pred);
        assert!(acc > 0.85, "{} accuracy {}", kind, acc);

        let proba = result.estimator.predict_proba(&x_test).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn test_grid_search_is_reproducible() {
    let (x_train, y_train, x_test, _) = toy_split();
    let grid = grid(&[
        ("n_estimators", vec![ParamValue::Int(10), ParamValue::Int(20)]),
        ("max_depth", vec![ParamValue::Int(2), ParamValue::Int(3)]),
        ("subsample", vec![ParamValue::Float(0.8)]),
    ]);

    let a = GridSearch::new(ModelKind::Xgb, grid.clone()).with_random_state(7).fit(&x_train, &y_train).unwrap();
    let b = GridSearch::new(ModelKind::Xgb, grid).with_random_state(7).fit(&x_train, &y_train).unwrap();

    assert_eq!(a.candidates.len(), 4);
    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.best_score, b.best_score);
    assert_eq!(
        a.estimator.predict_proba(&x_test).unwrap(),
        b.estimator.predict_proba(&x_test).unwrap()
    );
}

#[test]
fn test_heavily_regularized_candidates_stay_finite() {
    let (x_train, y_train, x_test, _) = toy_split();
    let rows: Vec<usize> = (0..12).collect();
    let x_small = x_train.select(Axis(0), &rows);
    let mut y_small = y_train.select(Axis(0), &rows);
    // both classes present in every fold
    for i in 0..12 {
        y_small[i] = (i % 2) as f64;
    }

    let c_values = vec![ParamValue::Float(0.001), ParamValue::Float(0.01), ParamValue::Float(0.1)];
    for kind in [ModelKind::Lr, ModelKind::LinearSvc] {
        for c in &c_values {
            let search = GridSearch::new(kind, grid(&[("C", vec![c.clone()])])).with_cv_folds(4);
            let result = search.fit(&x_small, &y_small).unwrap();

            let candidate = &result.candidates[0];
            assert!(candidate.fold_scores.iter().all(|s| (0.0..=1.0).contains(s)));
            let proba = result.estimator.predict_proba(&x_test).unwrap();
            assert!(
                proba.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p)),
                "{} with C = {} produced invalid probabilities",
                kind,
                c
            );
        }
    }
}

#[test]
fn test_unknown_hyperparameter_rejected() {
    let (x_train, y_train, _, _) = toy_split();
    let grid = grid(&[("alpha", vec![ParamValue::Float(1.0)])]);
    assert!(GridSearch::new(ModelKind::Lr, grid).fit(&x_train, &y_train).is_err());
}
