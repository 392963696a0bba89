use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mlops_baseline::config::ParamValue;
use mlops_baseline::data::ToyGenerator;
use mlops_baseline::preprocessing::select_features;
use mlops_baseline::training::{Classifier, GridSearch, ModelKind};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

fn create_toy_data(n_rows: usize) -> (Array2<f64>, Array1<f64>) {
    let df = ToyGenerator::new(42).generate(n_rows).unwrap();
    let features = select_features(&df, &df, "label", 50).unwrap();
    let y: Array1<f64> = df
        .column("label")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or(0) as f64)
        .collect();
    (features.x_train, y)
}

fn grid(kind: ModelKind) -> BTreeMap<String, Vec<ParamValue>> {
    let mut grid = BTreeMap::new();
    match kind {
        ModelKind::Lr | ModelKind::LinearSvc => {
            grid.insert("C".to_string(), vec![ParamValue::Float(0.1), ParamValue::Float(1.0)]);
        }
        ModelKind::Xgb | ModelKind::Gbm => {
            grid.insert("n_estimators".to_string(), vec![ParamValue::Int(20)]);
            grid.insert("max_depth".to_string(), vec![ParamValue::Int(2), ParamValue::Int(3)]);
        }
    }
    grid
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (x, y) = create_toy_data(2000);
    for kind in [ModelKind::Lr, ModelKind::LinearSvc, ModelKind::Xgb, ModelKind::Gbm] {
        let search = GridSearch::new(kind, grid(kind)).with_cv_folds(3).with_random_state(42);
        group.bench_with_input(BenchmarkId::new("fit", kind.name()), &search, |b, search| {
            b.iter(|| search.fit(black_box(&x), black_box(&y)).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (x_train, y_train) = create_toy_data(2000);
    let result = GridSearch::new(ModelKind::Gbm, grid(ModelKind::Gbm))
        .with_cv_folds(3)
        .fit(&x_train, &y_train)
        .unwrap();

    for n_rows in [100, 1000, 10000] {
        let (x, _) = create_toy_data(n_rows);
        group.bench_with_input(BenchmarkId::new("predict_proba", n_rows), &x, |b, x| {
            b.iter(|| result.estimator.predict_proba(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_prediction);
criterion_main!(benches);
