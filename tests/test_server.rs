//! Integration tests for the dashboard API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mlops_baseline::config::DatasetParams;
use mlops_baseline::data::{save_csv, ToyGenerator};
use mlops_baseline::preprocessing::select_features;
use mlops_baseline::server::{create_router, AppState, ServerConfig};
use mlops_baseline::training::{Classifier, Estimator, ModelArtifact, ModelKind, ParamSet};
use ndarray::Array1;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

fn write_fixture(dir: &Path) -> ServerConfig {
    let mut train = ToyGenerator::new(7).generate(200).unwrap();
    let mut test = ToyGenerator::new(8).generate(50).unwrap();

    let features = select_features(&train, &test, "label", 50).unwrap();
    let y: Array1<f64> = train
        .column("label")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or(0) as f64)
        .collect();
    let mut estimator = Estimator::build(ModelKind::Lr, &ParamSet::new(), 42).unwrap();
    estimator.fit(&features.x_train, &y).unwrap();

    let artifact = ModelArtifact {
        dataset: DatasetParams {
            name: "toy".to_string(),
            label_column: "label".to_string(),
            label_map: None,
        },
        model_name: "lr".to_string(),
        feature_columns: features.columns,
        encoders: features.encoders,
        best_params: ParamSet::new(),
        cv_score: Some(0.95),
        test_accuracy: 0.95,
        estimator,
        created_at: chrono::Utc::now(),
    };
    let model_path = artifact.save(&dir.join("models")).unwrap();
    let test_path = dir.join("data/test.csv");
    save_csv(&mut train, &dir.join("data/train.csv")).unwrap();
    save_csv(&mut test, &test_path).unwrap();

    ServerConfig::for_model(model_path, test_path)
}

fn app(config: ServerConfig) -> Router {
    create_router(Arc::new(AppState::new(config)))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn predict_request(features: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header("content-type", "application/json")
        .body(Body::from(format!(r#"{{"features": {}}}"#, features)))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model_loaded"], false);
}

#[tokio::test]
async fn test_index_page() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("/api/predict"));
}

#[tokio::test]
async fn test_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["dataset"], "toy");
    assert_eq!(json["model_name"], "lr");
    assert_eq!(json["rows"], 50);
    assert_eq!(json["feature_names"], serde_json::json!(["feature1", "feature2"]));
    assert!(json["test_accuracy"].as_f64().unwrap() > 0.8);

    let matrix = json["confusion_matrix"]["matrix"].as_array().unwrap();
    let total: u64 = matrix
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, 50);
}

#[tokio::test]
async fn test_predict() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app.clone().oneshot(predict_request("[9.0, 8.0]")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["label"], 1);
    let p = json["probabilities"].as_array().unwrap();
    let sum = p[0].as_f64().unwrap() + p[1].as_f64().unwrap();
    assert!((sum - 1.0).abs() < 1e-9);

    let response = app.oneshot(predict_request("[0.1, 0.0]")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["label"], 0);
}

#[tokio::test]
async fn test_predict_wrong_width() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app.oneshot(predict_request("[1.0, 2.0, 3.0]")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], true);
}

#[tokio::test]
async fn test_cross_origin_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_unknown_route() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(write_fixture(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_model_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::for_model(dir.path().join("absent.json"), dir.path().join("absent.csv"));
    let app = app(config);

    let response = app
        .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
