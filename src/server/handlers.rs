//! HTTP request handlers

use std::sync::Arc;
use axum::{extract::State, response::Html, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::training::{ClassificationReport, ConfusionMatrix};

use super::error::{Result, ServerError};
use super::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub dataset: String,
    pub model_name: String,
    pub test_accuracy: f64,
    pub cv_score: Option<f64>,
    pub rows: usize,
    pub report: ClassificationReport,
    pub confusion_matrix: ConfusionMatrix,
    pub feature_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub label: i64,
    pub probabilities: [f64; 2],
}

/// Held-out metrics of the cached model
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Json<MetricsResponse>> {
    let dashboard = state.dashboard().await?;
    let artifact = &dashboard.artifact;
    let evaluation = &dashboard.evaluation;

    Ok(Json(MetricsResponse {
        dataset: artifact.dataset.name.clone(),
        model_name: artifact.model_name.clone(),
        test_accuracy: evaluation.accuracy,
        cv_score: artifact.cv_score,
        rows: evaluation.rows,
        report: evaluation.report.clone(),
        confusion_matrix: evaluation.confusion_matrix.clone(),
        feature_names: artifact.feature_columns.clone(),
    }))
}

/// Score one row of already encoded feature values
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    if request.features.iter().any(|v| !v.is_finite()) {
        return Err(ServerError::BadRequest("features must be finite numbers".to_string()));
    }

    let dashboard = state.dashboard().await?;
    let (label, probabilities) = dashboard.artifact.predict_row(&request.features)?;
    info!(features = ?request.features, label, "Served prediction");

    Ok(Json(PredictResponse {
        label: label.round() as i64,
        probabilities,
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model_loaded": state.is_loaded(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// UI Handler
// ============================================================================

pub async fn serve_index() -> Html<&'static str> {
    Html(EMBEDDED_INDEX_HTML)
}

const EMBEDDED_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>MLOps Prediction UI</title>
    <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-gray-900 text-gray-100 min-h-screen">
    <header class="bg-gray-800 border-b border-gray-700 px-6 py-4">
        <h1 class="text-xl font-bold">MLOps: Prediction Analysis</h1>
        <p id="subtitle" class="text-sm text-gray-400"></p>
    </header>
    <main class="p-6 space-y-6">
        <div class="grid grid-cols-2 gap-6">
            <section class="bg-gray-800 rounded-lg p-6">
                <h2 class="text-lg font-semibold mb-2">Test Accuracy</h2>
                <p id="accuracy" class="text-3xl font-mono mb-4">-</p>
                <h2 class="text-lg font-semibold mb-2">Classification Report</h2>
                <table class="w-full text-sm font-mono">
                    <thead><tr class="text-gray-400"><th class="text-left"></th><th>precision</th><th>recall</th><th>f1-score</th><th>support</th></tr></thead>
                    <tbody id="report"></tbody>
                </table>
            </section>
            <section class="bg-gray-800 rounded-lg p-6">
                <h2 class="text-lg font-semibold mb-2">Confusion Matrix</h2>
                <table class="text-sm font-mono"><tbody id="confusion"></tbody></table>
            </section>
        </div>
        <section class="bg-gray-800 rounded-lg p-6">
            <h2 class="text-lg font-semibold mb-4">New Prediction</h2>
            <form id="predict-form" class="space-y-4">
                <div id="inputs" class="grid grid-cols-4 gap-3"></div>
                <button type="submit" class="px-4 py-2 bg-blue-600 rounded hover:bg-blue-500">Predict Label</button>
            </form>
            <p id="prediction" class="mt-4 font-mono"></p>
        </section>
    </main>
    <script>
    const fmt = v => Number(v).toFixed(3);
    function row(m) {
        return `<tr><td>${m.label}</td><td class="text-center">${fmt(m.precision)}</td><td class="text-center">${fmt(m.recall)}</td><td class="text-center">${fmt(m.f1_score)}</td><td class="text-center">${m.support}</td></tr>`;
    }
    async function load() {
        const res = await fetch('/api/metrics');
        const data = await res.json();
        if (data.error) { document.getElementById('subtitle').textContent = data.message; return; }
        document.getElementById('subtitle').textContent = `${data.dataset} / ${data.model_name} (${data.rows} test rows)`;
        document.getElementById('accuracy').textContent = fmt(data.test_accuracy);
        const r = data.report;
        document.getElementById('report').innerHTML =
            r.classes.map(row).join('') + row(r.macro_avg) + row(r.weighted_avg);
        const cm = data.confusion_matrix;
        document.getElementById('confusion').innerHTML =
            `<tr><td></td>${cm.labels.map(l => `<th class="px-3">pred ${l}</th>`).join('')}</tr>` +
            cm.matrix.map((r, i) => `<tr><th class="px-3">true ${cm.labels[i]}</th>${r.map(v => `<td class="px-3 text-center">${v}</td>`).join('')}</tr>`).join('');
        document.getElementById('inputs').innerHTML = data.feature_names.map((name, i) =>
            `<label class="text-sm">${name}<input name="f${i}" type="number" step="0.1" value="0" class="w-full mt-1 px-2 py-1 rounded bg-gray-700"></label>`).join('');
    }
    document.getElementById('predict-form').addEventListener('submit', async e => {
        e.preventDefault();
        const features = [...e.target.querySelectorAll('input')].map(i => parseFloat(i.value));
        const res = await fetch('/api/predict', {
            method: 'POST',
            headers: {'Content-Type': 'application/json'},
            body: JSON.stringify({features})
        });
        const data = await res.json();
        document.getElementById('prediction').textContent = data.error
            ? data.message
            : `Predicted Label: ${data.label} | Probabilities: Class 0 = ${fmt(data.probabilities[0])}, Class 1 = ${fmt(data.probabilities[1])}`;
    });
    load();
    </script>
</body>
</html>
"#;
