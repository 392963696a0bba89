//! Prediction dashboard
//!
//! Serves an HTML page plus a small JSON API over one persisted model and
//! its test partition.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{MetricsResponse, PredictRequest, PredictResponse};
pub use state::{AppState, Dashboard};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Persisted `<dataset>_best.json`
    pub model_path: PathBuf,
    /// Test partition paired with the model
    pub test_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("DASHBOARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("DASHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8501),
            model_path: PathBuf::from("models/heart_best.json"),
            test_path: PathBuf::from("data/heart_test.csv"),
        }
    }
}

impl ServerConfig {
    /// Default host/port with the given model/test pair
    pub fn for_model(model_path: impl Into<PathBuf>, test_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            test_path: test_path.into(),
            ..Default::default()
        }
    }
}

/// Start the dashboard; a missing model or test file fails before binding
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    let loader_config = config.clone();
    let dashboard = tokio::task::spawn_blocking(move || Dashboard::load(&loader_config)).await??;
    let state = Arc::new(AppState::with_dashboard(config.clone(), dashboard));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        model = %config.model_path.display(),
        test = %config.test_path.display(),
        started_at = %start_time.to_rfc3339(),
        "Dashboard listening"
    );
    info!(url = %format!("http://{}", addr), "Dashboard available");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
