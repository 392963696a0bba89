//! Application state: the cached model/test pair

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::data::loader::load_csv;
use crate::training::{Evaluation, ModelArtifact};

use super::error::{Result, ServerError};
use super::ServerConfig;

/// Persisted model plus its held-out evaluation
#[derive(Debug)]
pub struct Dashboard {
    pub artifact: ModelArtifact,
    pub evaluation: Evaluation,
}

impl Dashboard {
    /// Load the artifact and score it on the test table
    pub fn load(config: &ServerConfig) -> crate::error::Result<Self> {
        let artifact = ModelArtifact::load(&config.model_path)?;
        let test = load_csv(&config.test_path)?;
        let evaluation = artifact.evaluate(&test)?;
        info!(
            model = %artifact.model_name,
            dataset = %artifact.dataset.name,
            accuracy = evaluation.accuracy,
            rows = evaluation.rows,
            "Loaded dashboard model"
        );
        Ok(Self { artifact, evaluation })
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    dashboard: OnceCell<Arc<Dashboard>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            dashboard: OnceCell::new(),
        }
    }

    /// State with an already loaded dashboard
    pub fn with_dashboard(config: ServerConfig, dashboard: Dashboard) -> Self {
        Self {
            config,
            dashboard: OnceCell::new_with(Some(Arc::new(dashboard))),
        }
    }

    /// The cached model/test pair, loaded on first use for the life of the process
    pub async fn dashboard(&self) -> Result<Arc<Dashboard>> {
        let dashboard = self
            .dashboard
            .get_or_try_init(|| async {
                let config = self.config.clone();
                let loaded = tokio::task::spawn_blocking(move || Dashboard::load(&config))
                    .await
                    .map_err(|e| ServerError::Internal(format!("loader task failed: {}", e)))??;
                Ok::<_, ServerError>(Arc::new(loaded))
            })
            .await?;
        Ok(Arc::clone(dashboard))
    }

    pub fn is_loaded(&self) -> bool {
        self.dashboard.initialized()
    }
}
