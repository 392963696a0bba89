//! Baseline MLOps pipeline - main entry point

use clap::Parser;
use mlops_baseline::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mlops_baseline=info".into()),
        )
        .init();

    cli::run(Cli::parse()).await
}
