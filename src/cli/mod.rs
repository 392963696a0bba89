//! Command-line interface for data preparation, training, evaluation and the
//! dashboard.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Params;
use crate::data::loader::load_csv;
use crate::data::prep::{prepare_named_dataset, prepare_toy_dataset, PreparedSplit};
use crate::server::{run_server, ServerConfig};
use crate::tracking::ExperimentTracker;
use crate::training::{ModelArtifact, Trainer};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mlops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Baseline MLOps pipeline: prepare, train, evaluate, serve")]
#[command(long_about = None)]
pub struct Cli {
    /// Parameter file
    #[arg(long, global = true, default_value = "params.yaml", env = "MLOPS_PARAMS")]
    pub params: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the toy two-feature dataset and split it into train/test
    Prepare {
        /// Source CSV with feature1, feature2, label (defaults to data.source)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory (defaults to data.dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Split a named raw dataset, vectorizing its text column if configured
    PrepareDataset {
        /// Dataset name under data.raw (all configured datasets when omitted)
        name: Option<String>,
    },

    /// Tune every enabled model on every dataset and persist the winners
    Train,

    /// Print held-out metrics for a persisted model
    Evaluate {
        /// Dataset whose model and test partition are evaluated
        #[arg(short, long, default_value = "heart")]
        dataset: String,

        /// Model artifact (defaults to <models_dir>/<dataset>_best.json)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Test CSV (defaults to <data.dir>/<dataset>_test.csv)
        #[arg(short, long)]
        test: Option<PathBuf>,
    },

    /// Start the prediction dashboard
    Serve {
        #[arg(short, long, default_value = "heart")]
        dataset: String,

        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        test: Option<PathBuf>,

        /// Server host (defaults to DASHBOARD_HOST or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Server port (defaults to DASHBOARD_PORT or 8501)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Prepare { source, out_dir } => cmd_prepare(&cli.params, source, out_dir),
        Commands::PrepareDataset { name } => cmd_prepare_dataset(&cli.params, name.as_deref()),
        Commands::Train => cmd_train(&cli.params),
        Commands::Evaluate { dataset, model, test } => cmd_evaluate(&cli.params, &dataset, model, test),
        Commands::Serve { dataset, model, test, host, port } => {
            cmd_serve(&cli.params, &dataset, model, test, host, port).await
        }
    }
}

fn load_params(path: &Path) -> anyhow::Result<Params> {
    step_run(&format!("Loading {}", path.display()));
    let params = Params::load(path)?;
    step_done(&format!("{} model families", params.models.len()));
    Ok(params)
}

fn print_split(split: &PreparedSplit) {
    kv("Train", &format!("{} rows → {}", split.train_rows, split.train_path.display()));
    kv("Test", &format!("{} rows → {}", split.test_rows, split.test_path.display()));
    kv("Columns", &split.columns.to_string());
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_prepare(params_path: &Path, source: Option<PathBuf>, out_dir: Option<PathBuf>) -> anyhow::Result<()> {
    section("Prepare");
    let params = load_params(params_path)?;
    let source = source.unwrap_or_else(|| params.data.source.clone());
    let out_dir = out_dir.unwrap_or_else(|| params.data.dir.clone());

    step_run("Synthesizing and splitting");
    let start = Instant::now();
    let split = prepare_toy_dataset(&params, &source, &out_dir)?;
    step_done(&format!("{:?}", start.elapsed()));
    print_split(&split);
    println!();
    Ok(())
}

pub fn cmd_prepare_dataset(params_path: &Path, name: Option<&str>) -> anyhow::Result<()> {
    section("Prepare dataset");
    let params = load_params(params_path)?;

    let names: Vec<String> = match name {
        Some(name) => vec![name.to_string()],
        None => params.data.raw.keys().cloned().collect(),
    };
    if names.is_empty() {
        anyhow::bail!("no raw datasets configured under data.raw");
    }

    for name in names {
        step_run(&format!("Preparing {}", name.cyan()));
        let start = Instant::now();
        let split = prepare_named_dataset(&params, &name)?;
        step_done(&format!("{:?}", start.elapsed()));
        print_split(&split);
    }
    println!();
    Ok(())
}

pub fn cmd_train(params_path: &Path) -> anyhow::Result<()> {
    section("Train");
    let params = load_params(params_path)?;
    let tracker = ExperimentTracker::with_dir(&params.output.tracking_dir)?;

    let start = Instant::now();
    let summary = Trainer::new(&params, &tracker)?.run()?;

    for outcome in &summary.datasets {
        println!();
        println!("  {}", outcome.dataset.to_uppercase().white().bold());
        for candidate in &outcome.candidates {
            let cv = candidate
                .cv_score
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<12} {} {}  {} {}",
                candidate.model_name.cyan(),
                muted("cv"),
                cv.white(),
                muted("test"),
                format!("{:.4}", candidate.test_accuracy).white()
            );
        }
        println!(
            "  {} {} → {} ({:.4})",
            ok("✓"),
            outcome.dataset,
            outcome.best_model.bold(),
            outcome.test_accuracy
        );
    }

    println!();
    kv("Time", &format!("{:.3}s", start.elapsed().as_secs_f64()));
    kv("Summary", &params.output.metrics_path.display().to_string());
    println!();
    Ok(())
}

fn resolve_paths(
    params_path: &Path,
    dataset: &str,
    model: Option<PathBuf>,
    test: Option<PathBuf>,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    if let (Some(model), Some(test)) = (&model, &test) {
        return Ok((model.clone(), test.clone()));
    }
    let params = Params::load(params_path)?;
    let model = model.unwrap_or_else(|| params.output.models_dir.join(ModelArtifact::file_name(dataset)));
    let test = test.unwrap_or_else(|| params.test_path(dataset));
    Ok((model, test))
}

pub fn cmd_evaluate(
    params_path: &Path,
    dataset: &str,
    model: Option<PathBuf>,
    test: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Evaluate");
    let (model_path, test_path) = resolve_paths(params_path, dataset, model, test)?;

    step_run("Loading model");
    let artifact = ModelArtifact::load(&model_path)?;
    step_done(&artifact.model_name);

    step_run("Scoring test partition");
    let evaluation = artifact.evaluate(&load_csv(&test_path)?)?;
    step_done(&format!("{} rows", evaluation.rows));

    println!();
    kv("Accuracy", &format!("{:.4}", evaluation.accuracy));
    println!();
    println!("{}", evaluation.report);

    let cm = &evaluation.confusion_matrix;
    println!("  {}", muted("Confusion matrix (rows = true, columns = predicted)"));
    let header: Vec<String> = cm.labels.iter().map(|l| format!("{:>8}", l)).collect();
    println!("  {:>8}{}", "", header.join(""));
    for (label, row) in cm.labels.iter().zip(&cm.matrix) {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>8}", v)).collect();
        println!("  {:>8}{}", label, cells.join(""));
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(
    params_path: &Path,
    dataset: &str,
    model: Option<PathBuf>,
    test: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (model_path, test_path) = resolve_paths(params_path, dataset, model, test)?;
    let mut config = ServerConfig::for_model(model_path, test_path);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    section("Dashboard");
    kv("Model", &config.model_path.display().to_string());
    kv("Test data", &config.test_path.display().to_string());
    kv("URL", &format!("http://{}:{}", config.host, config.port));
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["mlops", "serve", "--dataset", "imdb", "--port", "9000"]);
        assert_eq!(cli.params, PathBuf::from("params.yaml"));
        match cli.command {
            Commands::Serve { dataset, port, .. } => {
                assert_eq!(dataset, "imdb");
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_explicit_paths_skip_params() {
        let (model, test) = resolve_paths(
            Path::new("/nonexistent/params.yaml"),
            "heart",
            Some("m.json".into()),
            Some("t.csv".into()),
        )
        .unwrap();
        assert_eq!(model, PathBuf::from("m.json"));
        assert_eq!(test, PathBuf::from("t.csv"));
    }
}
