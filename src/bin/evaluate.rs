//! Evaluate the latest model of an experiment on held-out data
//!
//! ```text
//! evaluate --experiment_name NAME [--tracking_dir DIR] [--test_data FILE]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rastreo::config::TrackingConfig;
use rastreo::pipeline::{evaluate, log_evaluation, EvaluateOptions};
use rastreo::tracking::TrackingClient;

/// Score the most recent run's model and log MSE and R² back to that run
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "evaluate", version, about)]
struct Args {
    /// Experiment whose latest run is evaluated
    #[arg(long = "experiment_name")]
    experiment_name: String,

    /// Tracking store directory (default from config)
    #[arg(long = "tracking_dir")]
    tracking_dir: Option<PathBuf>,

    /// Evaluate on this Parquet file instead of fresh synthetic data
    #[arg(long = "test_data")]
    test_data: Option<PathBuf>,
}

fn main() -> Result<()> {
    rastreo::logging::init();
    let args = Args::parse();

    let mut config = TrackingConfig::load().context("Failed to load configuration")?;
    if let Some(dir) = args.tracking_dir {
        config = config.with_tracking_dir(dir);
    }

    let options = EvaluateOptions {
        experiment_name: args.experiment_name,
        test_data: args.test_data,
    };
    let client = TrackingClient::new(config.open_store());

    let report = evaluate(&client, &options).with_context(|| {
        format!(
            "Evaluation failed for experiment '{}'",
            options.experiment_name
        )
    })?;
    println!("Loaded model from {}", report.model_uri);
    println!("MSE: {:.2}, R^2: {:.2}", report.mse, report.r2);

    log_evaluation(&client, &report)
        .with_context(|| format!("Failed to log metrics to run {}", report.run_id))?;
    println!("Evaluation metrics logged to run {}", report.run_id);
    Ok(())
}
