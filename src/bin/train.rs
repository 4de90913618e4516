//! Fit a Lasso model and log it as a new run
//!
//! ```text
//! train --alpha 0.5 --max_iter 1000 [--experiment_name NAME] [--tracking_dir DIR]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rastreo::config::TrackingConfig;
use rastreo::model::LassoParams;
use rastreo::pipeline::{train, TrainOptions};
use rastreo::tracking::TrackingClient;

/// Train a Lasso regression and record it in the tracking store
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "train", version, about)]
struct Args {
    /// L1 penalty strength
    #[arg(long)]
    alpha: f64,

    /// Maximum coordinate-descent iterations
    #[arg(long = "max_iter")]
    max_iter: usize,

    /// Experiment to log the run in (default from config)
    #[arg(long = "experiment_name")]
    experiment_name: Option<String>,

    /// Tracking store directory (default from config)
    #[arg(long = "tracking_dir")]
    tracking_dir: Option<PathBuf>,

    /// Train on this Parquet file (`x*` feature columns, `y` target)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Name for the new run
    #[arg(long = "run_name")]
    run_name: Option<String>,
}

fn main() -> Result<()> {
    rastreo::logging::init();
    let args = Args::parse();

    let mut config = TrackingConfig::load().context("Failed to load configuration")?;
    if let Some(dir) = args.tracking_dir {
        config = config.with_tracking_dir(dir);
    }
    let experiment_name = args
        .experiment_name
        .unwrap_or_else(|| config.default_experiment.clone());

    let options = TrainOptions {
        params: LassoParams::new(args.alpha, args.max_iter),
        experiment_name,
        run_name: args.run_name,
        data: args.data,
    };

    let client = TrackingClient::new(config.open_store());
    let report = train(&client, &options).with_context(|| {
        format!(
            "Training failed for experiment '{}'",
            options.experiment_name
        )
    })?;

    println!(
        "Logged run {} to experiment '{}' ({})",
        report.run_id,
        options.experiment_name,
        config.tracking_dir.display()
    );
    println!("Model saved to {}", report.model_uri);
    println!(
        "Test MSE: {:.2}, R^2: {:.2} ({} train / {} test samples)",
        report.test_mse, report.test_r2, report.n_train, report.n_test
    );
    if !report.model.converged {
        println!(
            "Warning: solver did not converge in {} iterations",
            report.model.n_iter
        );
    }
    Ok(())
}
