//! # Rastreo: Lasso Training with Embedded Experiment Tracking
//!
//! **Version**: 0.1.0
//!
//! Rastreo pairs a small regression workflow with a self-contained experiment
//! tracker. The `train` binary fits an L1-regularised linear model and logs
//! it as a run; the `evaluate` binary finds the most recent run of an
//! experiment, loads its model from `runs:/{run_id}/lasso_model`, and logs
//! MSE and R² back to that run.
//!
//! ## Design Principles
//!
//! - **Explicit run handles**: logging goes through an [`ActiveRun`](tracking::ActiveRun),
//!   never through process-global state
//! - **Pluggable storage**: everything is written through the
//!   [`TrackingStore`](experiment::TrackingStore) trait (in-memory or on-disk)
//! - **Content addressing**: artifacts carry a SHA-256 hash that is checked on read
//!
//! ## Example Usage
//!
//! ```rust
//! use rastreo::experiment::MemoryTrackingStore;
//! use rastreo::model::LassoParams;
//! use rastreo::pipeline::{evaluate, train, EvaluateOptions, TrainOptions};
//! use rastreo::tracking::TrackingClient;
//!
//! let client = TrackingClient::new(MemoryTrackingStore::new());
//!
//! let trained = train(&client, &TrainOptions::new(LassoParams::new(0.5, 1000), "demo"))?;
//! let report = evaluate(&client, &EvaluateOptions::new("demo"))?;
//!
//! assert_eq!(report.run_id, trained.run_id);
//! assert!(report.r2 > 0.8);
//! # Ok::<(), rastreo::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod tracking;

pub use error::{Error, Result};
