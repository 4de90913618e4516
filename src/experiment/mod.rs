//! Experiment Tracking Schema and Stores
//!
//! Data structures for experiment tracking plus the `TrackingStore` contract
//! and its in-memory and file-backed implementations.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N) [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rastreo::experiment::{MemoryTrackingStore, RunRecord, RunSearch, RunStatus, TrackingStore};
//!
//! # fn main() -> rastreo::Result<()> {
//! let store = MemoryTrackingStore::new();
//! let experiment = store.create_experiment("demo")?;
//!
//! let mut run = RunRecord::new("run-001", experiment.experiment_id());
//! run.start();
//! run.complete(RunStatus::Success);
//! store.put_run(&run)?;
//!
//! let latest = store.search_runs(
//!     &RunSearch::new([experiment.experiment_id()]).order_by("start_time DESC").max_results(1),
//! )?;
//! assert_eq!(latest[0].run_id(), "run-001");
//! # Ok(())
//! # }
//! ```

mod artifact_record;
mod experiment_record;
mod file_store;
mod metric_record;
mod run_record;
pub mod search;
mod store;

pub use artifact_record::{content_hash, normalize_artifact_path, ArtifactRecord};
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use file_store::FileTrackingStore;
pub use metric_record::{MetricRecord, MetricRecordBuilder};
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use search::RunSearch;
pub use store::{latest_values, MemoryTrackingStore, TrackingStore};
