//! Run-level tracking API on top of a [`TrackingStore`](crate::experiment::TrackingStore)
//!
//! - [`TrackingClient`]: experiments, run creation, search, model loading
//! - [`ActiveRun`]: explicit handle for the run being recorded
//! - [`latest_run_id`]: most recently started run of a named experiment
//! - [`ArtifactUri`]: `runs:/{run_id}/{artifact_path}` references

mod client;
mod resolver;
mod uri;

pub use client::{ActiveRun, TrackingClient};
pub use resolver::latest_run_id;
pub use uri::ArtifactUri;
