//! Latest-run resolution by experiment name

use crate::experiment::{RunSearch, TrackingStore};
use crate::{Error, Result};

/// Identifier of the most recently started run in the experiment `name`.
///
/// Runs are ordered by `start_time DESC` (ties broken by run id) and the
/// first one is returned.
///
/// # Errors
///
/// - `InvalidInput` for a blank name
/// - `NotFound` if no experiment is called `name`, or it has no runs
/// - any store error raised by the lookup or the search
pub fn latest_run_id<S: TrackingStore + ?Sized>(store: &S, name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "experiment name must not be empty".to_string(),
        ));
    }

    let experiment = store
        .get_experiment_by_name(name)?
        .ok_or_else(|| Error::NotFound(format!("Experiment '{name}' not found")))?;

    let search = RunSearch::new([experiment.experiment_id()])
        .order_by("start_time DESC")
        .max_results(1);
    let run = store
        .search_runs(&search)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound(format!("No runs found in experiment '{name}'")))?;

    tracing::debug!(experiment = name, run_id = run.run_id(), "resolved latest run");
    Ok(run.run_id().to_string())
}
