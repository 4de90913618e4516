//! Metric Record - one logged value of a run metric

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single metric data point.
///
/// A metric key may be logged many times per run. The history of a key is
/// ordered by `step`; the current value of a key is the point with the highest
/// step, with `timestamp` breaking ties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record stamped with the current time.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self::builder(run_id, key, step, value).build()
    }

    /// Create a builder for a metric record with an explicit timestamp.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        key: impl Into<String>,
        step: u64,
        value: f64,
    ) -> MetricRecordBuilder {
        MetricRecordBuilder {
            record: Self {
                run_id: run_id.into(),
                key: key.into(),
                step,
                value,
                timestamp: Utc::now(),
            },
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the step number.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this point supersedes `other` as the current value of its key.
    ///
    /// Equal step and timestamp counts as newer, so the last logged point wins.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        (self.step, self.timestamp) >= (other.step, other.timestamp)
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    record: MetricRecord,
}

impl MetricRecordBuilder {
    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    /// Build the `MetricRecord`.
    #[must_use]
    pub fn build(self) -> MetricRecord {
        self.record
    }
}
