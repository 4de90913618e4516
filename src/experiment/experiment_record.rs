//! Experiment Record - named grouping of runs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collection of runs.
///
/// The name is the lookup key used by the evaluator; a store holds at most
/// one experiment per name. The id is assigned by the store on creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentRecord {
    experiment_id: String,
    name: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    config: Option<serde_json::Value>,
}

impl ExperimentRecord {
    /// Create a new experiment record stamped with the current time.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::builder(experiment_id, name).build()
    }

    /// Create a builder for an experiment record with optional fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
    ) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(experiment_id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the experiment tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Get the experiment configuration, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    record: ExperimentRecord,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            record: ExperimentRecord {
                experiment_id: experiment_id.into(),
                name: name.into(),
                created_at: Utc::now(),
                tags: BTreeMap::new(),
                config: None,
            },
        }
    }

    /// Attach a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.tags.insert(key.into(), value.into());
        self
    }

    /// Set the experiment configuration.
    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.record.config = Some(config);
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.record.created_at = created_at;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_record_new() {
        let record = ExperimentRecord::new("0", "Default");
        assert_eq!(record.experiment_id(), "0");
        assert_eq!(record.name(), "Default");
        assert!(record.tags().is_empty());
        assert!(record.config().is_none());
    }

    #[test]
    fn test_experiment_record_builder_tags() {
        let record = ExperimentRecord::builder("1", "lasso")
            .tag("team", "forecasting")
            .config(serde_json::json!({"seed": 42}))
            .build();

        assert_eq!(record.tags().get("team").map(String::as_str), Some("forecasting"));
        assert_eq!(record.config(), Some(&serde_json::json!({"seed": 42})));
    }

    #[test]
    fn test_experiment_record_deserializes_without_optional_fields() {
        let json = r#"{"experiment_id":"3","name":"old","created_at":"2025-01-15T12:00:00Z"}"#;
        let record: ExperimentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name(), "old");
        assert!(record.tags().is_empty());
    }
}
