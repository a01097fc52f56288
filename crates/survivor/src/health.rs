//! Health status types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::version::VersionInfo;

/// Identity of the active model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub kind: String,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
}

/// Snapshot of service health. Taking one never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub running: bool,
    pub model: Option<ModelSummary>,
    pub history_len: usize,
    pub history_capacity: usize,
    pub version: VersionInfo,
}

impl HealthSnapshot {
    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_kind(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.kind.as_str())
    }

    /// Human-readable model state, e.g. `loaded: LogisticRegression`.
    pub fn model_status(&self) -> String {
        match self.model_kind() {
            Some(kind) => format!("loaded: {kind}"),
            None => "not loaded".to_string(),
        }
    }
}
