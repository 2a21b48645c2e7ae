//! On-disk lifecycle records for `apply --state`, `refresh` and `release`.
//!
//! The file is a single JSON document: `{"records": [OrderingRecord, ...]}`.
//! A missing file is an empty state.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rfl_ordering::lifecycle::OrderingRecord;
use rfl_ordering::OrderingSpec;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub records: Vec<OrderingRecord>,
}

impl StateFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read state file failed: {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("state file is not valid JSON: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("serialize state failed")?;
        fs::write(path, body + "\n")
            .with_context(|| format!("write state file failed: {}", path.display()))
    }

    /// Take the prior record that should track `spec`.
    ///
    /// An exact match (same category and order) wins; otherwise the first
    /// record of the same category is reused so its id survives an edit of
    /// the desired order.
    pub fn claim(&mut self, spec: &OrderingSpec) -> Option<OrderingRecord> {
        let idx = self
            .records
            .iter()
            .position(|r| r.matches(spec))
            .or_else(|| self.records.iter().position(|r| r.category == spec.category))?;
        Some(self.records.remove(idx))
    }
}
