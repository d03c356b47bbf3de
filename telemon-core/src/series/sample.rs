//! A single multi-field observation.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// One observation: the receipt time plus every configured metric's value.
///
/// Field names are the normalized (lowercase) metric names.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    timestamp: SystemTime,
    fields: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(timestamp: SystemTime, fields: BTreeMap<String, f64>) -> Self {
        Self { timestamp, fields }
    }

    /// Create a sample stamped with the current wall-clock time.
    pub fn now(fields: BTreeMap<String, f64>) -> Self {
        Self::new(SystemTime::now(), fields)
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Unix timestamp in milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
    }

    pub fn fields(&self) -> &BTreeMap<String, f64> {
        &self.fields
    }

    /// Value of a field, matched case-insensitively.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.fields.get(name).or_else(|| self.fields.get(&name.to_lowercase())).copied()
    }
}
