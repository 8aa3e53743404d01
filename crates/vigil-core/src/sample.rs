//! Timestamped metric samples.
//!
//! A [`Sample`] is one observation of a set of named numeric fields. The field
//! set is a map rather than a fixed struct so every subject (activity log,
//! system metrics, service health) can track its own fields.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One immutable observation: a unix-millisecond timestamp plus named values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    timestamp: u64,
    fields: BTreeMap<String, f64>,
}

impl Sample {
    /// Create a sample with no fields.
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Create a sample from an existing field map.
    pub fn from_fields(timestamp: u64, fields: BTreeMap<String, f64>) -> Self {
        Self { timestamp, fields }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Unix timestamp in milliseconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Value of a field, if present.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// Whether the sample carries `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All fields in name order.
    pub fn fields(&self) -> &BTreeMap<String, f64> {
        &self.fields
    }

    /// Field names in name order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Current wall-clock time in unix milliseconds.
pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
