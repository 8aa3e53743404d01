//! Session configuration and JSON config files.
//!
//! A config file holds a list of sessions. Each entry is a [`SessionConfig`]
//! plus the random-walk parameters used to simulate its fields:
//!
//! ```json
//! {
//!   "sessions": [
//!     {
//!       "subject": "edge-01",
//!       "capacity": 30,
//!       "fields": ["cpu"],
//!       "schedule": { "interval_ms": 5000 },
//!       "rules": [
//!         { "id": "cpu_high", "field": "cpu", "comparator": ">", "limit": 80,
//!           "severity": "warning", "auto_resolve": true }
//!       ],
//!       "simulate": { "cpu": { "start": 45, "step": 5, "min": 20, "max": 80 } }
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::alert::ThresholdRule;
use crate::error::{Result, VigilError};
use crate::metrics::{RatioConfig, ScoreConfig};
use crate::scheduler::ScheduleConfig;
use crate::session::TelemetrySession;
use crate::source::{FieldWalk, RandomWalkSource};
use crate::store::MAX_CAPACITY;

pub const DEFAULT_CAPACITY: usize = 30;

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// Everything needed to build one [`TelemetrySession`], minus its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub subject: String,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Declared field set; every sample must carry all of them.
    pub fields: Vec<String>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rules: Vec<ThresholdRule>,
    #[serde(default)]
    pub ratios: Vec<RatioConfig>,
    #[serde(default)]
    pub scores: Vec<ScoreConfig>,
}

impl SessionConfig {
    pub fn new<I, S>(subject: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            capacity: DEFAULT_CAPACITY,
            fields: fields.into_iter().map(Into::into).collect(),
            schedule: ScheduleConfig::default(),
            rules: Vec::new(),
            ratios: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.schedule.interval_ms = interval_ms;
        self
    }

    pub fn with_rule(mut self, rule: ThresholdRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_ratio(mut self, ratio: RatioConfig) -> Self {
        self.ratios.push(ratio);
        self
    }

    pub fn with_score(mut self, score: ScoreConfig) -> Self {
        self.scores.push(score);
        self
    }

    pub fn known_fields(&self) -> BTreeSet<String> {
        self.fields.iter().cloned().collect()
    }

    /// Structural checks. Rules are checked again, with duplicate detection,
    /// when the alert engine is built.
    pub fn validate(&self) -> Result<()> {
        validate_subject(&self.subject)?;
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(VigilError::invalid_config(format!(
                "session '{}': capacity must be between 1 and {MAX_CAPACITY}, got {}",
                self.subject, self.capacity
            )));
        }
        if self.fields.is_empty() {
            return Err(VigilError::invalid_config(format!(
                "session '{}' declares no fields",
                self.subject
            )));
        }
        if let Some(blank) = self.fields.iter().find(|f| f.trim().is_empty()) {
            return Err(VigilError::invalid_config(format!(
                "session '{}' has a blank field name '{blank}'",
                self.subject
            )));
        }
        self.schedule.validate()?;

        let known = self.known_fields();
        for rule in &self.rules {
            rule.validate(&known)?;
        }
        for ratio in &self.ratios {
            ratio.validate(&known)?;
        }
        for score in &self.scores {
            score.validate(&known)?;
        }
        Ok(())
    }
}

/// Subjects appear in URLs and file names, so keep them to a safe alphabet.
fn validate_subject(subject: &str) -> Result<()> {
    let ok = !subject.is_empty()
        && subject
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        return Err(VigilError::invalid_config(format!(
            "invalid subject '{subject}': use letters, digits, '-', '_' or '.'"
        )));
    }
    Ok(())
}

/// One configured session together with its simulated source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(flatten)]
    pub session: SessionConfig,
    #[serde(default)]
    pub simulate: BTreeMap<String, FieldWalk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SessionEntry {
    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        let missing: Vec<&str> = self
            .session
            .fields
            .iter()
            .filter(|f| !self.simulate.contains_key(*f))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(VigilError::invalid_config(format!(
                "session '{}': no simulation for field(s) {}",
                self.session.subject,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn build_source(&self) -> Result<RandomWalkSource> {
        let source = RandomWalkSource::new(
            format!("{}-walk", self.session.subject),
            self.simulate.clone(),
        )?;
        Ok(match self.seed {
            Some(seed) => source.seeded(seed),
            None => source,
        })
    }

    /// Build an idle session driven by the entry's random walk.
    pub fn build_session(&self) -> Result<TelemetrySession> {
        self.validate()?;
        TelemetrySession::new(self.session.clone(), self.build_source()?)
    }
}

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for entry in &self.sessions {
            entry.validate()?;
            if !seen.insert(entry.session.subject.as_str()) {
                return Err(VigilError::invalid_config(format!(
                    "duplicate session subject '{}'",
                    entry.session.subject
                )));
            }
        }
        Ok(())
    }
}

/// Parse and validate a JSON config.
pub fn parse_config(raw: &str) -> Result<TelemetryConfig> {
    let config: TelemetryConfig = serde_json::from_str(raw)
        .map_err(|e| VigilError::invalid_config(format!("failed to parse config JSON: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a JSON config file.
pub fn load_config_from_path(path: &Path) -> Result<TelemetryConfig> {
    let raw = std::fs::read_to_string(path)?;
    parse_config(&raw)
}
