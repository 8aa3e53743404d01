//! Configured ratios and weighted composite scores.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::derive::percentage;
use crate::error::{Result, VigilError};
use crate::sample::Sample;

/// `round(100 * numerator / total)` evaluated on the current sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioConfig {
    pub name: String,
    pub numerator: String,
    pub total: String,
}

impl RatioConfig {
    pub fn new(
        name: impl Into<String>,
        numerator: impl Into<String>,
        total: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            numerator: numerator.into(),
            total: total.into(),
        }
    }

    /// `None` when either field is absent from the sample.
    pub fn evaluate(&self, sample: &Sample) -> Option<f64> {
        let n = sample.get(&self.numerator)?;
        let t = sample.get(&self.total)?;
        Some(percentage(n, t))
    }

    pub fn validate(&self, known_fields: &BTreeSet<String>) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VigilError::invalid_config("ratio with an empty name"));
        }
        for field in [&self.numerator, &self.total] {
            if !known_fields.contains(field) {
                return Err(VigilError::invalid_config(format!(
                    "ratio '{}' references unknown field '{field}'",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// One input of a composite score, normalised to 0–100 over `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub field: String,
    pub weight: f64,
    pub min: f64,
    pub max: f64,
    /// Lower raw values score higher.
    #[serde(default)]
    pub invert: bool,
}

impl ScoreComponent {
    pub fn new(field: impl Into<String>, weight: f64, min: f64, max: f64) -> Self {
        Self {
            field: field.into(),
            weight,
            min,
            max,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    fn normalise(&self, value: f64) -> f64 {
        let scaled = ((value - self.min) / (self.max - self.min) * 100.0).clamp(0.0, 100.0);
        if self.invert { 100.0 - scaled } else { scaled }
    }
}

/// Weighted average of normalised components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub name: String,
    pub components: Vec<ScoreComponent>,
}

impl ScoreConfig {
    pub fn new(name: impl Into<String>, components: Vec<ScoreComponent>) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }

    /// Score in `[0, 100]`. Components whose field is absent are skipped;
    /// `None` when no component applies.
    pub fn evaluate(&self, sample: &Sample) -> Option<f64> {
        let (weighted, total_weight) = self
            .components
            .iter()
            .filter_map(|c| sample.get(&c.field).map(|v| (c.normalise(v) * c.weight, c.weight)))
            .fold((0.0, 0.0), |(acc, w), (x, cw)| (acc + x, w + cw));
        if total_weight <= 0.0 {
            return None;
        }
        Some(weighted / total_weight)
    }

    pub fn validate(&self, known_fields: &BTreeSet<String>) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VigilError::invalid_config("score with an empty name"));
        }
        if self.components.is_empty() {
            return Err(VigilError::invalid_config(format!(
                "score '{}' has no components",
                self.name
            )));
        }
        for c in &self.components {
            if !known_fields.contains(&c.field) {
                return Err(VigilError::invalid_config(format!(
                    "score '{}' references unknown field '{}'",
                    self.name, c.field
                )));
            }
            if !c.weight.is_finite() || c.weight <= 0.0 {
                return Err(VigilError::invalid_config(format!(
                    "score '{}': weight for '{}' must be positive",
                    self.name, c.field
                )));
            }
            if !c.min.is_finite() || !c.max.is_finite() || c.min >= c.max {
                return Err(VigilError::invalid_config(format!(
                    "score '{}': bounds for '{}' must satisfy min < max",
                    self.name, c.field
                )));
            }
        }
        Ok(())
    }
}
