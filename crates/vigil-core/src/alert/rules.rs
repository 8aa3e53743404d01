//! Threshold rule definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};
use crate::sample::Sample;

/// Severity levels for alerts, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Comparison applied between an observed value and a rule's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

impl Comparator {
    /// Whether `observed <op> limit` holds.
    pub fn holds(self, observed: f64, limit: f64) -> bool {
        match self {
            Self::Gt => observed > limit,
            Self::Ge => observed >= limit,
            Self::Lt => observed < limit,
            Self::Le => observed <= limit,
            Self::Eq => (observed - limit).abs() <= f64::EPSILON * limit.abs().max(1.0),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "=" | "==" => Ok(Self::Eq),
            other => Err(VigilError::invalid_config(format!(
                "unknown comparator '{other}'"
            ))),
        }
    }
}

/// Static threshold definition evaluated against every new sample.
///
/// `description` is a template; `{field}`, `{observed}`, `{comparator}` and
/// `{limit}` are substituted when an alert is raised or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: String,
    pub field: String,
    pub comparator: Comparator,
    pub limit: f64,
    pub severity: Severity,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Resolve automatically once the condition clears. When false the alert
    /// stays active until an operator resolves it.
    #[serde(default)]
    pub auto_resolve: bool,
}

const DEFAULT_DESCRIPTION: &str = "{field} is {observed} ({comparator} {limit})";

impl ThresholdRule {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        comparator: Comparator,
        limit: f64,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            comparator,
            limit,
            severity,
            title: String::new(),
            description: String::new(),
            auto_resolve: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, template: impl Into<String>) -> Self {
        self.description = template.into();
        self
    }

    pub fn auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    /// Title shown to operators, falling back to the rule id.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { &self.id } else { &self.title }
    }

    /// `Some(true)` when the sample violates the rule, `None` when the sample
    /// does not carry the rule's field.
    pub fn is_violated(&self, sample: &Sample) -> Option<bool> {
        sample
            .get(&self.field)
            .map(|v| self.comparator.holds(v, self.limit))
    }

    /// Render the description template for an observed value.
    pub fn render(&self, observed: f64) -> String {
        let template = if self.description.is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            self.description.as_str()
        };
        template
            .replace("{field}", &self.field)
            .replace("{observed}", &format_value(observed))
            .replace("{comparator}", self.comparator.symbol())
            .replace("{limit}", &format_value(self.limit))
    }

    /// Check the rule against the set of fields its session tracks.
    pub fn validate(&self, known_fields: &BTreeSet<String>) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(VigilError::invalid_rule(
                "<unnamed>",
                format!("rule on field '{}' has an empty id", self.field),
            ));
        }
        if !known_fields.contains(&self.field) {
            return Err(VigilError::invalid_rule(
                &self.id,
                format!("unknown field '{}'", self.field),
            ));
        }
        if !self.limit.is_finite() {
            return Err(VigilError::invalid_rule(&self.id, "limit must be finite"));
        }
        Ok(())
    }
}

/// Format a value without trailing noise: integers print bare, others with two decimals.
fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_severity_ordering_and_display() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(Severity::Critical.to_string(), "critical");
    }

    #[test]
    fn test_comparators() {
        assert!(Comparator::Gt.holds(81.0, 80.0));
        assert!(!Comparator::Gt.holds(80.0, 80.0));
        assert!(Comparator::Ge.holds(80.0, 80.0));
        assert!(Comparator::Lt.holds(99.4, 99.5));
        assert!(Comparator::Le.holds(99.5, 99.5));
        assert!(Comparator::Eq.holds(0.0, 0.0));
        assert!(!Comparator::Eq.holds(0.1, 0.0));
    }

    #[test]
    fn test_comparator_parse() {
        assert_eq!(">=".parse::<Comparator>().unwrap(), Comparator::Ge);
        assert_eq!("==".parse::<Comparator>().unwrap(), Comparator::Eq);
        assert!("=>".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_comparator_serde_uses_symbols() {
        let json = serde_json::to_string(&Comparator::Le).unwrap();
        assert_eq!(json, "\"<=\"");
        let parsed: Comparator = serde_json::from_str("\">\"").unwrap();
        assert_eq!(parsed, Comparator::Gt);
    }

    #[test]
    fn test_is_violated_missing_field() {
        let rule = ThresholdRule::new("cpu_high", "cpu", Comparator::Gt, 80.0, Severity::Warning);
        assert_eq!(rule.is_violated(&Sample::new(1).with("cpu", 90.0)), Some(true));
        assert_eq!(rule.is_violated(&Sample::new(1).with("cpu", 10.0)), Some(false));
        assert_eq!(rule.is_violated(&Sample::new(1).with("memory", 90.0)), None);
    }

    #[test]
    fn test_render_default_and_custom_templates() {
        let rule = ThresholdRule::new("cpu_high", "cpu", Comparator::Gt, 80.0, Severity::Warning);
        assert_eq!(rule.render(90.0), "cpu is 90 (> 80)");

        let rule = rule.with_description("CPU at {observed}% exceeds {limit}%");
        assert_eq!(rule.render(91.25), "CPU at 91.25% exceeds 80%");
    }

    #[test]
    fn test_display_title_falls_back_to_id() {
        let rule = ThresholdRule::new("cpu_high", "cpu", Comparator::Gt, 80.0, Severity::Warning);
        assert_eq!(rule.display_title(), "cpu_high");
        assert_eq!(rule.with_title("High CPU").display_title(), "High CPU");
    }

    #[test]
    fn test_validate_unknown_field() {
        let rule = ThresholdRule::new("lat", "latency", Comparator::Gt, 20.0, Severity::Warning);
        let err = rule.validate(&known(&["cpu"])).unwrap_err();
        assert!(matches!(err, VigilError::InvalidRule { .. }));
        assert!(err.to_string().contains("unknown field 'latency'"));
    }

    #[test]
    fn test_validate_bad_limit_and_id() {
        let rule = ThresholdRule::new("cpu", "cpu", Comparator::Gt, f64::NAN, Severity::Info);
        assert!(rule.validate(&known(&["cpu"])).is_err());
        let rule = ThresholdRule::new(" ", "cpu", Comparator::Gt, 1.0, Severity::Info);
        assert!(rule.validate(&known(&["cpu"])).is_err());
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: ThresholdRule = serde_json::from_str(
            r#"{"id":"cpu_high","field":"cpu","comparator":">","limit":80,"severity":"critical"}"#,
        )
        .unwrap();
        assert_eq!(rule.comparator, Comparator::Gt);
        assert_eq!(rule.severity, Severity::Critical);
        assert!(!rule.auto_resolve);
        assert!(rule.title.is_empty());
    }
}
