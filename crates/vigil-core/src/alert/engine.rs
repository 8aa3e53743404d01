//! Alert evaluation engine.
//!
//! Each (rule, subject) pair follows `Clear -> Active -> Resolved`. While a
//! rule stays violated its single active alert is updated in place. A
//! violation after resolution opens a new alert with a new id, so history is
//! never overwritten.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::rules::{Severity, ThresholdRule};
use crate::error::{Result, VigilError};
use crate::sample::Sample;

/// Alert identifier, unique within one engine.
pub type AlertId = u64;

/// Who resolved an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Operator,
    Auto,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operator => write!(f, "operator"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// A stateful record of a rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub rule_id: String,
    pub subject: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub observed: f64,
    pub threshold: f64,
    pub created_at: u64,
    pub updated_at: u64,
    pub resolved: bool,
    pub resolved_at: Option<u64>,
    pub resolved_by: Option<Resolution>,
}

/// Lifecycle state of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    /// Never violated.
    Clear,
    /// Has an unresolved alert.
    Active,
    /// Most recent alert is resolved.
    Resolved,
}

/// Transition produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    Triggered(AlertId),
    Updated(AlertId),
    AutoResolved(AlertId),
}

/// Evaluates threshold rules for one subject and owns its alert history.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    subject: String,
    rules: Vec<ThresholdRule>,
    /// Every alert ever raised, in creation order.
    history: Vec<Alert>,
    /// rule id -> index into `history` of its unresolved alert.
    active: HashMap<String, usize>,
    next_id: AlertId,
}

impl AlertEngine {
    /// Build an engine, rejecting malformed rules up front.
    pub fn new(
        subject: impl Into<String>,
        rules: Vec<ThresholdRule>,
        known_fields: &BTreeSet<String>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate(known_fields)?;
            if !seen.insert(rule.id.as_str()) {
                return Err(VigilError::invalid_rule(&rule.id, "duplicate rule id"));
            }
        }
        Ok(Self {
            subject: subject.into(),
            rules,
            history: Vec::new(),
            active: HashMap::new(),
            next_id: 1,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Run every rule against a new sample.
    pub fn evaluate(&mut self, sample: &Sample) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let ts = sample.timestamp();

        for rule in &self.rules {
            let Some(observed) = sample.get(&rule.field) else {
                continue;
            };
            let violated = rule.comparator.holds(observed, rule.limit);

            match (self.active.get(&rule.id).copied(), violated) {
                (Some(idx), true) => {
                    let alert = &mut self.history[idx];
                    alert.observed = observed;
                    alert.updated_at = ts;
                    alert.message = rule.render(observed);
                    debug!(
                        "[{}] alert #{} ({}) still active at {}",
                        self.subject, alert.id, rule.id, observed
                    );
                    events.push(AlertEvent::Updated(alert.id));
                }
                (Some(idx), false) if rule.auto_resolve => {
                    self.active.remove(&rule.id);
                    let alert = &mut self.history[idx];
                    alert.resolved = true;
                    alert.resolved_at = Some(ts);
                    alert.resolved_by = Some(Resolution::Auto);
                    info!(
                        "[{}] alert #{} ({}) auto-resolved: {} = {}",
                        self.subject, alert.id, rule.id, rule.field, observed
                    );
                    events.push(AlertEvent::AutoResolved(alert.id));
                }
                (Some(_), false) => {}
                (None, true) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    let alert = Alert {
                        id,
                        rule_id: rule.id.clone(),
                        subject: self.subject.clone(),
                        severity: rule.severity,
                        title: rule.display_title().to_string(),
                        message: rule.render(observed),
                        observed,
                        threshold: rule.limit,
                        created_at: ts,
                        updated_at: ts,
                        resolved: false,
                        resolved_at: None,
                        resolved_by: None,
                    };
                    info!(
                        "[{}] {} alert #{} ({}): {}",
                        self.subject, rule.severity, id, rule.id, alert.message
                    );
                    self.active.insert(rule.id.clone(), self.history.len());
                    self.history.push(alert);
                    events.push(AlertEvent::Triggered(id));
                }
                (None, false) => {}
            }
        }

        events
    }

    /// Operator resolution. Resolving an already-resolved alert is a no-op.
    pub fn resolve(&mut self, id: AlertId, at: u64) -> Result<Alert> {
        let idx = self
            .history
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| VigilError::NotFound {
                kind: "alert",
                id: id.to_string(),
            })?;

        let alert = &mut self.history[idx];
        if !alert.resolved {
            alert.resolved = true;
            alert.resolved_at = Some(at.max(alert.updated_at));
            alert.resolved_by = Some(Resolution::Operator);
            self.active.remove(&alert.rule_id);
            info!("[{}] alert #{} ({}) resolved by operator", self.subject, id, alert.rule_id);
        }
        Ok(alert.clone())
    }

    /// Alerts in creation order, optionally including resolved ones.
    pub fn alerts(&self, include_resolved: bool) -> Vec<Alert> {
        self.history
            .iter()
            .filter(|a| include_resolved || !a.resolved)
            .cloned()
            .collect()
    }

    /// Unresolved alerts.
    pub fn active(&self) -> Vec<Alert> {
        self.alerts(false)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.history.iter().find(|a| a.id == id)
    }

    /// Current lifecycle state of a rule, `None` for an unknown rule id.
    pub fn rule_state(&self, rule_id: &str) -> Option<RuleState> {
        if !self.rules.iter().any(|r| r.id == rule_id) {
            return None;
        }
        if self.active.contains_key(rule_id) {
            Some(RuleState::Active)
        } else if self.history.iter().any(|a| a.rule_id == rule_id) {
            Some(RuleState::Resolved)
        } else {
            Some(RuleState::Clear)
        }
    }

    /// Most severe level among unresolved alerts.
    pub fn highest_active_severity(&self) -> Option<Severity> {
        self.active
            .values()
            .map(|&idx| self.history[idx].severity)
            .max()
    }
}
