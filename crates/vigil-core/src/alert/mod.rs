//! Threshold alerting: rule definitions and the per-subject alert engine.

mod engine;
mod rules;

pub use engine::{Alert, AlertEngine, AlertEvent, AlertId, Resolution, RuleState};
pub use rules::{Comparator, Severity, ThresholdRule};
