//! Error types for the telemetry engine.
//!
//! Configuration errors (`InvalidRule`, `InvalidConfig`) are fatal when a
//! session is built. `InvalidSample` is raised per tick and never stops the
//! scheduler.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Main error type for the engine.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Invalid sample: {reason}")]
    InvalidSample { reason: String },

    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Scheduler is closed")]
    SchedulerClosed,

    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Export failed: {reason}")]
    Export { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VigilError {
    pub(crate) fn invalid_sample(reason: impl Into<String>) -> Self {
        Self::InvalidSample {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this error is a configuration error detected at load time.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidRule { .. } | Self::InvalidConfig { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = VigilError::invalid_rule("cpu_high", "unknown field 'cpu'");
        assert_eq!(err.to_string(), "Invalid rule 'cpu_high': unknown field 'cpu'");

        let err = VigilError::NotFound {
            kind: "alert",
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "alert not found: 42");

        assert_eq!(VigilError::SchedulerClosed.to_string(), "Scheduler is closed");
    }

    #[test]
    fn test_config_error_classification() {
        assert!(VigilError::invalid_config("capacity must be > 0").is_config_error());
        assert!(VigilError::invalid_rule("r", "bad").is_config_error());
        assert!(!VigilError::invalid_sample("clock regression").is_config_error());
        assert!(!VigilError::SchedulerClosed.is_config_error());
    }
}
