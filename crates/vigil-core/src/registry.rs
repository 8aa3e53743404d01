//! Subject-keyed collection of sessions with an overall health roll-up.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::TelemetryConfig;
use crate::error::{Result, VigilError};
use crate::session::{HealthStatus, SessionInfo, TelemetrySession};

/// Per-subject health plus the overall status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub sessions: BTreeMap<String, HealthStatus>,
}

/// Shared registry of running sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<String, Arc<TelemetrySession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every session described by `config`. Sessions are not started.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        config.validate()?;
        let registry = Self::new();
        for entry in &config.sessions {
            registry.insert(entry.build_session()?)?;
        }
        Ok(registry)
    }

    /// Add a session; subjects must be unique.
    pub fn insert(&self, session: TelemetrySession) -> Result<Arc<TelemetrySession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let subject = session.subject().to_string();
        if sessions.contains_key(&subject) {
            return Err(VigilError::invalid_config(format!(
                "a session for '{subject}' is already registered"
            )));
        }
        let session = Arc::new(session);
        sessions.insert(subject, Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, subject: &str) -> Result<Arc<TelemetrySession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .cloned()
            .ok_or_else(|| VigilError::NotFound {
                kind: "session",
                id: subject.to_string(),
            })
    }

    /// Remove and stop a session.
    pub fn remove(&self, subject: &str) -> Result<Arc<TelemetrySession>> {
        let session = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subject)
            .ok_or_else(|| VigilError::NotFound {
                kind: "session",
                id: subject.to_string(),
            })?;
        if !session.is_stopped()
            && let Err(e) = session.stop()
        {
            log::warn!("[{subject}] stop on remove failed: {e}");
        }
        Ok(session)
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn sessions(&self) -> Vec<Arc<TelemetrySession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions().iter().map(|s| s.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start every session that has not been started yet.
    pub fn start_all(&self) -> Result<()> {
        for session in self.sessions() {
            match session.start() {
                Ok(()) | Err(VigilError::AlreadyStarted) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Stop every session; already stopped sessions are skipped.
    pub fn stop_all(&self) {
        for session in self.sessions() {
            if let Err(e) = session.stop()
                && !matches!(e, VigilError::SchedulerClosed)
            {
                log::warn!("[{}] stop failed: {e}", session.subject());
            }
        }
    }

    /// Worst status wins: any outage is an outage, any degraded session
    /// degrades the whole.
    pub fn health(&self) -> HealthReport {
        let sessions: BTreeMap<String, HealthStatus> = self
            .sessions()
            .iter()
            .map(|s| (s.subject().to_string(), s.health()))
            .collect();
        let status = sessions
            .values()
            .copied()
            .max()
            .unwrap_or(HealthStatus::Operational);
        HealthReport { status, sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Comparator, Severity, ThresholdRule};
    use crate::config::SessionConfig;
    use crate::sample::Sample;
    use crate::source::FnSource;

    fn session(subject: &str, value: f64, severity: Severity) -> TelemetrySession {
        let config = SessionConfig::new(subject, ["cpu"]).with_rule(ThresholdRule::new(
            "cpu_high",
            "cpu",
            Comparator::Gt,
            80.0,
            severity,
        ));
        let source = FnSource::new("fixed", move |prev: Option<&Sample>| {
            Sample::new(prev.map_or(1, |p| p.timestamp() + 1)).with("cpu", value)
        });
        TelemetrySession::new(config, source).unwrap()
    }

    #[test]
    fn test_insert_get_and_duplicates() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());
        registry.insert(session("a", 1.0, Severity::Info)).unwrap();
        registry.insert(session("b", 1.0, Severity::Info)).unwrap();
        assert_eq!(registry.subjects(), vec!["a", "b"]);
        assert!(registry.insert(session("a", 1.0, Severity::Info)).is_err());
        assert_eq!(registry.get("b").unwrap().subject(), "b");
        assert!(matches!(
            registry.get("zzz"),
            Err(VigilError::NotFound { kind: "session", .. })
        ));
    }

    #[test]
    fn test_health_rollup() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.health().status, HealthStatus::Operational);

        let ok = registry.insert(session("ok", 10.0, Severity::Critical)).unwrap();
        let warn = registry.insert(session("warn", 90.0, Severity::Warning)).unwrap();
        ok.refresh();
        warn.refresh();
        let report = registry.health();
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.sessions["ok"], HealthStatus::Operational);

        let down = registry.insert(session("down", 95.0, Severity::Critical)).unwrap();
        down.refresh();
        assert_eq!(registry.health().status, HealthStatus::Outage);
    }

    #[test]
    fn test_start_and_stop_all() {
        let registry = SessionRegistry::new();
        registry.insert(session("a", 1.0, Severity::Info)).unwrap();
        registry.start_all().unwrap();
        // Idempotent for already started sessions.
        registry.start_all().unwrap();
        assert!(registry.list().iter().all(|i| i.running));
        registry.stop_all();
        registry.stop_all();
        assert!(registry.list().iter().all(|i| !i.running));
    }

    #[test]
    fn test_remove() {
        let registry = SessionRegistry::new();
        registry.insert(session("a", 1.0, Severity::Info)).unwrap();
        registry.remove("a").unwrap();
        assert!(registry.is_empty());
        assert!(registry.remove("a").is_err());
    }

    #[test]
    fn test_remove_stops_running_and_tolerates_stopped() {
        let registry = SessionRegistry::new();
        let running = registry.insert(session("live", 1.0, Severity::Info)).unwrap();
        running.start().unwrap();
        let removed = registry.remove("live").unwrap();
        assert!(removed.is_stopped());
        assert!(!removed.is_running());

        let stopped = registry.insert(session("done", 1.0, Severity::Info)).unwrap();
        stopped.start().unwrap();
        stopped.stop().unwrap();
        assert!(registry.remove("done").unwrap().is_stopped());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut entries = Vec::new();
        for p in crate::profiles::all() {
            entries.push(p.entry);
        }
        let config = TelemetryConfig { sessions: entries };
        let registry = SessionRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("system-health").is_ok());
    }
}
