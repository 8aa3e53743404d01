//! Per-subject telemetry session.
//!
//! A [`TelemetrySession`] wires a [`SampleSource`] into a [`SampleStore`],
//! runs every new sample through an [`AlertEngine`], and publishes the result
//! as an immutable [`SessionSnapshot`]. Ticks come from the session's own
//! [`UpdateScheduler`] or from [`TelemetrySession::refresh`].
//!
//! A tick holds the session's working lock for produce, append, evaluate and
//! publish, so ticks never overlap. Readers only clone the published `Arc`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{Alert, AlertEngine, AlertEvent, AlertId, Severity};
use crate::config::SessionConfig;
use crate::error::{Result, VigilError};
use crate::export::{self, ExportFormat};
use crate::metrics::{DerivedMetrics, RatioConfig, ScoreConfig, derive};
use crate::sample::{Sample, unix_ms_now};
use crate::scheduler::{ScheduleConfig, UpdateScheduler};
use crate::source::SampleSource;
use crate::store::SampleStore;

// ---------------------------------------------------------------------------
// Public status types
// ---------------------------------------------------------------------------

/// Outcome of the most recent tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TickStatus {
    /// No tick has run yet.
    #[default]
    Idle,
    /// The sample was stored and evaluated.
    Applied { timestamp: u64, events: usize },
    /// The sample was rejected; store and alerts are unchanged.
    Degraded { reason: String },
}

impl TickStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Running counters for a session's ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStats {
    pub applied: u64,
    pub rejected: u64,
    pub last_error: Option<String>,
    pub last_tick_at: Option<u64>,
}

/// Coarse service status, as shown on an operations status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Operational,
    Degraded,
    Outage,
}

impl HealthStatus {
    /// Critical alerts mean an outage; warnings, errors or a rejected last
    /// tick mean degraded.
    pub fn assess(highest_active: Option<Severity>, last_tick: &TickStatus) -> Self {
        match highest_active {
            Some(Severity::Critical) => Self::Outage,
            Some(Severity::Error | Severity::Warning) => Self::Degraded,
            _ if last_tick.is_degraded() => Self::Degraded,
            _ => Self::Operational,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operational => write!(f, "operational"),
            Self::Degraded => write!(f, "degraded"),
            Self::Outage => write!(f, "outage"),
        }
    }
}

/// Immutable view published after every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub subject: String,
    pub capacity: usize,
    pub samples: Vec<Sample>,
    /// Every alert of the session, resolved ones included.
    pub alerts: Vec<Alert>,
    pub metrics: DerivedMetrics,
    pub status: TickStatus,
    pub stats: TickStats,
    pub published_at: u64,
}

impl SessionSnapshot {
    fn empty(subject: &str, capacity: usize) -> Self {
        Self {
            subject: subject.to_string(),
            capacity,
            samples: Vec::new(),
            alerts: Vec::new(),
            metrics: DerivedMetrics {
                capacity,
                ..Default::default()
            },
            status: TickStatus::Idle,
            stats: TickStats::default(),
            published_at: unix_ms_now(),
        }
    }

    pub fn alerts(&self, include_resolved: bool) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| include_resolved || !a.resolved)
            .cloned()
            .collect()
    }

    pub fn highest_active_severity(&self) -> Option<Severity> {
        self.alerts
            .iter()
            .filter(|a| !a.resolved)
            .map(|a| a.severity)
            .max()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus::assess(self.highest_active_severity(), &self.status)
    }
}

/// Summary row for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub subject: String,
    pub health: HealthStatus,
    pub running: bool,
    pub paused: bool,
    pub interval_ms: u64,
    pub ticks: u64,
    pub samples: usize,
    pub capacity: usize,
    pub active_alerts: usize,
    pub last_tick_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// Shared tick state
// ---------------------------------------------------------------------------

struct SessionCore {
    store: SampleStore,
    engine: AlertEngine,
    source: Box<dyn SampleSource>,
    stats: TickStats,
    status: TickStatus,
}

struct SessionInner {
    subject: String,
    ratios: Vec<RatioConfig>,
    scores: Vec<ScoreConfig>,
    core: Mutex<SessionCore>,
    published: RwLock<Arc<SessionSnapshot>>,
}

impl SessionInner {
    fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// One produce -> append -> evaluate -> publish cycle.
    fn tick(&self) -> TickStatus {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let sample = core.source.produce_sample(core.store.last());
        let status = match Self::apply(core, sample) {
            Ok((timestamp, events)) => TickStatus::Applied {
                timestamp,
                events: events.len(),
            },
            Err(e) => {
                warn!("[{}] tick from '{}' rejected: {e}", self.subject, core.source.name());
                TickStatus::Degraded {
                    reason: e.to_string(),
                }
            }
        };
        core.status = status.clone();
        self.publish(core);
        status
    }

    fn apply(core: &mut SessionCore, sample: Sample) -> Result<(u64, Vec<AlertEvent>)> {
        core.stats.last_tick_at = Some(unix_ms_now());
        let timestamp = sample.timestamp();
        if let Err(e) = core.store.append(sample) {
            core.stats.rejected += 1;
            core.stats.last_error = Some(e.to_string());
            return Err(e);
        }
        let events = core
            .store
            .last()
            .map(|s| core.engine.evaluate(s))
            .unwrap_or_default();
        core.stats.applied += 1;
        Ok((timestamp, events))
    }

    fn publish(&self, core: &SessionCore) {
        let samples = core.store.snapshot();
        let mut metrics = derive(&samples, &self.ratios, &self.scores);
        metrics.capacity = core.store.capacity();
        let snapshot = SessionSnapshot {
            subject: self.subject.clone(),
            capacity: core.store.capacity(),
            samples,
            alerts: core.engine.alerts(true),
            metrics,
            status: core.status.clone(),
            stats: core.stats.clone(),
            published_at: unix_ms_now(),
        };
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }
}

// ---------------------------------------------------------------------------
// TelemetrySession
// ---------------------------------------------------------------------------

/// Bounded history, derived KPIs and alert lifecycle for one subject.
pub struct TelemetrySession {
    id: String,
    config: SessionConfig,
    inner: Arc<SessionInner>,
    scheduler: UpdateScheduler,
    schedule: Mutex<ScheduleConfig>,
}

impl TelemetrySession {
    /// Validate `config` and build an idle session. Nothing ticks until
    /// [`start`](Self::start) or [`refresh`](Self::refresh).
    pub fn new(config: SessionConfig, source: impl SampleSource + 'static) -> Result<Self> {
        config.validate()?;
        let store = SampleStore::with_schema(config.capacity, config.fields.iter().cloned())?;
        let engine = AlertEngine::new(
            config.subject.clone(),
            config.rules.clone(),
            &config.known_fields(),
        )?;

        let inner = Arc::new(SessionInner {
            subject: config.subject.clone(),
            ratios: config.ratios.clone(),
            scores: config.scores.clone(),
            core: Mutex::new(SessionCore {
                store,
                engine,
                source: Box::new(source),
                stats: TickStats::default(),
                status: TickStatus::Idle,
            }),
            published: RwLock::new(Arc::new(SessionSnapshot::empty(
                &config.subject,
                config.capacity,
            ))),
        });

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            scheduler: UpdateScheduler::new(format!("vigil-{}", config.subject)),
            schedule: Mutex::new(config.schedule),
            inner,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subject(&self) -> &str {
        &self.config.subject
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Launch the periodic scheduler with the current schedule.
    pub fn start(&self) -> Result<()> {
        // Schedule changes serialise with the start.
        let guard = self.lock_schedule();
        let schedule = *guard;
        let inner = Arc::clone(&self.inner);
        self.scheduler.start_with(
            move || {
                inner.tick();
            },
            schedule,
        )?;
        drop(guard);
        info!(
            "[{}] session started (interval {} ms, {})",
            self.subject(),
            schedule.interval_ms,
            if schedule.enabled { "enabled" } else { "paused" }
        );
        Ok(())
    }

    /// Tear the scheduler down. Collected state stays readable; the session
    /// cannot be restarted.
    pub fn stop(&self) -> Result<()> {
        self.scheduler.stop()?;
        info!("[{}] session stopped", self.subject());
        Ok(())
    }

    /// Run one tick now. Serialised with scheduled ticks.
    pub fn refresh(&self) -> TickStatus {
        self.inner.tick()
    }

    /// Push an externally produced sample through append, evaluate and publish.
    pub fn ingest(&self, sample: Sample) -> Result<Vec<AlertEvent>> {
        let mut core = self.inner.lock_core();
        let result = SessionInner::apply(&mut core, sample);
        core.status = match &result {
            Ok((timestamp, events)) => TickStatus::Applied {
                timestamp: *timestamp,
                events: events.len(),
            },
            Err(e) => TickStatus::Degraded {
                reason: e.to_string(),
            },
        };
        self.inner.publish(&core);
        result.map(|(_, events)| events)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.inner.snapshot()
    }

    pub fn current_metrics(&self) -> DerivedMetrics {
        self.snapshot().metrics.clone()
    }

    /// Ordered copy of the window, oldest first.
    pub fn history(&self) -> Vec<Sample> {
        self.snapshot().samples.clone()
    }

    pub fn alerts(&self, include_resolved: bool) -> Vec<Alert> {
        self.snapshot().alerts(include_resolved)
    }

    /// Operator resolution of an alert.
    pub fn resolve_alert(&self, id: AlertId) -> Result<Alert> {
        let mut core = self.inner.lock_core();
        let alert = core.engine.resolve(id, unix_ms_now())?;
        self.inner.publish(&core);
        Ok(alert)
    }

    /// Pause or resume scheduled ticks.
    pub fn set_schedule_enabled(&self, enabled: bool) -> Result<()> {
        let mut schedule = self.lock_schedule();
        if self.scheduler.is_closed() {
            return Err(VigilError::SchedulerClosed);
        }
        if self.scheduler.is_started() {
            if enabled {
                self.scheduler.resume()?;
            } else {
                self.scheduler.pause()?;
            }
        }
        schedule.enabled = enabled;
        drop(schedule);
        debug!("[{}] schedule enabled = {enabled}", self.subject());
        Ok(())
    }

    /// Change the tick interval; applies from the next scheduled wait.
    pub fn set_interval(&self, interval_ms: u64) -> Result<()> {
        let mut schedule = self.lock_schedule();
        let candidate = ScheduleConfig {
            interval_ms,
            ..*schedule
        };
        candidate.validate()?;
        if self.scheduler.is_closed() {
            return Err(VigilError::SchedulerClosed);
        }
        if self.scheduler.is_started() {
            self.scheduler.set_interval(interval_ms)?;
        }
        schedule.interval_ms = interval_ms;
        drop(schedule);
        debug!("[{}] interval set to {interval_ms} ms", self.subject());
        Ok(())
    }

    pub fn schedule(&self) -> ScheduleConfig {
        *self.lock_schedule()
    }

    /// Serialise the current snapshot.
    pub fn export_snapshot(&self, format: ExportFormat) -> Result<Vec<u8>> {
        export::export(&self.snapshot(), format)
    }

    /// Clear the sample window. Alert history and counters are kept.
    pub fn reset(&self) {
        let mut core = self.inner.lock_core();
        core.store.clear();
        core.status = TickStatus::Idle;
        self.inner.publish(&core);
        info!("[{}] window reset", self.subject());
    }

    pub fn health(&self) -> HealthStatus {
        self.snapshot().health()
    }

    pub fn stats(&self) -> TickStats {
        self.snapshot().stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// True once [`stop`](Self::stop) has run; the session is then read-only.
    pub fn is_stopped(&self) -> bool {
        self.scheduler.is_closed()
    }

    /// Ticks fired by the scheduler (manual refreshes excluded).
    pub fn scheduled_ticks(&self) -> u64 {
        self.scheduler.tick_count()
    }

    pub fn info(&self) -> SessionInfo {
        let snapshot = self.snapshot();
        let schedule = self.schedule();
        SessionInfo {
            id: self.id.clone(),
            subject: self.config.subject.clone(),
            health: snapshot.health(),
            running: self.scheduler.is_running(),
            paused: self.scheduler.is_started() && self.scheduler.is_paused(),
            interval_ms: schedule.interval_ms,
            ticks: snapshot.stats.applied + snapshot.stats.rejected,
            samples: snapshot.samples.len(),
            capacity: snapshot.capacity,
            active_alerts: snapshot.alerts.iter().filter(|a| !a.resolved).count(),
            last_tick_at: snapshot.stats.last_tick_at,
        }
    }

    fn lock_schedule(&self) -> MutexGuard<'_, ScheduleConfig> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TelemetrySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetrySession")
            .field("id", &self.id)
            .field("subject", &self.config.subject)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Comparator, ThresholdRule};
    use crate::source::FnSource;
    use std::thread;
    use std::time::Duration;

    /// Emits the given cpu values one per tick, 1 s apart, then repeats the last.
    fn scripted(values: Vec<f64>) -> impl SampleSource + 'static {
        let mut i = 0;
        FnSource::new("scripted", move |prev: Option<&Sample>| {
            let ts = prev.map_or(1_000, |p| p.timestamp() + 1_000);
            let v = values[i.min(values.len() - 1)];
            i += 1;
            Sample::new(ts).with("cpu", v)
        })
    }

    fn cpu_session(capacity: usize, auto_resolve: bool, values: Vec<f64>) -> TelemetrySession {
        let config = SessionConfig::new("host", ["cpu"])
            .with_capacity(capacity)
            .with_rule(
                ThresholdRule::new("cpu_high", "cpu", Comparator::Gt, 80.0, Severity::Warning)
                    .auto_resolve(auto_resolve),
            );
        TelemetrySession::new(config, scripted(values)).unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let s = cpu_session(3, true, vec![1.0]);
        assert!(!s.current_metrics().has_data());
        assert!(s.history().is_empty());
        assert!(s.alerts(true).is_empty());
        assert_eq!(s.health(), HealthStatus::Operational);
        assert_eq!(s.snapshot().status, TickStatus::Idle);
        assert!(!s.is_running());
        assert!(Uuid::parse_str(s.id()).is_ok());
    }

    #[test]
    fn test_invalid_rule_is_fatal() {
        let config = SessionConfig::new("host", ["cpu"]).with_rule(ThresholdRule::new(
            "lat",
            "latency",
            Comparator::Gt,
            20.0,
            Severity::Warning,
        ));
        let err = TelemetrySession::new(config, scripted(vec![1.0])).unwrap_err();
        assert!(matches!(err, VigilError::InvalidRule { .. }));
    }

    #[test]
    fn test_duplicate_rule_ids_fatal() {
        let rule = ThresholdRule::new("r", "cpu", Comparator::Gt, 1.0, Severity::Info);
        let config = SessionConfig::new("host", ["cpu"])
            .with_rule(rule.clone())
            .with_rule(rule);
        assert!(TelemetrySession::new(config, scripted(vec![1.0])).is_err());
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    #[test]
    fn test_refresh_appends_evaluates_publishes() {
        let s = cpu_session(3, true, vec![10.0, 20.0, 90.0]);
        for _ in 0..3 {
            assert!(matches!(s.refresh(), TickStatus::Applied { .. }));
        }
        let m = s.current_metrics();
        assert_eq!(m.average["cpu"], 40.0);
        assert_eq!(m.peak["cpu"], 90.0);
        assert_eq!(m.capacity, 3);
        let alerts = s.alerts(false);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].observed, 90.0);
        assert_eq!(s.health(), HealthStatus::Degraded);
        assert_eq!(s.stats().applied, 3);
    }

    #[test]
    fn test_rejected_sample_degrades_without_mutation() {
        let mut n = 0u64;
        let source = FnSource::new("flaky", move |_prev: Option<&Sample>| {
            n += 1;
            // Second sample goes back in time.
            let ts = if n == 2 { 500 } else { n * 1_000 };
            Sample::new(ts).with("cpu", 95.0)
        });
        let config = SessionConfig::new("host", ["cpu"]).with_rule(
            ThresholdRule::new("cpu_high", "cpu", Comparator::Gt, 80.0, Severity::Info),
        );
        let s = TelemetrySession::new(config, source).unwrap();

        assert!(matches!(s.refresh(), TickStatus::Applied { .. }));
        let before = s.alerts(true);

        let status = s.refresh();
        assert!(status.is_degraded());
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.alerts(true), before);
        assert_eq!(s.health(), HealthStatus::Degraded);
        let stats = s.stats();
        assert_eq!(stats.rejected, 1);
        assert!(stats.last_error.unwrap().contains("clock regression"));

        // The next tick proceeds normally.
        assert!(matches!(s.refresh(), TickStatus::Applied { .. }));
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.health(), HealthStatus::Operational);
    }

    #[test]
    fn test_schema_subset_is_degraded() {
        let source = FnSource::new("partial", |_prev: Option<&Sample>| {
            Sample::new(unix_ms_now()).with("cpu", 1.0)
        });
        let config = SessionConfig::new("host", ["cpu", "memory"]);
        let s = TelemetrySession::new(config, source).unwrap();
        assert!(s.refresh().is_degraded());
        assert!(s.history().is_empty());
    }

    #[test]
    fn test_ingest_returns_events_and_errors() {
        let s = cpu_session(3, true, vec![0.0]);
        let events = s.ingest(Sample::new(10).with("cpu", 99.0)).unwrap();
        assert!(matches!(events.as_slice(), [AlertEvent::Triggered(1)]));
        assert!(s.ingest(Sample::new(5).with("cpu", 1.0)).is_err());
        assert!(s.snapshot().status.is_degraded());
    }

    // -----------------------------------------------------------------------
    // Alerts
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_alert_and_not_found() {
        let s = cpu_session(3, false, vec![90.0, 10.0]);
        s.refresh();
        let id = s.alerts(false)[0].id;
        s.refresh();
        // Manual rule: still active after the value drops.
        assert_eq!(s.alerts(false).len(), 1);

        let resolved = s.resolve_alert(id).unwrap();
        assert!(resolved.resolved);
        assert!(s.alerts(false).is_empty());
        assert_eq!(s.alerts(true).len(), 1);

        let err = s.resolve_alert(999).unwrap_err();
        assert!(matches!(err, VigilError::NotFound { .. }));
    }

    #[test]
    fn test_critical_alert_means_outage() {
        let config = SessionConfig::new("host", ["cpu"]).with_rule(ThresholdRule::new(
            "cpu_critical",
            "cpu",
            Comparator::Ge,
            95.0,
            Severity::Critical,
        ));
        let s = TelemetrySession::new(config, scripted(vec![99.0])).unwrap();
        s.refresh();
        assert_eq!(s.health(), HealthStatus::Outage);
        assert_eq!(s.info().health, HealthStatus::Outage);
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    #[test]
    fn test_reset_clears_window_keeps_alerts() {
        let s = cpu_session(3, false, vec![90.0]);
        s.refresh();
        s.refresh();
        s.reset();
        assert!(s.history().is_empty());
        assert!(!s.current_metrics().has_data());
        assert_eq!(s.alerts(true).len(), 1);
        // Production resumes from the source's start after a reset.
        s.refresh();
        assert_eq!(s.history().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    #[test]
    fn test_scheduled_ticks_and_stop() {
        let s = cpu_session(50, true, vec![10.0]);
        s.set_interval(10).unwrap();
        s.start().unwrap();
        assert!(s.is_running());
        thread::sleep(Duration::from_millis(150));
        s.stop().unwrap();
        let n = s.history().len();
        assert!(n >= 3, "expected scheduled ticks, got {n}");
        thread::sleep(Duration::from_millis(50));
        assert_eq!(s.history().len(), n);
        assert!(matches!(s.stop(), Err(VigilError::SchedulerClosed)));
        assert!(matches!(s.set_interval(5), Err(VigilError::SchedulerClosed)));
        // Reads still work after stop.
        assert!(s.current_metrics().has_data());
    }

    #[test]
    fn test_schedule_disabled_pauses() {
        let s = cpu_session(50, true, vec![10.0]);
        s.set_interval(10).unwrap();
        s.set_schedule_enabled(false).unwrap();
        s.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        assert!(s.history().is_empty());
        assert!(s.info().paused);

        s.set_schedule_enabled(true).unwrap();
        assert!(s.schedule().enabled);
        thread::sleep(Duration::from_millis(100));
        assert!(!s.history().is_empty());
    }

    #[test]
    fn test_set_interval_zero_rejected() {
        let s = cpu_session(3, true, vec![1.0]);
        let err = s.set_interval(0).unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(s.schedule().interval_ms, 30_000);
    }

    #[test]
    fn test_pause_racing_start_is_never_lost() {
        for _ in 0..50 {
            let s = Arc::new(cpu_session(3, true, vec![1.0]));
            s.set_interval(5_000).unwrap();
            let pauser = {
                let s = Arc::clone(&s);
                thread::spawn(move || s.set_schedule_enabled(false).unwrap())
            };
            s.start().unwrap();
            pauser.join().unwrap();

            // Stored flag and scheduler state always agree.
            assert!(!s.schedule().enabled);
            assert!(s.info().paused);
            assert!(!s.is_running());
            s.stop().unwrap();
        }
    }

    #[test]
    fn test_start_twice_fails() {
        let s = cpu_session(3, true, vec![1.0]);
        s.start().unwrap();
        assert!(matches!(s.start(), Err(VigilError::AlreadyStarted)));
    }
}
