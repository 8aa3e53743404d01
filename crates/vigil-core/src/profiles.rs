//! Built-in session profiles for the three operations screens.
//!
//! Each profile pairs a [`SessionConfig`] with random-walk bounds that keep the
//! simulated values inside realistic operating ranges.

use std::collections::BTreeMap;

use crate::alert::{Comparator, Severity, ThresholdRule};
use crate::config::{SessionConfig, SessionEntry};
use crate::metrics::{RatioConfig, ScoreComponent, ScoreConfig};
use crate::source::FieldWalk;

pub const ACTIVITY: &str = "activity";
pub const SYSTEM_METRICS: &str = "system-metrics";
pub const SYSTEM_HEALTH: &str = "system-health";

/// A named, ready-to-run session definition.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: &'static str,
    pub description: &'static str,
    pub entry: SessionEntry,
}

/// Names of all built-in profiles.
pub fn names() -> [&'static str; 3] {
    [ACTIVITY, SYSTEM_METRICS, SYSTEM_HEALTH]
}

pub fn all() -> Vec<Profile> {
    names().into_iter().filter_map(get).collect()
}

/// Look up a profile by name (case-insensitive, `_` accepted for `-`).
pub fn get(name: &str) -> Option<Profile> {
    let key = name.trim().to_ascii_lowercase().replace('_', "-");
    match key.as_str() {
        ACTIVITY => Some(activity()),
        SYSTEM_METRICS => Some(system_metrics()),
        SYSTEM_HEALTH => Some(system_health()),
        _ => None,
    }
}

fn entry(session: SessionConfig, simulate: Vec<(&str, FieldWalk)>) -> SessionEntry {
    SessionEntry {
        session,
        simulate: simulate
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
        seed: None,
    }
}

fn field_names(simulate: &[(&str, FieldWalk)]) -> Vec<String> {
    simulate.iter().map(|(k, _)| k.to_string()).collect()
}

/// Event feed: per-interval event, warning and error counts.
fn activity() -> Profile {
    let simulate = vec![
        ("events", FieldWalk::gauge(10.0, 4.0, 0.0, 30.0)),
        ("warnings", FieldWalk::gauge(1.0, 1.0, 0.0, 6.0)),
        ("errors", FieldWalk::gauge(0.0, 1.0, 0.0, 5.0)),
        ("total_users", FieldWalk::counter(1247.0, 3.0)),
    ];
    let session = SessionConfig::new(ACTIVITY, field_names(&simulate))
        .with_capacity(50)
        .with_interval_ms(45_000)
        .with_rule(
            ThresholdRule::new("error_spike", "errors", Comparator::Ge, 3.0, Severity::Error)
                .with_title("Error events spiking")
                .with_description("{observed} error events this interval (limit {limit})"),
        )
        .with_rule(
            ThresholdRule::new("warning_burst", "warnings", Comparator::Gt, 4.0, Severity::Warning)
                .with_title("Warning burst")
                .auto_resolve(true),
        )
        .with_ratio(RatioConfig::new("error_share", "errors", "events"))
        .with_ratio(RatioConfig::new("warning_share", "warnings", "events"));
    Profile {
        name: ACTIVITY,
        description: "Activity feed: event volume with warning and error counts",
        entry: entry(session, simulate),
    }
}

/// Platform KPIs: users, revenue, requests, uptime, latency, error rate.
fn system_metrics() -> Profile {
    let simulate = vec![
        ("total_users", FieldWalk::counter(1247.0, 3.0)),
        ("active_users", FieldWalk::gauge(342.0, 10.0, 320.0, 400.0)),
        ("total_revenue", FieldWalk::counter(45_230.0, 500.0)),
        ("api_requests", FieldWalk::counter(156_000.0, 2000.0)),
        ("uptime", FieldWalk::gauge(99.8, 0.05, 99.5, 100.0)),
        ("avg_response_time", FieldWalk::gauge(89.0, 5.0, 70.0, 120.0)),
        ("error_rate", FieldWalk::gauge(0.03, 0.01, 0.01, 0.1)),
    ];
    let session = SessionConfig::new(SYSTEM_METRICS, field_names(&simulate))
        .with_capacity(30)
        .with_interval_ms(30_000)
        .with_rule(
            ThresholdRule::new(
                "response_slow",
                "avg_response_time",
                Comparator::Gt,
                110.0,
                Severity::Warning,
            )
            .with_title("Slow responses")
            .with_description("Average response time {observed} ms exceeds {limit} ms")
            .auto_resolve(true),
        )
        .with_rule(
            ThresholdRule::new(
                "error_rate_high",
                "error_rate",
                Comparator::Ge,
                0.08,
                Severity::Error,
            )
            .with_title("Elevated error rate")
            .auto_resolve(true),
        )
        .with_rule(
            ThresholdRule::new("uptime_low", "uptime", Comparator::Lt, 99.6, Severity::Critical)
                .with_title("Uptime below SLA")
                .with_description("Uptime {observed}% is under the {limit}% target"),
        )
        .with_ratio(RatioConfig::new("active_user_share", "active_users", "total_users"))
        .with_score(ScoreConfig::new(
            "performance",
            vec![
                ScoreComponent::new("avg_response_time", 2.0, 70.0, 120.0).inverted(),
                ScoreComponent::new("error_rate", 2.0, 0.01, 0.1).inverted(),
                ScoreComponent::new("uptime", 1.0, 99.5, 100.0),
            ],
        ));
    Profile {
        name: SYSTEM_METRICS,
        description: "System metrics: users, revenue, API volume, uptime and latency",
        entry: entry(session, simulate),
    }
}

/// Infrastructure health: cpu, memory, disk and network.
fn system_health() -> Profile {
    let simulate = vec![
        ("cpu_usage", FieldWalk::gauge(45.0, 5.0, 20.0, 80.0)),
        ("cpu_temperature", FieldWalk::gauge(65.0, 2.0, 50.0, 85.0)),
        ("memory_usage", FieldWalk::gauge(68.0, 3.0, 50.0, 85.0)),
        ("memory_available", FieldWalk::gauge(10.2, 1.0, 8.0, 15.0)),
        ("disk_usage", FieldWalk::gauge(42.0, 1.0, 35.0, 55.0)),
        ("disk_available", FieldWalk::gauge(580.0, 10.0, 500.0, 700.0)),
        ("network_latency", FieldWalk::gauge(12.0, 2.0, 8.0, 25.0)),
        ("network_throughput", FieldWalk::gauge(850.0, 50.0, 700.0, 1000.0)),
        ("network_packets", FieldWalk::counter(1_250_000.0, 10_000.0)),
    ];
    let usage_rule = |id: &str, field: &str, limit: f64, title: &str| {
        ThresholdRule::new(id, field, Comparator::Gt, limit, Severity::Warning)
            .with_title(title)
            .with_description("{field} at {observed}% (limit {limit}%)")
            .auto_resolve(true)
    };
    let session = SessionConfig::new(SYSTEM_HEALTH, field_names(&simulate))
        .with_capacity(30)
        .with_interval_ms(30_000)
        .with_rule(usage_rule("cpu_high", "cpu_usage", 75.0, "High CPU usage"))
        .with_rule(usage_rule("memory_high", "memory_usage", 80.0, "High memory usage"))
        .with_rule(usage_rule("disk_high", "disk_usage", 50.0, "Disk filling up"))
        .with_rule(
            ThresholdRule::new(
                "cpu_overheat",
                "cpu_temperature",
                Comparator::Ge,
                80.0,
                Severity::Critical,
            )
            .with_title("CPU overheating")
            .with_description("CPU temperature {observed}°C reached {limit}°C"),
        )
        .with_rule(
            ThresholdRule::new(
                "latency_high",
                "network_latency",
                Comparator::Gt,
                20.0,
                Severity::Warning,
            )
            .with_title("Network latency")
            .auto_resolve(true),
        )
        .with_score(ScoreConfig::new(
            "resources",
            vec![
                ScoreComponent::new("cpu_usage", 1.0, 0.0, 100.0).inverted(),
                ScoreComponent::new("memory_usage", 1.0, 0.0, 100.0).inverted(),
                ScoreComponent::new("disk_usage", 1.0, 0.0, 100.0).inverted(),
                ScoreComponent::new("network_latency", 1.0, 0.0, 50.0).inverted(),
            ],
        ));
    Profile {
        name: SYSTEM_HEALTH,
        description: "System health: cpu, memory, disk and network infrastructure",
        entry: entry(session, simulate),
    }
}
