//! Basic telemetry session example.
//!
//! Runs the built-in system-health profile for a few ticks, then prints the
//! derived KPIs and any open alerts.
//!
//! Run: `cargo run --example basic`

use vigil_core::{VigilError, profiles};

fn main() -> Result<(), VigilError> {
    let profile = profiles::get(profiles::SYSTEM_HEALTH).ok_or(VigilError::NotFound {
        kind: "profile",
        id: profiles::SYSTEM_HEALTH.to_string(),
    })?;
    let session = profile.entry.build_session()?;

    // Drive ticks by hand instead of waiting for the 30 s scheduler.
    for _ in 0..10 {
        session.refresh();
    }

    let metrics = session.current_metrics();
    println!("Samples in window: {}/{}", metrics.sample_count, metrics.capacity);
    for (field, avg) in &metrics.average {
        let peak = metrics.peak.get(field).copied().unwrap_or_default();
        println!("  {field:<20} avg {avg:>10.2}   peak {peak:>10.2}");
    }
    for (name, score) in &metrics.scores {
        println!("Score {name}: {score:.1}");
    }

    let alerts = session.alerts(false);
    if alerts.is_empty() {
        println!("No active alerts");
    }
    for alert in alerts {
        println!("[{}] #{} {}: {}", alert.severity, alert.id, alert.title, alert.message);
    }
    println!("Health: {}", session.health());
    Ok(())
}
