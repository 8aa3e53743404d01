//! `vigil watch`: run one session live and print each tick.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use vigil_core::{Alert, AlertId, SessionSnapshot, TickStatus};

const POLL: Duration = Duration::from_millis(50);

/// Options for the watch command.
pub struct WatchCommandConfig<'a> {
    pub profile: &'a str,
    pub config_path: Option<&'a Path>,
    pub subject: Option<&'a str>,
    pub interval: Option<Duration>,
    pub count: Option<u64>,
    pub seed: Option<u64>,
}

/// Run the watch command.
pub fn run(cfg: WatchCommandConfig<'_>) {
    let mut entry = super::resolve_entry(cfg.profile, cfg.config_path, cfg.subject)
        .unwrap_or_else(|e| super::exit_with(e));
    if cfg.seed.is_some() {
        entry.seed = cfg.seed;
    }
    if let Some(interval) = cfg.interval {
        entry.session.schedule.interval_ms =
            u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    }
    entry.session.schedule.enabled = true;

    let session = entry.build_session().unwrap_or_else(|e| super::exit_with(e));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    let schedule = session.schedule();
    println!("Watching '{}'", session.subject());
    println!("  Fields:    {}", session.config().fields.join(", "));
    println!("  Rules:     {}", session.config().rules.len());
    println!("  Capacity:  {}", session.config().capacity);
    println!("  Interval:  {}ms", schedule.interval_ms);
    match cfg.count {
        Some(n) => println!("  Ticks:     {n}"),
        None => println!("  Ticks:     until Ctrl+C"),
    }
    println!();

    if let Err(e) = session.start() {
        super::exit_with(e);
    }

    let mut seen = 0u64;
    let mut known: BTreeMap<AlertId, Alert> = BTreeMap::new();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(POLL);
        let snapshot = session.snapshot();
        let ticks = snapshot.stats.applied + snapshot.stats.rejected;
        if ticks == seen {
            continue;
        }
        seen = ticks;
        print_tick(ticks, &snapshot);
        for line in alert_transitions(&mut known, &snapshot.alerts) {
            println!("    {line}");
        }
        if cfg.count.is_some_and(|n| ticks >= n) {
            break;
        }
    }

    if let Err(e) = session.stop() {
        log::warn!("[{}] stop failed: {e}", session.subject());
    }

    let snapshot = session.snapshot();
    println!();
    println!(
        "Stopped after {} tick(s): {} applied, {} rejected, {} active alert(s), status {}",
        snapshot.stats.applied + snapshot.stats.rejected,
        snapshot.stats.applied,
        snapshot.stats.rejected,
        snapshot.alerts(false).len(),
        snapshot.health(),
    );
}

fn print_tick(n: u64, snapshot: &SessionSnapshot) {
    match &snapshot.status {
        TickStatus::Degraded { reason } => {
            println!("#{n:<5} rejected: {reason}");
        }
        _ => {
            let Some(last) = snapshot.samples.last() else {
                return;
            };
            let values: Vec<String> = last
                .fields()
                .iter()
                .map(|(k, v)| format!("{k}={v:.1}"))
                .collect();
            println!(
                "#{n:<5} {:<11} {}",
                snapshot.health().to_string(),
                values.join(" ")
            );
        }
    }
}

/// Diff the alert list against what was last printed.
fn alert_transitions(known: &mut BTreeMap<AlertId, Alert>, alerts: &[Alert]) -> Vec<String> {
    let mut lines = Vec::new();
    for alert in alerts {
        let line = match known.get(&alert.id) {
            None if alert.resolved => None,
            None => Some(format!(
                "+ [{}] {} (#{}): {}",
                alert.severity, alert.title, alert.id, alert.message
            )),
            Some(prev) if alert.resolved && !prev.resolved => Some(format!(
                "- [{}] {} (#{}) resolved by {}",
                alert.severity,
                alert.title,
                alert.id,
                alert.resolved_by.map_or("unknown".to_string(), |r| r.to_string())
            )),
            Some(prev) if !alert.resolved && prev.observed != alert.observed => Some(format!(
                "~ [{}] {} (#{}): observed {}",
                alert.severity, alert.title, alert.id, alert.observed
            )),
            Some(_) => None,
        };
        lines.extend(line);
        known.insert(alert.id, alert.clone());
    }
    lines
}
