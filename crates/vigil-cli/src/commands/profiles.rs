//! `vigil profiles`: list the built-in session profiles.

use vigil_core::{TelemetryConfig, profiles};

/// Run the profiles command.
pub fn run(json: bool) {
    let all = profiles::all();

    if json {
        let config = TelemetryConfig {
            sessions: all.into_iter().map(|p| p.entry).collect(),
        };
        match serde_json::to_string_pretty(&config) {
            Ok(s) => println!("{s}"),
            Err(e) => super::exit_with(e),
        }
        return;
    }

    println!(
        "{:<16} {:>9} {:>8} {:>7} {:>6}  Description",
        "Profile", "Interval", "Capacity", "Fields", "Rules"
    );
    println!("{}", "-".repeat(80));
    for profile in &all {
        let session = &profile.entry.session;
        println!(
            "{:<16} {:>8}s {:>8} {:>7} {:>6}  {}",
            profile.name,
            session.schedule.interval_ms / 1000,
            session.capacity,
            session.fields.len(),
            session.rules.len(),
            profile.description,
        );
    }
    println!();
    println!("Run one live:        vigil watch --profile <name>");
    println!("Start from a config: vigil profiles --json > vigil.json");
}
