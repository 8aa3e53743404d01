//! `vigil validate`: check a JSON config file before serving it.

use std::path::Path;

use vigil_core::load_config_from_path;

/// Run the validate command. Exits with status 1 when the file is invalid.
pub fn run(path: &Path) {
    let config = match load_config_from_path(path) {
        Ok(c) => c,
        Err(e) => super::exit_with(format!("{}: {e}", path.display())),
    };

    if config.sessions.is_empty() {
        println!("{}: valid, but defines no sessions", path.display());
        return;
    }

    println!("{}: {} session(s) OK", path.display(), config.sessions.len());
    for entry in &config.sessions {
        let s = &entry.session;
        println!(
            "  {:<20} capacity {:>4}  every {:>6}ms{}  fields {}  rules {}  ratios {}  scores {}",
            s.subject,
            s.capacity,
            s.schedule.interval_ms,
            if s.schedule.enabled { "" } else { " (paused)" },
            s.fields.len(),
            s.rules.len(),
            s.ratios.len(),
            s.scores.len(),
        );
    }
}
