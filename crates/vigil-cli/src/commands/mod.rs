pub mod export;
pub mod profiles;
pub mod server;
pub mod validate;
pub mod watch;

use std::path::Path;
use std::time::Duration;

use vigil_core::{SessionEntry, load_config_from_path};

/// Parse a human duration: "250ms", "5s", "2m", "1h". A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    let millis = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{s}' is too large"))?;
    if millis == 0 {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(Duration::from_millis(millis))
}

/// Resolve a session entry from a built-in profile or a config file.
pub fn resolve_entry(
    profile: &str,
    config_path: Option<&Path>,
    subject: Option<&str>,
) -> Result<SessionEntry, String> {
    let Some(path) = config_path else {
        return vigil_core::profiles::get(profile)
            .map(|p| p.entry)
            .ok_or_else(|| {
                format!(
                    "unknown profile '{profile}' (available: {})",
                    vigil_core::profiles::names().join(", ")
                )
            });
    };

    let config = load_config_from_path(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut sessions = config.sessions.into_iter();
    match subject {
        Some(subject) => sessions
            .find(|e| e.session.subject == subject)
            .ok_or_else(|| format!("no session '{subject}' in {}", path.display())),
        None => sessions
            .next()
            .ok_or_else(|| format!("{} defines no sessions", path.display())),
    }
}

/// Print an error and exit with status 1.
pub fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}
