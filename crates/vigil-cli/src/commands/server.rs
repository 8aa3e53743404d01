//! `vigil server`: serve every configured session over HTTP.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vigil_core::{SessionRegistry, TelemetryConfig, load_config_from_path, profiles};

/// Run the server command.
pub fn run(host: &str, port: u16, config_path: Option<&Path>, interval: Option<Duration>) {
    let mut config = match config_path {
        Some(path) => load_config_from_path(path)
            .unwrap_or_else(|e| super::exit_with(format!("{}: {e}", path.display()))),
        None => TelemetryConfig {
            sessions: profiles::all().into_iter().map(|p| p.entry).collect(),
        },
    };
    if let Some(interval) = interval {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        for entry in &mut config.sessions {
            entry.session.schedule.interval_ms = ms;
        }
    }

    let registry = Arc::new(
        SessionRegistry::from_config(&config).unwrap_or_else(|e| super::exit_with(e)),
    );
    if registry.is_empty() {
        super::exit_with("no sessions to serve");
    }

    let base = format!("http://{host}:{port}");
    println!("Vigil Server v{}", vigil_core::VERSION);
    println!("   {base}");
    println!();
    println!("   Sessions:");
    for info in registry.list() {
        println!(
            "     {:<20} every {}ms, window {}",
            info.subject, info.interval_ms, info.capacity
        );
    }
    println!();
    println!("   Endpoints:");
    println!("     GET  /                                   API index");
    println!("     GET  /health                             Overall status");
    println!("     GET  /sessions                           Session list");
    println!("     GET  /sessions/{{subject}}/metrics         Derived KPIs");
    println!("     GET  /sessions/{{subject}}/history         Sample window");
    println!("     GET  /sessions/{{subject}}/alerts          ?include_resolved=true");
    println!("     POST /sessions/{{subject}}/alerts/{{id}}/resolve");
    println!("     GET  /sessions/{{subject}}/schedule        Interval and pause state");
    println!("     POST /sessions/{{subject}}/schedule        {{\"enabled\":false}} / {{\"interval_ms\":5000}}");
    println!("     POST /sessions/{{subject}}/refresh         Tick now");
    println!("     GET  /sessions/{{subject}}/export          ?format=json|csv");
    println!();

    if let Err(e) = registry.start_all() {
        super::exit_with(e);
    }

    let r = Arc::clone(&registry);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("shutting down");
        r.stop_all();
        std::process::exit(0);
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| super::exit_with(e));
    let result = rt.block_on(vigil_server::run_server(Arc::clone(&registry), host, port));
    registry.stop_all();
    if let Err(e) = result {
        super::exit_with(format!("server on {host}:{port} failed: {e}"));
    }
}
