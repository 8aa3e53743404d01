//! `vigil export`: collect a window of samples and write it out.

use std::path::Path;

use vigil_core::{ExportFormat, SessionEntry, TickStatus};

/// Run the export command.
pub fn run(
    profile: &str,
    ticks: usize,
    format: ExportFormat,
    output: Option<&Path>,
    seed: Option<u64>,
) {
    let entry = super::resolve_entry(profile, None, None).unwrap_or_else(|e| super::exit_with(e));
    let bytes = collect(entry, ticks, format, seed).unwrap_or_else(|e| super::exit_with(e));

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &bytes) {
                super::exit_with(format!("failed to write {}: {e}", path.display()));
            }
            eprintln!(
                "Wrote {} bytes of {format} to {}",
                bytes.len(),
                path.display()
            );
        }
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&bytes).and_then(|()| stdout.flush()) {
                super::exit_with(e);
            }
        }
    }
}

/// Drive `ticks` synchronous refreshes and export the resulting window.
fn collect(
    mut entry: SessionEntry,
    ticks: usize,
    format: ExportFormat,
    seed: Option<u64>,
) -> vigil_core::Result<Vec<u8>> {
    if seed.is_some() {
        entry.seed = seed;
    }
    let session = entry.build_session()?;
    for _ in 0..ticks {
        if let TickStatus::Degraded { reason } = session.refresh() {
            log::warn!("[{}] tick rejected: {reason}", session.subject());
        }
    }
    session.export_snapshot(format)
}
