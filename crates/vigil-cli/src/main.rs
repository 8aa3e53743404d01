//! CLI for vigil: rolling telemetry, derived KPIs and threshold alerts.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use vigil_core::ExportFormat;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "vigil: rolling telemetry, derived KPIs and threshold alerts")]
#[command(version = vigil_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in session profiles
    Profiles {
        /// Print the profiles as a JSON config instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run one session live and print every tick and alert transition
    Watch {
        /// Built-in profile to run (activity, system-metrics, system-health)
        #[arg(long, default_value = "system-health", conflicts_with = "config")]
        profile: String,

        /// JSON config file; use --subject to pick a session from it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session subject inside --config (default: the first one)
        #[arg(long, requires = "config")]
        subject: Option<String>,

        /// Override the update interval (e.g. "500ms", "5s", "1m")
        #[arg(long, value_parser = commands::parse_duration)]
        interval: Option<Duration>,

        /// Stop after this many ticks; default: until Ctrl+C
        #[arg(long)]
        count: Option<u64>,

        /// Seed the simulated source for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a profile for a number of ticks and export the window
    Export {
        /// Built-in profile to run
        #[arg(long, default_value = "system-health")]
        profile: String,

        /// Ticks to collect before exporting
        #[arg(long, default_value = "30")]
        ticks: usize,

        /// Output format: json or csv
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Seed the simulated source for a reproducible export
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check a JSON config file and summarise its sessions
    Validate {
        /// Path to the config file
        path: PathBuf,
    },

    /// Run the HTTP telemetry server
    Server {
        /// Port to listen on
        #[arg(long, default_value = "8042")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// JSON config file (default: every built-in profile)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override every session's update interval (e.g. "5s")
        #[arg(long, value_parser = commands::parse_duration)]
        interval: Option<Duration>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Profiles { json } => commands::profiles::run(json),
        Commands::Watch {
            profile,
            config,
            subject,
            interval,
            count,
            seed,
        } => commands::watch::run(commands::watch::WatchCommandConfig {
            profile: &profile,
            config_path: config.as_deref(),
            subject: subject.as_deref(),
            interval,
            count,
            seed,
        }),
        Commands::Export {
            profile,
            ticks,
            format,
            output,
            seed,
        } => commands::export::run(&profile, ticks, format, output.as_deref(), seed),
        Commands::Validate { path } => commands::validate::run(&path),
        Commands::Server {
            port,
            host,
            config,
            interval,
        } => commands::server::run(&host, port, config.as_deref(), interval),
    }
}
