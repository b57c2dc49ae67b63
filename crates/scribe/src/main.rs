//! Scribe - session and settings services for the transcription backend
//!
//! Main entry point for the Scribe CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{config, serve, settings};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Scribe - session and settings services for the transcription backend
#[derive(Parser)]
#[command(name = "scribe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of discovering scribe.toml / config.toml
    #[arg(long, global = true, env = "SCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Host the session and settings services until interrupted
    Serve(serve::ServeArgs),

    /// Read and write user settings through the cache
    Settings(settings::SettingsArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => scribe_config::load_explicit(path)?,
        None => scribe_config::load_config(None)?,
    };

    let _guard = init_tracing(&loaded.config.logging(), cli.verbose);

    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    let ctx = commands::Context {
        sources: loaded
            .loaded_from()
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        config: loaded.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Settings(args) => settings::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx),
    }
}

/// Initialize tracing: console (human-readable, stderr) plus an optional
/// daily-rotating JSON file. `RUST_LOG` overrides the console filter.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(logging: &scribe_config::LoggingSection, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let level = if verbose { "debug" } else { logging.level.as_str() };
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "scribe={level},scribe_session={level},scribe_config={level},warn"
        ))
    });

    let (file_layer, guard) = if logging.json_file {
        let log_dir = logging
            .log_dir
            .clone()
            .or_else(|| scribe_config::config_dir().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "scribe.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new(
                "scribe=trace,scribe_session=trace,scribe_config=trace,info",
            ));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
