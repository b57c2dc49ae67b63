//! Serve command - hosts the session and settings services.
//!
//! This is the embedding point for a request layer: it builds one
//! [`SessionServices`] for the process, starts the reaper, and reports
//! store activity until interrupted.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use scribe_session::{ReaperMode, SessionServices};
use tracing::info;

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Seconds between activity reports
    #[arg(long, default_value_t = 60)]
    pub report_interval: u64,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.services_config();
    // Nothing else will trigger a lazy start in a standalone host.
    if config.reaper.mode == ReaperMode::Lazy {
        config.reaper.mode = ReaperMode::Eager;
    }

    let store = ctx.settings_store();
    info!(settings_dir = %store.root().display(), "Starting session services");
    let services = SessionServices::new(config, store);

    let mut report = tokio::time::interval(Duration::from_secs(args.report_interval.max(1)));
    report.tick().await;

    loop {
        tokio::select! {
            _ = report.tick() => {
                let stats = services.settings().stats();
                info!(
                    sessions = services.sessions().active_session_count(),
                    cached_settings = stats.size,
                    hits = stats.hits,
                    misses = stats.misses,
                    "Session services activity"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    services.shutdown();
    info!("Session services stopped");
    Ok(())
}
