//! Process-wide session and settings services.
//!
//! Build one [`SessionServices`] at startup and hand clones to whatever
//! needs sessions or settings. All clones share the same stores and reaper.

use std::sync::Arc;

use tracing::info;

use crate::cache::SettingsCache;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{ReaperMode, ServicesConfig};
use crate::persistence::SettingsStore;
use crate::reaper::{Reaper, SweepReport};
use crate::session::SessionStore;

/// Session store, settings cache and their shared reaper.
pub struct SessionServices<S: SettingsStore> {
    sessions: SessionStore,
    settings: SettingsCache<S>,
    reaper: Option<Arc<Reaper>>,
}

impl<S: SettingsStore> SessionServices<S> {
    /// Build the services over `store` using the system clock.
    ///
    /// With [`ReaperMode::Eager`] this must be called inside a Tokio runtime
    /// for the reaper to start; otherwise it starts on the first session check.
    pub fn new(config: ServicesConfig, store: S) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Build the services with an explicit clock.
    pub fn with_clock(config: ServicesConfig, store: S, clock: SharedClock) -> Self {
        let sessions = SessionStore::with_clock(config.session, Arc::clone(&clock));
        let settings = SettingsCache::with_clock(config.settings, store, clock);

        let reaper = match config.reaper.mode {
            ReaperMode::Disabled => None,
            ReaperMode::Lazy | ReaperMode::Eager => Some(Arc::new(
                Reaper::new(config.reaper.interval)
                    .with_target(sessions.sweep_target())
                    .with_target(settings.sweep_target()),
            )),
        };

        let sessions = match &reaper {
            Some(reaper) => sessions.with_reaper(Arc::clone(reaper)),
            None => sessions,
        };

        if config.reaper.mode == ReaperMode::Eager
            && let Some(reaper) = &reaper
        {
            reaper.ensure_started();
        }

        info!(
            session_timeout_secs = sessions.config().timeout.as_secs(),
            settings_ttl_secs = settings.config().ttl.as_secs(),
            reaper = ?config.reaper.mode,
            "Session services ready"
        );

        Self {
            sessions,
            settings,
            reaper,
        }
    }

    /// The session store.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The settings cache.
    pub fn settings(&self) -> &SettingsCache<S> {
        &self.settings
    }

    /// The reaper, unless disabled.
    pub fn reaper(&self) -> Option<&Arc<Reaper>> {
        self.reaper.as_ref()
    }

    /// Sweep both stores immediately, regardless of reaper mode.
    pub fn sweep_now(&self) -> SweepReport {
        match &self.reaper {
            Some(reaper) => reaper.run_once(),
            None => Reaper::new(std::time::Duration::from_secs(1))
                .with_target(self.sessions.sweep_target())
                .with_target(self.settings.sweep_target())
                .run_once(),
        }
    }

    /// Stop the background reaper, if running.
    pub fn shutdown(&self) {
        if let Some(reaper) = &self.reaper {
            reaper.shutdown();
        }
    }
}

impl<S: SettingsStore> Clone for SessionServices<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            settings: self.settings.clone(),
            reaper: self.reaper.clone(),
        }
    }
}
