//! Session liveness tracking with a sliding idle timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{SharedClock, SystemClock, deadline};
use crate::config::{FirstContactPolicy, SessionConfig};
use crate::error::Result;
use crate::reaper::{Reaper, Sweep};

/// Expiry table shared between the store handle and the reaper.
#[derive(Debug)]
struct SessionTable {
    /// Absolute expiry per user id.
    expiries: Mutex<HashMap<String, Instant>>,

    config: SessionConfig,

    clock: SharedClock,
}

impl SessionTable {
    fn check(&self, user_id: &str) -> bool {
        let now = self.clock.now();
        let mut expiries = self.expiries.lock();

        match expiries.get(user_id).map(|expires_at| *expires_at > now) {
            Some(true) => {
                expiries.insert(user_id.to_string(), deadline(now, self.config.timeout));
                trace!(user_id = %user_id, "Session extended");
                return true;
            }
            Some(false) => {
                expiries.remove(user_id);
                debug!(user_id = %user_id, "Session expired");
            }
            None => {}
        }

        match self.config.first_contact {
            FirstContactPolicy::Admit => {
                expiries.insert(user_id.to_string(), deadline(now, self.config.timeout));
                debug!(
                    user_id = %user_id,
                    active = expiries.len(),
                    "Session created on first contact"
                );
                true
            }
            FirstContactPolicy::Reject => {
                debug!(user_id = %user_id, "No live session, login required");
                false
            }
        }
    }

    fn open(&self, user_id: &str) {
        let now = self.clock.now();
        let mut expiries = self.expiries.lock();
        expiries.insert(user_id.to_string(), deadline(now, self.config.timeout));
        debug!(user_id = %user_id, active = expiries.len(), "Session opened");
    }

    fn remaining(&self, user_id: &str) -> Option<Duration> {
        let now = self.clock.now();
        let expiries = self.expiries.lock();
        expiries
            .get(user_id)
            .filter(|expires_at| **expires_at > now)
            .map(|expires_at| *expires_at - now)
    }
}

impl Sweep for SessionTable {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut expiries = self.expiries.lock();
        let before = expiries.len();
        expiries.retain(|_, expires_at| *expires_at > now);
        Ok(before - expiries.len())
    }
}

/// Per-user session store with a sliding idle timeout.
///
/// A session is live while its expiry lies strictly in the future. Every
/// successful [`check_session`](SessionStore::check_session) pushes the
/// expiry out to `now + timeout`; the read-extend-write happens under a
/// single lock so concurrent checks for one user cannot clobber each other.
///
/// Cloning is cheap and every clone sees the same sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    table: Arc<SessionTable>,

    /// Reaper started lazily on first use.
    reaper: Option<Arc<Reaper>>,
}

impl SessionStore {
    /// Create a store using the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(config: SessionConfig, clock: SharedClock) -> Self {
        Self {
            table: Arc::new(SessionTable {
                expiries: Mutex::new(HashMap::new()),
                config,
                clock,
            }),
            reaper: None,
        }
    }

    /// Start `reaper` the first time this store is used.
    pub fn with_reaper(mut self, reaper: Arc<Reaper>) -> Self {
        self.reaper = Some(reaper);
        self
    }

    /// Get the store configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.table.config
    }

    /// Check whether `user_id` has a live session, extending it if so.
    ///
    /// An expired entry is removed. A user without a live entry is then
    /// handled by the [`FirstContactPolicy`]: `Admit` creates a fresh
    /// session and returns `true`, `Reject` returns `false`.
    pub fn check_session(&self, user_id: &str) -> bool {
        self.start_reaper();
        self.table.check(user_id)
    }

    /// Explicitly log a user in, creating or refreshing their session.
    pub fn open_session(&self, user_id: &str) {
        self.start_reaper();
        self.table.open(user_id);
    }

    /// Remove a user's session. Does nothing if there is none.
    pub fn clear_session(&self, user_id: &str) {
        if self.table.expiries.lock().remove(user_id).is_some() {
            debug!(user_id = %user_id, "Session cleared");
        }
    }

    /// Time left on a live session, without extending it.
    pub fn remaining(&self, user_id: &str) -> Option<Duration> {
        self.table.remaining(user_id)
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn active_session_count(&self) -> usize {
        self.table.expiries.lock().len()
    }

    /// Remove every expired entry now and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        // In-memory sweep cannot fail.
        self.table.sweep_expired().unwrap_or(0)
    }

    /// Sweep target for a [`Reaper`].
    ///
    /// The target shares this store's sessions but not its reaper handle.
    pub fn sweep_target(&self) -> Arc<dyn Sweep> {
        Arc::clone(&self.table) as Arc<dyn Sweep>
    }

    fn start_reaper(&self) {
        if let Some(reaper) = &self.reaper {
            reaper.ensure_started();
        }
    }
}
