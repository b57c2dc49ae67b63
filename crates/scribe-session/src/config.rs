//! Configuration for the session store, settings cache and reaper.

use std::time::Duration;

/// Default idle timeout for sessions (25 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(25 * 60);

/// Default time a cached settings document may be served without
/// reconsulting durable storage.
pub const DEFAULT_SETTINGS_TTL: Duration = Duration::from_secs(10 * 60);

/// Default maximum number of cached settings documents.
pub const DEFAULT_MAX_SETTINGS_ENTRIES: usize = 10_000;

/// Default interval between reaper sweeps.
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// How the session store treats a user with no live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstContactPolicy {
    /// Create a session on first contact (implicit login).
    #[default]
    Admit,
    /// Report the session as invalid until `open_session` is called.
    Reject,
}

/// When the background reaper is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReaperMode {
    /// Started by the first session check.
    #[default]
    Lazy,
    /// Started when the services are built.
    Eager,
    /// Never started; expiry is only enforced on access.
    Disabled,
}

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sliding idle timeout applied on every successful check.
    pub timeout: Duration,

    /// Behavior for users without a live session.
    pub first_contact: FirstContactPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            first_contact: FirstContactPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the first-contact policy.
    pub fn with_first_contact(mut self, policy: FirstContactPolicy) -> Self {
        self.first_contact = policy;
        self
    }
}

/// Configuration for the settings cache.
#[derive(Debug, Clone)]
pub struct SettingsCacheConfig {
    /// How long a cached document stays authoritative.
    pub ttl: Duration,

    /// Maximum number of cached documents before LRU eviction.
    pub max_entries: usize,
}

impl Default for SettingsCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SETTINGS_TTL,
            max_entries: DEFAULT_MAX_SETTINGS_ENTRIES,
        }
    }
}

impl SettingsCacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of cached documents.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

/// Configuration for the background reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// When the reaper starts.
    pub mode: ReaperMode,

    /// Interval between sweeps.
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            mode: ReaperMode::default(),
            interval: DEFAULT_REAPER_INTERVAL,
        }
    }
}

impl ReaperConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start mode.
    pub fn with_mode(mut self, mode: ReaperMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Combined configuration used to build [`SessionServices`](crate::SessionServices).
#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    pub session: SessionConfig,
    pub settings: SettingsCacheConfig,
    pub reaper: ReaperConfig,
}

impl ServicesConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session store configuration.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Replace the settings cache configuration.
    pub fn with_settings(mut self, settings: SettingsCacheConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the reaper configuration.
    pub fn with_reaper(mut self, reaper: ReaperConfig) -> Self {
        self.reaper = reaper;
        self
    }
}
