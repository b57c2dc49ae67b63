//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]     # idle timeout and first-contact policy
//! [settings]    # settings cache TTL and capacity
//! [reaper]      # background sweep mode and interval
//! [storage]     # durable settings location
//! [logging]     # log level and file output
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Longest accepted timeout, TTL or interval: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Check a duration in seconds is within `1..=MAX_DURATION_SECS`.
fn check_duration(field: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(ConfigError::invalid(field, "must be > 0"));
    }
    if secs > MAX_DURATION_SECS {
        return Err(ConfigError::invalid(
            field,
            &format!("must be at most {MAX_DURATION_SECS} (one year)"),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Accessors return section defaults
/// for anything not configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    /// Session store configuration.
    pub session: Option<SessionSection>,

    /// Settings cache configuration.
    pub settings: Option<SettingsSection>,

    /// Background reaper configuration.
    pub reaper: Option<ReaperSection>,

    /// Durable storage configuration.
    pub storage: Option<StorageSection>,

    /// Logging configuration.
    pub logging: Option<LoggingSection>,
}

impl ScribeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale, not merged field by field.
    pub fn merge(&mut self, other: ScribeConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.settings.is_some() {
            self.settings = other.settings;
        }

        if other.reaper.is_some() {
            self.reaper = other.reaper;
        }

        if other.storage.is_some() {
            self.storage = other.storage;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// A copy of this config with every section filled in.
    pub fn resolved(&self) -> Self {
        Self {
            session: Some(self.session()),
            settings: Some(self.settings()),
            reaper: Some(self.reaper()),
            storage: Some(StorageSection {
                settings_dir: Some(self.storage().settings_dir()),
            }),
            logging: Some(self.logging()),
        }
    }

    /// Session section, or defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// Settings cache section, or defaults.
    pub fn settings(&self) -> SettingsSection {
        self.settings.clone().unwrap_or_default()
    }

    /// Reaper section, or defaults.
    pub fn reaper(&self) -> ReaperSection {
        self.reaper.clone().unwrap_or_default()
    }

    /// Storage section, or defaults.
    pub fn storage(&self) -> StorageSection {
        self.storage.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        check_duration("session.timeout_secs", self.session().timeout_secs)?;

        let settings = self.settings();
        check_duration("settings.ttl_secs", settings.ttl_secs)?;
        if settings.max_entries == 0 {
            return Err(ConfigError::invalid("settings.max_entries", "must be > 0"));
        }

        check_duration("reaper.interval_secs", self.reaper().interval_secs)?;

        if self.logging().level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How users without a live session are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstContact {
    /// Create a session on first contact.
    #[default]
    Admit,
    /// Require an explicit login.
    Reject,
}

/// Session store configuration.
///
/// ```toml
/// [session]
/// timeout_secs = 1500
/// first_contact = "admit"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Sliding idle timeout in seconds.
    pub timeout_secs: u64,
    /// First-contact policy.
    pub first_contact: FirstContact,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: 25 * 60,
            first_contact: FirstContact::default(),
        }
    }
}

impl SessionSection {
    /// Idle timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Settings cache configuration.
///
/// ```toml
/// [settings]
/// ttl_secs = 600
/// max_entries = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSection {
    /// Seconds a cached document may be served before reloading.
    pub ttl_secs: u64,
    /// Maximum cached documents before LRU eviction.
    pub max_entries: usize,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_entries: 10_000,
        }
    }
}

impl SettingsSection {
    /// Cache TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reaper Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// When the background reaper starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaperStart {
    /// On the first session check.
    #[default]
    Lazy,
    /// At startup.
    Eager,
    /// Never.
    Disabled,
}

/// Background reaper configuration.
///
/// ```toml
/// [reaper]
/// mode = "lazy"
/// interval_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperSection {
    /// Start mode.
    pub mode: ReaperStart,
    /// Seconds between sweeps.
    pub interval_secs: u64,
}

impl Default for ReaperSection {
    fn default() -> Self {
        Self {
            mode: ReaperStart::default(),
            interval_secs: 300,
        }
    }
}

impl ReaperSection {
    /// Sweep interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Durable storage configuration.
///
/// ```toml
/// [storage]
/// settings_dir = "/var/lib/scribe/settings"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory of per-user settings documents.
    /// Defaults to `<data dir>/scribe/settings`.
    pub settings_dir: Option<PathBuf>,
}

impl StorageSection {
    /// Configured settings directory, or the platform default.
    pub fn settings_dir(&self) -> PathBuf {
        self.settings_dir
            .clone()
            .or_else(|| crate::discovery::data_dir().map(|d| d.join("settings")))
            .unwrap_or_else(|| PathBuf::from("settings"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
///
/// ```toml
/// [logging]
/// level = "info"
/// json_file = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Console filter directive for scribe crates (e.g. "info", "debug").
    pub level: String,
    /// Also write JSON logs to a daily rotating file.
    pub json_file: bool,
    /// Directory for log files. Defaults to `<config dir>/logs`.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: true,
            log_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
