//! CLI command handlers.

use std::path::PathBuf;

use scribe_config::{FirstContact, ReaperStart, ScribeConfig};
use scribe_session::{
    FirstContactPolicy, JsonFileSettingsStore, ReaperConfig, ReaperMode, ServicesConfig,
    SessionConfig, SettingsCacheConfig,
};

pub mod config;
pub mod serve;
pub mod settings;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: ScribeConfig,
    /// Config files that were loaded, lowest precedence first.
    pub sources: Vec<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Runtime configuration for the session services.
    pub fn services_config(&self) -> ServicesConfig {
        let session = self.config.session();
        let settings = self.config.settings();
        let reaper = self.config.reaper();

        ServicesConfig::new()
            .with_session(
                SessionConfig::new()
                    .with_timeout(session.timeout())
                    .with_first_contact(match session.first_contact {
                        FirstContact::Admit => FirstContactPolicy::Admit,
                        FirstContact::Reject => FirstContactPolicy::Reject,
                    }),
            )
            .with_settings(
                SettingsCacheConfig::new()
                    .with_ttl(settings.ttl())
                    .with_max_entries(settings.max_entries),
            )
            .with_reaper(
                ReaperConfig::new()
                    .with_interval(reaper.interval())
                    .with_mode(match reaper.mode {
                        ReaperStart::Lazy => ReaperMode::Lazy,
                        ReaperStart::Eager => ReaperMode::Eager,
                        ReaperStart::Disabled => ReaperMode::Disabled,
                    }),
            )
    }

    /// Durable settings store at the configured location.
    pub fn settings_store(&self) -> JsonFileSettingsStore {
        JsonFileSettingsStore::new(self.config.storage().settings_dir())
    }
}
