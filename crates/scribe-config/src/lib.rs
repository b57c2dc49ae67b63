//! Configuration system for Scribe.
//!
//! Provides TOML-based configuration with:
//! - Session timeout and first-contact policy (`[session]`)
//! - Settings cache TTL and capacity (`[settings]`)
//! - Reaper mode and interval (`[reaper]`)
//! - Storage location and logging output (`[storage]`, `[logging]`)
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, config_dir, data_dir, load_config, load_config_file,
    load_config_with_options, load_explicit, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
