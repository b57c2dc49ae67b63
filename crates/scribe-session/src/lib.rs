//! Session liveness and settings caching for Scribe.
//!
//! This crate provides the in-memory layer that sits between request
//! handlers and durable per-user settings storage:
//! - A session store with a sliding idle timeout
//! - A read-through, write-through settings cache with TTL and LRU bound
//! - A background reaper that sweeps expired entries from both
//!
//! # Example
//!
//! ```rust,ignore
//! use scribe_session::{MemorySettingsStore, ServicesConfig, SessionServices};
//!
//! let services = SessionServices::new(ServicesConfig::default(), MemorySettingsStore::new());
//!
//! if !services.sessions().check_session("dr-lee") {
//!     // require re-authentication
//! }
//! let settings = services.settings().get("dr-lee").await?.unwrap_or_default();
//! ```

mod cache;
mod clock;
mod config;
mod document;
mod error;
mod file_store;
mod persistence;
mod reaper;
mod services;
mod session;

pub use cache::{CacheStats, SettingsCache};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    DEFAULT_MAX_SETTINGS_ENTRIES, DEFAULT_REAPER_INTERVAL, DEFAULT_SESSION_TIMEOUT,
    DEFAULT_SETTINGS_TTL, FirstContactPolicy, ReaperConfig, ReaperMode, ServicesConfig,
    SessionConfig, SettingsCacheConfig,
};
pub use document::SettingsDocument;
pub use error::{Error, Result};
pub use file_store::JsonFileSettingsStore;
pub use persistence::{MemorySettingsStore, SettingsStore};
pub use reaper::{Reaper, Sweep, SweepReport};
pub use services::SessionServices;
pub use session::SessionStore;
