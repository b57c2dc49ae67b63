//! Error types for session and settings cache operations.

/// Error type for session and settings cache operations.
///
/// Expiry is never an error: an expired session or settings entry is
/// reported as `false` / `None` by the operation that observed it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The durable settings store rejected or failed an operation.
    #[error("Settings store error: {0}")]
    Store(String),

    /// Filesystem error from a file-backed store.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A settings document could not be encoded or decoded.
    #[error("Invalid settings document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The user id cannot be used as a storage key.
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    /// A reaper sweep target failed.
    #[error("Sweep failed: {0}")]
    Sweep(String),
}

/// Result type for session and settings cache operations.
pub type Result<T> = std::result::Result<T, Error>;
