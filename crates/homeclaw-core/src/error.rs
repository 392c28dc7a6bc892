//! HomeClaw error type — one enum for the whole workspace.

/// Convenience result alias used across HomeClaw crates.
pub type Result<T> = std::result::Result<T, HomeClawError>;

/// All the ways HomeClaw operations can fail.
///
/// Nothing here is fatal to a host process: callers are expected to log
/// and continue. Validation errors abort the operation with no state
/// change; executor and notification failures are degraded, not raised.
#[derive(Debug, thiserror::Error)]
pub enum HomeClawError {
    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// A request failed validation (bad time string, out-of-range delay).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// An absolute time string did not parse as HH:MM.
    #[error("Invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    /// Task or preference storage could not be persisted or loaded.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The action executor rejected or failed a service call.
    #[error("Executor error: {0}")]
    Executor(String),

    /// I/O failure (storage files, config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
