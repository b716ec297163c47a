use std::path::PathBuf;

use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors produced while building or driving a lock.
///
/// Backend and I/O failures never escape a driver as `Err`; they are
/// carried inside [`AcquireOutcome`](crate::AcquireOutcome),
/// [`LockStatus`](crate::LockStatus) and
/// [`ReleaseOutcome`](crate::ReleaseOutcome) instead. Only construction and
/// bounded waits return this type directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock key is empty or contains characters a backend cannot store.
    #[error("invalid lock key: {0}")]
    InvalidKey(String),

    /// A configuration value is out of range or missing.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The backend could not be reached or reported itself unhealthy.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed a command.
    #[error("backend error: {0}")]
    Backend(String),

    /// Local filesystem failure in the file driver.
    #[error("io error on {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// A bounded wait gave up before the lock became free.
    #[error("gave up waiting for lock {key} after {attempts} attempts")]
    WaitExhausted { key: String, attempts: u32 },
}

impl LockError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        LockError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::Config(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
            LockError::Unavailable(err.to_string())
        } else {
            LockError::Backend(err.to_string())
        }
    }
}
