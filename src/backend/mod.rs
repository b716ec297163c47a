//! Remote coordination backends.
//!
//! A [`LockBackend`] is the narrow capability a [`RemoteLock`](crate::RemoteLock)
//! needs from a shared store: an atomic set-if-absent with expiry, an
//! existence check, deletes, and a connectivity probe. Backends take `&self`
//! and are shared as `Arc<dyn LockBackend>` so one connection can serve many
//! lock handles.
//!
//! - [`InMemoryBackend`]: process-local store with expiry, for tests and
//!   single-process deployments. Can be switched to simulate an outage.
//! - [`RedisBackend`]: Redis via the `redis` crate (feature `redis`).

mod in_memory;
pub mod probe;
#[cfg(feature = "redis")]
mod redis;

use std::sync::Arc;
use std::time::Duration;

use crate::{LockConfig, LockResult};

pub use in_memory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

/// Capability a shared store must provide to host remote locks.
pub trait LockBackend: Send + Sync {
    /// Short identifier used in logs (`"redis"`, `"memory"`).
    fn name(&self) -> &str;

    /// Establish a session. Calling it while connected is a no-op.
    fn connect(&self) -> LockResult<()>;

    fn is_connected(&self) -> bool;

    /// Lightweight liveness probe. Must return within the transport timeout.
    fn health_check(&self) -> LockResult<bool>;

    /// Atomically set `key = value` with the given expiry, only if the key is
    /// absent or expired. Returns whether the set happened.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool>;

    /// Whether an unexpired record exists for `key`.
    fn exists(&self, key: &str) -> LockResult<bool>;

    /// Remove `key`. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> LockResult<()>;

    /// Remove `key` only if its current value equals `value`.
    /// Returns whether a record was removed.
    fn delete_if_equals(&self, key: &str, value: &str) -> LockResult<bool>;
}

/// Backend described by `config.redis`, if any. Does not connect.
#[cfg(feature = "redis")]
pub(crate) fn configured(config: &LockConfig) -> LockResult<Option<Arc<dyn LockBackend>>> {
    match &config.redis {
        Some(redis) => Ok(Some(Arc::new(RedisBackend::new(redis)?))),
        None => Ok(None),
    }
}

#[cfg(not(feature = "redis"))]
pub(crate) fn configured(config: &LockConfig) -> LockResult<Option<Arc<dyn LockBackend>>> {
    if config.redis.is_some() {
        tracing::warn!(key = %config.key, "redis settings ignored: built without the `redis` feature");
    }
    Ok(None)
}
