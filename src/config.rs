//! Serde-backed configuration for locks and the Redis connection.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```
//! use hybrid_lock::{LockConfig, LockMode};
//!
//! let config = LockConfig::from_json(r#"{
//!     "key": "generate_reports",
//!     "mode": "queue",
//!     "redis": { "host": "10.0.0.5", "db": 2 }
//! }"#).unwrap();
//!
//! assert_eq!(config.mode, LockMode::Queue);
//! assert_eq!(config.ttl_secs, 300);
//! assert_eq!(config.redis.unwrap().port, 6379);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LockError, LockMode, LockResult};

pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Settings for a [`HybridLock`](crate::HybridLock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Logical lock name, without namespace.
    pub key: String,
    pub ttl_secs: u64,
    pub mode: LockMode,
    /// Delay between attempts in queue mode.
    pub retry_delay_ms: u64,
    /// Give up after this many attempts in queue mode. `None` waits forever.
    pub max_attempts: Option<u32>,
    /// Give up after this long in queue mode. `None` waits forever.
    pub max_wait_ms: Option<u64>,
    /// Directory for fallback lock files. Defaults to a temp subdirectory.
    pub lock_dir: Option<PathBuf>,
    /// Redis connection used when no backend is injected.
    pub redis: Option<RedisConfig>,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            key: String::new(),
            ttl_secs: DEFAULT_TTL_SECS,
            mode: LockMode::default(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_attempts: None,
            max_wait_ms: None,
            lock_dir: None,
            redis: None,
        }
    }
}

impl LockConfig {
    pub fn new(key: impl Into<String>) -> Self {
        LockConfig {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> LockResult<Self> {
        let config: LockConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values that would misbehave at runtime.
    pub fn validate(&self) -> LockResult<()> {
        if self.key.is_empty() {
            return Err(LockError::InvalidKey("lock name is empty".into()));
        }
        validate_ttl(self.ttl_secs)?;
        if self.max_attempts == Some(0) {
            return Err(LockError::Config("max_attempts must be at least 1".into()));
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}

pub(crate) fn validate_ttl(ttl_secs: u64) -> LockResult<()> {
    if ttl_secs == 0 {
        return Err(LockError::Config("ttl_secs must be positive".into()));
    }
    Ok(())
}

/// Connection parameters for the Redis backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Database index selected after connecting.
    pub db: i64,
    /// Connect, read and write timeout.
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "127.0.0.1".into(),
            port: 6379,
            password: None,
            db: 0,
            timeout_ms: 2000,
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> LockResult<()> {
        if self.host.trim().is_empty() {
            return Err(LockError::Config("redis host is empty".into()));
        }
        if self.db < 0 {
            return Err(LockError::Config(format!(
                "redis db index must be non-negative, got {}",
                self.db
            )));
        }
        if self.timeout_ms == 0 {
            return Err(LockError::Config("redis timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
