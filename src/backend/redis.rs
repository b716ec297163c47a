//! Redis lock backend.
//!
//! Uses `SET key value NX PX ttl` for acquisition, `EXISTS` for status, and a
//! Lua compare-and-delete for token-checked release. The backend keeps a
//! single synchronous connection behind a mutex; a command that fails with a
//! transport error drops it so the next call reconnects.

use std::sync::Mutex;
use std::time::Duration;

use redis::{
    Client, Connection, ConnectionAddr, ConnectionInfo, ConnectionLike, RedisConnectionInfo,
    RedisResult, Script,
};
use tracing::{debug, info};

use super::LockBackend;
use crate::{LockError, LockResult, RedisConfig};

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed [`LockBackend`].
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use hybrid_lock::backend::RedisBackend;
/// use hybrid_lock::{HybridLock, LockMode, RedisConfig};
///
/// let backend = Arc::new(RedisBackend::new(&RedisConfig::default())?);
/// let lock = HybridLock::builder("generate_reports")
///     .with_mode(LockMode::Queue)
///     .with_backend(backend)
///     .build()?;
///
/// lock.run(|| println!("running under lock"))?;
/// # Ok::<(), hybrid_lock::LockError>(())
/// ```
pub struct RedisBackend {
    client: Client,
    target: String,
    timeout: Duration,
    conn: Mutex<Option<Connection>>,
    release_script: Script,
}

impl RedisBackend {
    /// Build a backend from connection parameters. Does not connect; the
    /// first command or [`connect`](LockBackend::connect) does.
    pub fn new(config: &RedisConfig) -> LockResult<Self> {
        config.validate()?;
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        };
        let client = Client::open(info)?;
        Ok(Self::from_client(
            client,
            format!("{}:{}/{}", config.host, config.port, config.db),
            config.timeout(),
        ))
    }

    /// Build a backend from a URL such as `redis://127.0.0.1/` or
    /// `redis://:secret@host:6379/2`.
    pub fn open(redis_url: &str, timeout: Duration) -> LockResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| LockError::Config(format!("invalid redis url: {e}")))?;
        let target = client.get_connection_info().addr.to_string();
        Ok(Self::from_client(client, target, timeout))
    }

    fn from_client(client: Client, target: String, timeout: Duration) -> Self {
        RedisBackend {
            client,
            target,
            timeout,
            conn: Mutex::new(None),
            release_script: Script::new(COMPARE_AND_DELETE),
        }
    }

    fn open_connection(&self) -> LockResult<Connection> {
        let conn = self.client.get_connection_with_timeout(self.timeout)?;
        conn.set_read_timeout(Some(self.timeout))?;
        conn.set_write_timeout(Some(self.timeout))?;
        info!(backend = "redis", target = %self.target, "connected");
        Ok(conn)
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> LockResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| LockError::Backend("redis connection mutex poisoned".into()))?;
        let conn = match guard.as_mut() {
            Some(conn) => conn,
            None => guard.insert(self.open_connection()?),
        };
        match op(conn) {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
                    debug!(backend = "redis", target = %self.target, error = %err, "dropping connection");
                    *guard = None;
                }
                Err(err.into())
            }
        }
    }
}

impl LockBackend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    fn connect(&self) -> LockResult<()> {
        self.with_connection(|_| Ok(()))
    }

    fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|conn| conn.is_open()))
            .unwrap_or(false)
    }

    fn health_check(&self) -> LockResult<bool> {
        self.with_connection(|conn| redis::cmd("PING").query::<String>(conn))
            .map(|reply| reply == "PONG")
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        self.with_connection(|conn| {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query::<Option<String>>(conn)
        })
        .map(|reply| reply.is_some())
    }

    fn exists(&self, key: &str) -> LockResult<bool> {
        self.with_connection(|conn| redis::cmd("EXISTS").arg(key).query::<i64>(conn))
            .map(|count| count > 0)
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        self.with_connection(|conn| redis::cmd("DEL").arg(key).query::<i64>(conn))
            .map(|_| ())
    }

    fn delete_if_equals(&self, key: &str, value: &str) -> LockResult<bool> {
        self.with_connection(|conn| {
            self.release_script
                .key(key)
                .arg(value)
                .invoke::<i64>(conn)
        })
        .map(|removed| removed > 0)
    }
}
