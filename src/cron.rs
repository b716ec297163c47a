//! Fleet-wide deduplication for scheduled jobs.
//!
//! A [`CronLock`] is a remote lock in the `cron:lock` namespace with a
//! five-minute default TTL. Scheduled jobs never queue: if another instance
//! already holds the lock for this tick, the job is skipped.
//!
//! ```
//! use std::sync::Arc;
//! use hybrid_lock::backend::InMemoryBackend;
//! use hybrid_lock::CronLock;
//!
//! let backend = Arc::new(InMemoryBackend::new());
//! let node_a = CronLock::new("daily_cleanup", backend.clone()).unwrap();
//! let node_b = CronLock::new("daily_cleanup", backend.clone()).unwrap();
//!
//! let ran_a = node_a.run_once(|| "cleaned");
//! assert_eq!(ran_a, Some("cleaned"));
//!
//! // node_a released on completion, so the next tick can run anywhere
//! assert_eq!(node_b.run_once(|| "cleaned"), Some("cleaned"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::backend::LockBackend;
use crate::config::DEFAULT_TTL_SECS;
use crate::{
    AcquireOutcome, Lock, LockKey, LockResult, LockStatus, ReleaseOutcome, RemoteLock,
};

/// Remote lock for a scheduled job.
pub struct CronLock {
    inner: RemoteLock,
}

impl CronLock {
    /// Lock for `job` with the default 300 s TTL.
    pub fn new(job: impl Into<String>, backend: Arc<dyn LockBackend>) -> LockResult<Self> {
        Self::with_ttl_secs(job, backend, DEFAULT_TTL_SECS)
    }

    pub fn with_ttl_secs(
        job: impl Into<String>,
        backend: Arc<dyn LockBackend>,
        ttl_secs: u64,
    ) -> LockResult<Self> {
        let key = LockKey::cron(job)?;
        Ok(CronLock {
            inner: RemoteLock::new(key, backend, ttl_secs)?,
        })
    }

    /// Connect to Redis with `config` and lock `job`.
    ///
    /// A failed connection is logged and the lock is still returned; until
    /// Redis becomes reachable every acquire reports `false`, so the job is
    /// skipped rather than run unguarded.
    #[cfg(feature = "redis")]
    pub fn connect(job: impl Into<String>, config: &crate::RedisConfig) -> LockResult<Self> {
        let backend = crate::backend::RedisBackend::new(config)?;
        if let Err(err) = backend.connect() {
            tracing::warn!(
                host = %config.host,
                port = config.port,
                error = %err,
                "cannot connect to redis; cron lock will refuse to acquire"
            );
        }
        Self::new(job, Arc::new(backend))
    }

    pub fn key(&self) -> &LockKey {
        self.inner.key()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl()
    }

    /// Run `job` if no other instance holds the lock, then release.
    /// Returns `None` when skipped.
    pub fn run_once<T, F>(&self, job: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        match self.try_acquire() {
            AcquireOutcome::Acquired => {}
            AcquireOutcome::Held => {
                info!(key = %self.key(), "job already running elsewhere, skipping");
                return None;
            }
            // already logged by the remote lock
            AcquireOutcome::Failed(_) => return None,
        }
        let _release = ReleaseOnDrop(&self.inner);
        Some(job())
    }
}

impl Lock for CronLock {
    fn try_acquire(&self) -> AcquireOutcome {
        self.inner.try_acquire()
    }

    fn status(&self) -> LockStatus {
        self.inner.status()
    }

    fn release(&self) -> ReleaseOutcome {
        self.inner.release()
    }
}

struct ReleaseOnDrop<'a>(&'a RemoteLock);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}
