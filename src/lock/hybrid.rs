use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{
    AcquireOutcome, FileLock, Lock, LockKey, LockMode, LockStatus, ReleaseOutcome, RemoteLock,
};
use crate::backend::{probe, LockBackend};
use crate::config::{validate_ttl, LockConfig, DEFAULT_RETRY_DELAY_MS, DEFAULT_TTL_SECS};
use crate::{LockError, LockResult};

/// Which driver a [`HybridLock`] bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Remote,
    Local,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Remote => write!(f, "remote"),
            DriverKind::Local => write!(f, "local"),
        }
    }
}

enum Driver {
    Remote(RemoteLock),
    Local(FileLock),
}

impl Driver {
    fn kind(&self) -> DriverKind {
        match self {
            Driver::Remote(_) => DriverKind::Remote,
            Driver::Local(_) => DriverKind::Local,
        }
    }

    fn as_lock(&self) -> &dyn Lock {
        match self {
            Driver::Remote(lock) => lock,
            Driver::Local(lock) => lock,
        }
    }
}

/// Bounds for a blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub retry_delay: Duration,
    /// Stop after this many attempts.
    pub max_attempts: Option<u32>,
    /// Stop once this much time has passed since the first attempt.
    pub max_wait: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions {
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_attempts: None,
            max_wait: None,
        }
    }
}

impl WaitOptions {
    pub fn new(retry_delay: Duration) -> Self {
        WaitOptions {
            retry_delay,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }
}

/// Counters for one [`HybridLock`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    /// Successful acquisitions.
    pub acquired: u64,
    /// Attempts that found the lock held.
    pub contended: u64,
    /// Attempts the driver could not complete.
    pub failed: u64,
    /// `run` calls in execution mode that skipped their action.
    pub skipped: u64,
    /// Sleeps between attempts in a blocking wait.
    pub retries: u64,
    pub released: u64,
}

#[derive(Default)]
struct StatsCounters {
    acquired: AtomicU64,
    contended: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    retries: AtomicU64,
    released: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LockStats {
        LockStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}

/// Builder for [`HybridLock`].
pub struct HybridLockBuilder {
    name: String,
    mode: LockMode,
    ttl_secs: u64,
    backend: Option<Arc<dyn LockBackend>>,
    lock_dir: Option<PathBuf>,
    wait: WaitOptions,
}

impl HybridLockBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        HybridLockBuilder {
            name: name.into(),
            mode: LockMode::default(),
            ttl_secs: DEFAULT_TTL_SECS,
            backend: None,
            lock_dir: None,
            wait: WaitOptions::default(),
        }
    }

    pub fn with_mode(mut self, mode: LockMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Offer a remote backend. It is only used if it passes the probe.
    pub fn with_backend(mut self, backend: Arc<dyn LockBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Directory for the fallback lock file.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Delay between attempts when `run` waits in queue mode.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.wait.retry_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.wait.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.wait.max_wait = Some(wait);
        self
    }

    /// Validate the settings, probe the backend once, and bind a driver.
    pub fn build(self) -> LockResult<HybridLock> {
        let key = LockKey::new(self.name)?;
        validate_ttl(self.ttl_secs)?;
        if self.wait.max_attempts == Some(0) {
            return Err(LockError::Config("max_attempts must be at least 1".into()));
        }

        let driver = match self.backend {
            Some(backend) if probe::can_use(backend.as_ref()) => {
                info!(key = %key, driver = "remote", backend = backend.name(), "hybrid lock bound");
                Driver::Remote(RemoteLock::new(key.clone(), backend, self.ttl_secs)?)
            }
            _ => {
                let dir = self.lock_dir.unwrap_or_else(FileLock::default_dir);
                let lock = FileLock::new(key.clone(), dir, self.ttl_secs)?;
                info!(key = %key, driver = "local", path = %lock.path().display(), "hybrid lock bound");
                Driver::Local(lock)
            }
        };

        Ok(HybridLock {
            key,
            mode: self.mode,
            wait: self.wait,
            driver,
            stats: StatsCounters::default(),
        })
    }
}

/// A lock that prefers a remote backend and falls back to a local file.
///
/// The driver is chosen once, when the lock is built: if a backend was
/// supplied and it connects and answers its health check, the lock lives in
/// that backend; otherwise it lives in a lock file on this host. The choice
/// is never revisited for the lifetime of the handle.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use hybrid_lock::backend::InMemoryBackend;
/// use hybrid_lock::{DriverKind, HybridLock, Lock, LockMode};
///
/// let backend = InMemoryBackend::new();
/// let lock = HybridLock::builder("generate_reports")
///     .with_mode(LockMode::Execution)
///     .with_backend(Arc::new(backend.clone()))
///     .build()
///     .unwrap();
///
/// assert_eq!(lock.driver(), DriverKind::Remote);
///
/// let ran = lock.run(|| 42).unwrap();
/// assert_eq!(ran, Some(42));
/// assert!(!lock.is_locked());
/// ```
pub struct HybridLock {
    key: LockKey,
    mode: LockMode,
    wait: WaitOptions,
    driver: Driver,
    stats: StatsCounters,
}

impl HybridLock {
    pub fn builder(name: impl Into<String>) -> HybridLockBuilder {
        HybridLockBuilder::new(name)
    }

    /// Build from a [`LockConfig`]. An injected backend wins over
    /// `config.redis`; with neither, the lock is file-backed.
    pub fn from_config(
        config: &LockConfig,
        backend: Option<Arc<dyn LockBackend>>,
    ) -> LockResult<Self> {
        config.validate()?;
        let mut builder = HybridLock::builder(config.key.clone())
            .with_mode(config.mode)
            .with_ttl_secs(config.ttl_secs)
            .with_retry_delay(config.retry_delay());
        if let Some(attempts) = config.max_attempts {
            builder = builder.with_max_attempts(attempts);
        }
        if let Some(wait) = config.max_wait() {
            builder = builder.with_max_wait(wait);
        }
        if let Some(dir) = &config.lock_dir {
            builder = builder.with_lock_dir(dir.clone());
        }
        let backend = match backend {
            Some(backend) => Some(backend),
            None => crate::backend::configured(config)?,
        };
        if let Some(backend) = backend {
            builder = builder.with_backend(backend);
        }
        builder.build()
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn driver(&self) -> DriverKind {
        self.driver.kind()
    }

    pub fn wait_options(&self) -> WaitOptions {
        self.wait
    }

    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Delete the lock record regardless of holder.
    pub fn force_release(&self) -> ReleaseOutcome {
        match &self.driver {
            Driver::Remote(lock) => lock.force_release(),
            Driver::Local(lock) => lock.force_release(),
        }
    }

    /// Block until the lock is taken, retrying every `retry_delay`.
    /// There is no upper bound; see [`wait_and_acquire_with`](Self::wait_and_acquire_with).
    pub fn wait_and_acquire(&self, retry_delay: Duration) {
        // unbounded, so the only exit is success
        let _ = self.wait_and_acquire_with(&WaitOptions::new(retry_delay));
    }

    /// Block until the lock is taken or a bound in `options` is hit.
    /// Returns the number of attempts made.
    pub fn wait_and_acquire_with(&self, options: &WaitOptions) -> LockResult<u32> {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            if self.try_acquire().is_acquired() {
                return Ok(attempts);
            }
            let out_of_attempts = options.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = options
                .max_wait
                .is_some_and(|max| started.elapsed() + options.retry_delay > max);
            if out_of_attempts || out_of_time {
                debug!(key = %self.key, attempts, "gave up waiting for lock");
                return Err(LockError::WaitExhausted {
                    key: self.key.qualified(),
                    attempts,
                });
            }
            StatsCounters::bump(&self.stats.retries);
            thread::sleep(options.retry_delay);
        }
    }

    /// Run `action` under the lock according to the lock's mode.
    ///
    /// - `Queue`: waits using the builder's wait options, then runs.
    /// - `Execution`: one attempt; returns `Ok(None)` without running
    ///   `action` when the lock is unavailable.
    ///
    /// The lock is released exactly once after `action` returns, and also if
    /// it panics. An `Err` from this method only comes from a bounded queue
    /// wait giving up.
    pub fn run<T, F>(&self, action: F) -> LockResult<Option<T>>
    where
        F: FnOnce() -> T,
    {
        self.run_with(action, &self.wait)
    }

    /// Like [`run`](Self::run) with explicit wait options for queue mode.
    pub fn run_with<T, F>(&self, action: F, options: &WaitOptions) -> LockResult<Option<T>>
    where
        F: FnOnce() -> T,
    {
        match self.mode {
            LockMode::Queue => {
                self.wait_and_acquire_with(options)?;
            }
            LockMode::Execution => {
                if !self.try_acquire().is_acquired() {
                    StatsCounters::bump(&self.stats.skipped);
                    debug!(key = %self.key, "lock unavailable, skipping action");
                    return Ok(None);
                }
            }
        }

        let _release = ReleaseOnDrop(self);
        Ok(Some(action()))
    }
}

impl Lock for HybridLock {
    fn try_acquire(&self) -> AcquireOutcome {
        let outcome = self.driver.as_lock().try_acquire();
        let counter = match &outcome {
            AcquireOutcome::Acquired => &self.stats.acquired,
            AcquireOutcome::Held => &self.stats.contended,
            AcquireOutcome::Failed(_) => &self.stats.failed,
        };
        StatsCounters::bump(counter);
        outcome
    }

    fn status(&self) -> LockStatus {
        self.driver.as_lock().status()
    }

    fn release(&self) -> ReleaseOutcome {
        let outcome = self.driver.as_lock().release();
        if outcome.is_released() {
            StatsCounters::bump(&self.stats.released);
        }
        outcome
    }
}

impl fmt::Debug for HybridLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridLock")
            .field("key", &self.key.qualified())
            .field("mode", &self.mode)
            .field("driver", &self.driver.kind())
            .finish()
    }
}

struct ReleaseOnDrop<'a>(&'a HybridLock);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}
