use std::sync::Arc;

use super::{HybridLock, LockMode};
use crate::backend::LockBackend;
use crate::{CronLock, LockConfig, LockError, LockResult};

/// Factory for locks that share one backend and one set of defaults.
///
/// Pass a `LockManager` (or clone it) to the components that need locks
/// instead of reaching for a global. Each [`HybridLock`] it builds probes the
/// backend on its own, so a backend outage only affects locks built while it
/// lasts.
///
/// ```
/// use std::sync::Arc;
/// use hybrid_lock::backend::InMemoryBackend;
/// use hybrid_lock::{DriverKind, LockConfig, LockManager};
///
/// let manager = LockManager::with_backend(
///     LockConfig::default(),
///     Arc::new(InMemoryBackend::new()),
/// );
///
/// let reports = manager.lock("reports").unwrap();
/// assert_eq!(reports.driver(), DriverKind::Remote);
///
/// let nightly = manager.cron_lock("nightly").unwrap();
/// assert_eq!(nightly.key().qualified(), "cron:lock:nightly");
/// ```
#[derive(Clone)]
pub struct LockManager {
    defaults: LockConfig,
    backend: Option<Arc<dyn LockBackend>>,
}

impl LockManager {
    /// Build a manager from defaults. If `defaults.redis` is set (and the
    /// `redis` feature is on) one Redis backend is created and shared.
    /// `defaults.key` is ignored.
    pub fn new(defaults: LockConfig) -> LockResult<Self> {
        let backend = crate::backend::configured(&defaults)?;
        Ok(LockManager { defaults, backend })
    }

    pub fn with_backend(defaults: LockConfig, backend: Arc<dyn LockBackend>) -> Self {
        LockManager {
            defaults,
            backend: Some(backend),
        }
    }

    pub fn defaults(&self) -> &LockConfig {
        &self.defaults
    }

    pub fn backend(&self) -> Option<&Arc<dyn LockBackend>> {
        self.backend.as_ref()
    }

    /// Lock `name` with the default mode.
    pub fn lock(&self, name: &str) -> LockResult<HybridLock> {
        self.lock_with_mode(name, self.defaults.mode)
    }

    pub fn lock_with_mode(&self, name: &str, mode: LockMode) -> LockResult<HybridLock> {
        let config = LockConfig {
            key: name.to_string(),
            mode,
            redis: None,
            ..self.defaults.clone()
        };
        HybridLock::from_config(&config, self.backend.clone())
    }

    /// Cron lock for `job`, using the default TTL. Requires a backend.
    pub fn cron_lock(&self, job: &str) -> LockResult<CronLock> {
        let backend = self.backend.clone().ok_or_else(|| {
            LockError::Config("cron locks need a remote backend".into())
        })?;
        CronLock::with_ttl_secs(job, backend, self.defaults.ttl_secs)
    }
}
