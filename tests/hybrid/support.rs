//! Shared fixtures for hybrid lock tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hybrid_lock::backend::{InMemoryBackend, LockBackend};
use hybrid_lock::{HybridLock, LockMode, LockResult};
use tempfile::TempDir;

/// Wraps an `InMemoryBackend` and counts probe calls.
#[derive(Clone)]
pub struct CountingBackend {
    pub inner: InMemoryBackend,
    connects: Arc<AtomicUsize>,
    health_checks: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            connects: Arc::new(AtomicUsize::new(0)),
            health_checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }
}

impl LockBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn connect(&self) -> LockResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn health_check(&self) -> LockResult<bool> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        self.inner.health_check()
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        self.inner.set_if_absent(key, value, ttl)
    }

    fn exists(&self, key: &str) -> LockResult<bool> {
        self.inner.exists(key)
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        self.inner.delete(key)
    }

    fn delete_if_equals(&self, key: &str, value: &str) -> LockResult<bool> {
        self.inner.delete_if_equals(key, value)
    }
}

/// Which store a test lock should end up in.
#[derive(Debug, Clone, Copy)]
pub enum Store {
    Remote,
    Local,
}

/// A backend plus a lock directory, so every test can build handles that
/// contend on the same store.
pub struct Fixture {
    pub backend: InMemoryBackend,
    pub dir: TempDir,
    store: Store,
}

impl Fixture {
    pub fn new(store: Store) -> Self {
        let backend = match store {
            Store::Remote => InMemoryBackend::new(),
            Store::Local => InMemoryBackend::unhealthy(),
        };
        Self {
            backend,
            dir: TempDir::new().unwrap(),
            store,
        }
    }

    pub fn lock(&self, name: &str, mode: LockMode, ttl_secs: u64) -> HybridLock {
        HybridLock::builder(name)
            .with_mode(mode)
            .with_ttl_secs(ttl_secs)
            .with_backend(Arc::new(self.backend.clone()))
            .with_lock_dir(self.dir.path())
            .with_retry_delay(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    pub fn store(&self) -> Store {
        self.store
    }
}
