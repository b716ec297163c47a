use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::LockBackend;
use crate::{LockError, LockResult};

struct Record {
    value: String,
    expires_at: Instant,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory lock store backed by a `Mutex<HashMap<String, Record>>`.
///
/// Cloning returns another handle to the same storage, so several lock
/// handles (or threads) can contend on one store the way separate processes
/// contend on one Redis. Expired records are dropped lazily on access.
///
/// The store can be switched into two failure modes for exercising
/// fallback paths:
/// - [`set_healthy(false)`](Self::set_healthy): `health_check` reports `false`
/// - [`set_failing(true)`](Self::set_failing): every command returns
///   `LockError::Unavailable`
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use hybrid_lock::backend::{InMemoryBackend, LockBackend};
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.set_if_absent("lock:jobs", "a", Duration::from_secs(5)).unwrap());
/// assert!(!backend.set_if_absent("lock:jobs", "b", Duration::from_secs(5)).unwrap());
/// assert_eq!(backend.get("lock:jobs").as_deref(), Some("a"));
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    records: Arc<Mutex<HashMap<String, Record>>>,
    connected: Arc<AtomicBool>,
    healthy: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Create a healthy, disconnected store. The first probe connects it.
    pub fn new() -> Self {
        InMemoryBackend {
            records: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            healthy: Arc::new(AtomicBool::new(true)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a store whose health check always reports `false`.
    pub fn unhealthy() -> Self {
        let backend = Self::new();
        backend.set_healthy(false);
        backend
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Current value of an unexpired record.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.records
            .lock()
            .ok()?
            .get(key)
            .filter(|r| r.is_live(now))
            .map(|r| r.value.clone())
    }

    /// Keys of all unexpired records, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let Ok(records) = self.records.lock() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = records
            .iter()
            .filter(|(_, r)| r.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn records(&self) -> LockResult<MutexGuard<'_, HashMap<String, Record>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("in-memory backend is failing".into()));
        }
        self.records
            .lock()
            .map_err(|_| LockError::Backend("in-memory backend poisoned".into()))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LockBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self) -> LockResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("connection refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn health_check(&self) -> LockResult<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("ping failed".into()));
        }
        Ok(self.is_connected() && self.healthy.load(Ordering::SeqCst))
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let mut records = self.records()?;
        let now = Instant::now();
        if records.get(key).is_some_and(|r| r.is_live(now)) {
            return Ok(false);
        }
        records.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    fn exists(&self, key: &str) -> LockResult<bool> {
        let mut records = self.records()?;
        let now = Instant::now();
        match records.get(key) {
            Some(r) if r.is_live(now) => Ok(true),
            Some(_) => {
                records.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        self.records()?.remove(key);
        Ok(())
    }

    fn delete_if_equals(&self, key: &str, value: &str) -> LockResult<bool> {
        let mut records = self.records()?;
        let now = Instant::now();
        match records.get(key) {
            Some(r) if r.is_live(now) && r.value == value => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
