//! Distributed mutual exclusion with a local fallback.
//!
//! A [`HybridLock`] lets independent processes, on one host or many, agree
//! that only one of them runs a named critical section at a time. It prefers
//! a shared [`LockBackend`](backend::LockBackend) (Redis in production) and
//! falls back to an exclusive lock file when the backend cannot be reached
//! at construction time.
//!
//! - [`Lock`]: the `acquire` / `is_locked` / `release` contract every driver
//!   implements
//! - [`RemoteLock`]: atomic set-if-absent with expiry in a backend
//! - [`FileLock`]: exclusive lock file with a TTL, scoped to one host
//! - [`HybridLock`]: picks one of the two once, adds `wait_and_acquire` and
//!   `run` in [`LockMode::Execution`] or [`LockMode::Queue`]
//! - [`CronLock`]: remote lock for scheduled jobs that should run once per
//!   tick across a fleet
//! - [`LockManager`]: hands out locks that share a backend and defaults
//!
//! Driver failures never surface as panics or `Err`: they are logged through
//! `tracing` and reported as [`AcquireOutcome::Failed`],
//! [`LockStatus::Unknown`] or [`ReleaseOutcome::Failed`] (and as `false` in
//! the boolean API).

pub mod backend;
pub mod config;
pub mod cron;
mod error;
mod lock;

pub use config::{LockConfig, RedisConfig};
pub use cron::CronLock;
pub use error::{LockError, LockResult};
pub use lock::{
    AcquireOutcome, DriverKind, FileLock, HybridLock, HybridLockBuilder, Lock, LockKey,
    LockManager, LockMode, LockStats, LockStatus, ReleaseOutcome, RemoteLock, WaitOptions,
    CRON_NAMESPACE, LOCK_NAMESPACE,
};
