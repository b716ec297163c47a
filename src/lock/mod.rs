mod file;
mod hybrid;
mod key;
#[allow(clippy::module_inception)]
mod lock;
mod lock_manager;
mod mode;
mod remote;

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

pub use file::FileLock;
pub use hybrid::{DriverKind, HybridLock, HybridLockBuilder, LockStats, WaitOptions};
pub use key::{LockKey, CRON_NAMESPACE, LOCK_NAMESPACE};
pub use lock::{AcquireOutcome, Lock, LockStatus, ReleaseOutcome};
pub use lock_manager::LockManager;
pub use mode::LockMode;
pub use remote::RemoteLock;

/// Value written on acquisition: `"{unix_secs}:{uuid}"`.
///
/// The timestamp records when the lock was taken; the uuid makes the value
/// unique so release can check it still owns the record.
fn new_token() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}:{}", secs, Uuid::new_v4())
}
