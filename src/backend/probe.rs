//! One-shot usability check for a backend.
//!
//! [`HybridLock`](crate::HybridLock) calls [`can_use`] once while it is being
//! built and binds to the remote driver only when it returns `true`.

use tracing::warn;

use super::LockBackend;
use crate::{LockError, LockResult};

/// Connect if needed, then run the backend's health check.
pub fn check(backend: &dyn LockBackend) -> LockResult<()> {
    if !backend.is_connected() {
        backend.connect()?;
    }
    if backend.health_check()? {
        Ok(())
    } else {
        Err(LockError::Unavailable("health check failed".into()))
    }
}

/// Whether the backend is reachable and healthy right now. Never panics;
/// failures are logged and reported as `false`.
pub fn can_use(backend: &dyn LockBackend) -> bool {
    match check(backend) {
        Ok(()) => true,
        Err(err) => {
            warn!(backend = backend.name(), error = %err, "lock backend unusable");
            false
        }
    }
}
