use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, warn};

use super::{new_token, AcquireOutcome, Lock, LockKey, LockStatus, ReleaseOutcome};
use crate::backend::LockBackend;
use crate::config::validate_ttl;
use crate::LockResult;

/// A lock held as a record in a shared [`LockBackend`].
///
/// Acquisition is a single atomic set-if-absent with expiry, so at most one
/// handle anywhere can take the key until it is released or the TTL lapses.
/// Each acquisition writes a fresh token; [`release`](Lock::release) only
/// removes the record if it still carries that token, so a holder whose TTL
/// ran out cannot delete the lock of whoever took over.
pub struct RemoteLock {
    key: LockKey,
    backend: Arc<dyn LockBackend>,
    ttl_secs: u64,
    token: Mutex<Option<String>>,
}

impl RemoteLock {
    pub fn new(key: LockKey, backend: Arc<dyn LockBackend>, ttl_secs: u64) -> LockResult<Self> {
        validate_ttl(ttl_secs)?;
        Ok(RemoteLock {
            key,
            backend,
            ttl_secs,
            token: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn backend(&self) -> &Arc<dyn LockBackend> {
        &self.backend
    }

    /// Token written by the current acquisition, if this handle holds one.
    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    /// Delete the record regardless of who wrote it.
    ///
    /// For clearing a key left behind by a crashed holder. Deleting an absent
    /// key succeeds.
    pub fn force_release(&self) -> ReleaseOutcome {
        let key = self.key.qualified();
        self.set_token(None);
        match self.backend.delete(&key) {
            Ok(()) => ReleaseOutcome::Released,
            Err(err) => {
                error!(key = %key, backend = self.backend.name(), error = %err, "force release failed");
                ReleaseOutcome::Failed(err)
            }
        }
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = token;
        }
    }

    fn take_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|mut t| t.take())
    }
}

impl Lock for RemoteLock {
    fn try_acquire(&self) -> AcquireOutcome {
        let key = self.key.qualified();
        let token = new_token();
        match self.backend.set_if_absent(&key, &token, self.ttl()) {
            Ok(true) => {
                self.set_token(Some(token));
                AcquireOutcome::Acquired
            }
            Ok(false) => AcquireOutcome::Held,
            Err(err) => {
                error!(key = %key, backend = self.backend.name(), error = %err, "acquire failed");
                AcquireOutcome::Failed(err)
            }
        }
    }

    fn status(&self) -> LockStatus {
        let key = self.key.qualified();
        match self.backend.exists(&key) {
            Ok(true) => LockStatus::Locked,
            Ok(false) => LockStatus::Unlocked,
            Err(err) => {
                error!(key = %key, backend = self.backend.name(), error = %err, "status check failed");
                LockStatus::Unknown(err)
            }
        }
    }

    fn release(&self) -> ReleaseOutcome {
        let Some(token) = self.take_token() else {
            return ReleaseOutcome::NotHeld;
        };
        let key = self.key.qualified();
        match self.backend.delete_if_equals(&key, &token) {
            Ok(true) => ReleaseOutcome::Released,
            Ok(false) => {
                warn!(key = %key, "lock expired before release; leaving current record in place");
                ReleaseOutcome::NotHeld
            }
            Err(err) => {
                error!(key = %key, backend = self.backend.name(), error = %err, "release failed");
                ReleaseOutcome::Failed(err)
            }
        }
    }
}
