use crate::LockError;

/// Result of a single acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// This handle now holds the lock.
    Acquired,
    /// Someone else holds an unexpired lock on the key.
    Held,
    /// The driver could not decide (backend down, I/O failure).
    Failed(LockError),
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired)
    }

    pub fn error(&self) -> Option<&LockError> {
        match self {
            AcquireOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Observed state of a lock key.
///
/// `Unknown` is reported when the driver could not reach its store, so a
/// caller can tell "free" apart from "could not check".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Locked,
    Unlocked,
    Unknown(LockError),
}

impl LockStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, LockStatus::Unknown(_))
    }
}

/// Result of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The record written by this handle was removed.
    Released,
    /// Nothing to remove: the handle never acquired, already released, or
    /// its record expired and now belongs to another holder.
    NotHeld,
    /// The driver failed while releasing. The record will still expire.
    Failed(LockError),
}

impl ReleaseOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, ReleaseOutcome::Released)
    }
}

/// Trait for a single named lock.
///
/// Implementations never panic and never return transport errors through
/// `Err`; failures are folded into the outcome types and logged. Remote
/// locks talk to a [`LockBackend`](crate::backend::LockBackend), file locks
/// to a lock file on local disk.
pub trait Lock: Send + Sync {
    /// Try once to take the lock.
    fn try_acquire(&self) -> AcquireOutcome;

    /// Check whether an unexpired lock record exists for the key.
    fn status(&self) -> LockStatus;

    /// Release the lock if this handle holds it.
    fn release(&self) -> ReleaseOutcome;

    /// Returns `true` only when this call took the lock.
    fn acquire(&self) -> bool {
        self.try_acquire().is_acquired()
    }

    /// Returns `true` only when the key is known to be held.
    /// An unreachable store reads as unlocked.
    fn is_locked(&self) -> bool {
        self.status().is_locked()
    }
}
