use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LockError;

/// How [`HybridLock::run`](crate::HybridLock::run) behaves when the lock is
/// already held.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Try once; skip the action when someone else holds the lock.
    #[default]
    Execution,
    /// Retry until the lock is free, then run the action.
    Queue,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Execution => write!(f, "execution"),
            LockMode::Queue => write!(f, "queue"),
        }
    }
}

impl FromStr for LockMode {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "execution" => Ok(LockMode::Execution),
            "queue" => Ok(LockMode::Queue),
            other => Err(LockError::Config(format!("unknown lock mode: {}", other))),
        }
    }
}
