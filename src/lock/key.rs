use std::fmt;

use crate::{LockError, LockResult};

/// Namespace for general-purpose locks.
pub const LOCK_NAMESPACE: &str = "lock";

/// Namespace for scheduled-job locks.
pub const CRON_NAMESPACE: &str = "cron:lock";

/// A namespaced lock identifier.
///
/// The namespace keeps lock records apart from unrelated keys in a shared
/// store. Rendered as `"{namespace}:{name}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    namespace: &'static str,
    name: String,
}

impl LockKey {
    /// Create a key in the general lock namespace.
    pub fn new(name: impl Into<String>) -> LockResult<Self> {
        Self::with_namespace(LOCK_NAMESPACE, name)
    }

    /// Create a key in the cron namespace.
    pub fn cron(job: impl Into<String>) -> LockResult<Self> {
        Self::with_namespace(CRON_NAMESPACE, job)
    }

    fn with_namespace(namespace: &'static str, name: impl Into<String>) -> LockResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::InvalidKey("lock name is empty".into()));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LockError::InvalidKey(format!(
                "lock name {:?} contains whitespace or control characters",
                name
            )));
        }
        Ok(LockKey { namespace, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        self.namespace
    }

    /// The full key written to a remote store.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    /// File name for the local lock file. Characters outside
    /// `[A-Za-z0-9._-]` become `_`.
    pub fn file_name(&self) -> String {
        let safe: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}.lock", safe)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}
