use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use tracing::{error, info, warn};

use super::{new_token, AcquireOutcome, Lock, LockKey, LockStatus, ReleaseOutcome};
use crate::config::validate_ttl;
use crate::{LockError, LockResult};

/// A lock held as an exclusive file on local disk.
///
/// Scoped to one host. The lock file holds the holder's deadline and
/// acquisition token, so expiry follows the TTL of whoever wrote it, and an
/// expired file is taken over by the next acquire. Files this type did not
/// write expire by modification time plus the reader's TTL. A sibling guard file, locked with an OS
/// advisory lock for the duration of each acquire or release, makes the
/// check-then-create and check-then-delete steps atomic between processes.
///
/// ## Layout
///
/// ```text
/// {lock_dir}/reports.lock          "{expires_at_unix_ms}\n{token}"
/// {lock_dir}/.reports.lock.guard   empty, only ever flock'ed
/// ```
pub struct FileLock {
    key: LockKey,
    path: PathBuf,
    guard_path: PathBuf,
    ttl_secs: u64,
    token: Mutex<Option<String>>,
}

impl FileLock {
    pub fn new(key: LockKey, lock_dir: impl Into<PathBuf>, ttl_secs: u64) -> LockResult<Self> {
        validate_ttl(ttl_secs)?;
        let lock_dir = lock_dir.into();
        let file_name = key.file_name();
        Ok(FileLock {
            path: lock_dir.join(&file_name),
            guard_path: lock_dir.join(format!(".{}.guard", file_name)),
            key,
            ttl_secs,
            token: Mutex::new(None),
        })
    }

    /// `{temp_dir}/hybrid_lock/locks`
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("hybrid_lock").join("locks")
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    /// Remove the lock file regardless of who wrote it.
    pub fn force_release(&self) -> ReleaseOutcome {
        self.set_token(None);
        let result = self.guard().and_then(|_guard| remove_if_exists(&self.path));
        match result {
            Ok(_) => ReleaseOutcome::Released,
            Err(err) => {
                let err = LockError::io(&self.path, err);
                error!(key = %self.key, error = %err, "force release failed");
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

    /// Open and flock the guard file. The lock is dropped with the handle.
    fn guard(&self) -> io::Result<File> {
        if let Some(dir) = self.guard_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.guard_path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    /// `None` when there is no lock file, else whether it is unexpired.
    /// Records written by a `FileLock` carry the holder's deadline; anything
    /// else falls back to mtime plus this handle's TTL.
    fn is_live(&self) -> io::Result<Option<bool>> {
        let contents = match fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        if let Some(record) = Record::parse(&contents) {
            return Ok(Some(now_ms() < record.expires_at_ms));
        }
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        // mtime in the future (clock skew) reads as fresh
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .map(|age| age < self.ttl())
                .unwrap_or(true),
        ))
    }

    fn acquire_file(&self, token: &str) -> io::Result<bool> {
        let _guard = self.guard()?;
        match self.is_live()? {
            Some(true) => return Ok(false),
            Some(false) => {
                info!(key = %self.key, path = %self.path.display(), "taking over expired lock file");
                remove_if_exists(&self.path)?;
            }
            None => {}
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err),
        };
        let record = Record::new(token, self.ttl());
        if let Err(err) = file
            .write_all(record.to_string().as_bytes())
            .and_then(|_| file.sync_all())
        {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(err);
        }
        Ok(true)
    }

    fn release_file(&self, token: &str) -> io::Result<bool> {
        let _guard = self.guard()?;
        let current = match fs::read_to_string(&self.path) {
            Ok(current) => current,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        match Record::parse(&current) {
            Some(record) if record.token == token => remove_if_exists(&self.path),
            _ => Ok(false),
        }
    }

    fn file_status(&self) -> io::Result<bool> {
        Ok(self.is_live()?.unwrap_or(false))
    }
}

/// Lock file contents: `"{expires_at_unix_ms}\n{token}"`.
#[derive(Debug, PartialEq, Eq)]
struct Record<'a> {
    expires_at_ms: u64,
    token: &'a str,
}

impl<'a> Record<'a> {
    fn new(token: &'a str, ttl: Duration) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Record {
            expires_at_ms: now_ms().saturating_add(ttl_ms),
            token,
        }
    }

    fn parse(contents: &'a str) -> Option<Self> {
        let (deadline, token) = contents.split_once('\n')?;
        let expires_at_ms = deadline.trim().parse().ok()?;
        let token = token.trim_end();
        if token.is_empty() {
            return None;
        }
        Some(Record {
            expires_at_ms,
            token,
        })
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.expires_at_ms, self.token)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

impl Lock for FileLock {
    fn try_acquire(&self) -> AcquireOutcome {
        let token = new_token();
        match self.acquire_file(&token) {
            Ok(true) => {
                self.set_token(Some(token));
                AcquireOutcome::Acquired
            }
            Ok(false) => AcquireOutcome::Held,
            Err(err) => {
                let err = LockError::io(&self.path, err);
                error!(key = %self.key, error = %err, "acquire failed");
                AcquireOutcome::Failed(err)
            }
        }
    }

    fn status(&self) -> LockStatus {
        match self.file_status() {
            Ok(true) => LockStatus::Locked,
            Ok(false) => LockStatus::Unlocked,
            Err(err) => {
                let err = LockError::io(&self.path, err);
                error!(key = %self.key, error = %err, "status check failed");
                LockStatus::Unknown(err)
            }
        }
    }

    fn release(&self) -> ReleaseOutcome {
        let Some(token) = self.take_token() else {
            return ReleaseOutcome::NotHeld;
        };
        match self.release_file(&token) {
            Ok(true) => ReleaseOutcome::Released,
            Ok(false) => {
                warn!(key = %self.key, "lock file expired or replaced before release");
                ReleaseOutcome::NotHeld
            }
            Err(err) => {
                let err = LockError::io(&self.path, err);
                error!(key = %self.key, error = %err, "release failed");
                ReleaseOutcome::Failed(err)
            }
        }
    }
}

/// Returns whether a file was removed.
fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
