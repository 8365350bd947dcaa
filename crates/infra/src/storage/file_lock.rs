//! Cross-process exclusive lock using a `.lock` sidecar file
//!
//! The sidecar is created with `create_new`; its presence means the lock is
//! held. A sidecar older than the stale timeout is assumed to belong to a
//! crashed writer and is taken over: it is renamed aside, and deleted only if
//! the renamed file still carries the modification time that was judged stale.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use authgate_domain::constants::{LOCK_ACQUIRE_BUDGET, LOCK_RETRY_DELAY, STALE_LOCK_TIMEOUT};
use authgate_domain::{AuthGateError, Result};
use tokio::fs::{self, OpenOptions};
use tokio::time::Instant;

/// Timing knobs for [`FileLock::acquire_with`].
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Age after which an existing sidecar is removed.
    pub stale_after: Duration,
    /// Total time spent retrying before giving up.
    pub budget: Duration,
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale_after: STALE_LOCK_TIMEOUT,
            budget: LOCK_ACQUIRE_BUDGET,
            retry_delay: LOCK_RETRY_DELAY,
        }
    }
}

/// Held lock; released on [`FileLock::release`] or drop
#[derive(Debug)]
pub struct FileLock {
    lock_file: PathBuf,
    released: bool,
}

impl FileLock {
    /// `<target>.lock`
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquire the lock guarding `target` with default timings.
    pub async fn acquire(target: &Path) -> Result<Self> {
        Self::acquire_with(target, LockOptions::default()).await
    }

    pub async fn acquire_with(target: &Path, options: LockOptions) -> Result<Self> {
        let lock_file = Self::lock_path(target);
        let deadline = Instant::now() + options.budget;

        loop {
            match create_exclusive(&lock_file).await {
                Ok(()) => {
                    tracing::debug!(path = %lock_file.display(), "token_lock.acquired");
                    return Ok(Self { lock_file, released: false });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    match inspect(&lock_file, options.stale_after).await {
                        Sidecar::Vanished => continue,
                        Sidecar::Stale(observed) => {
                            if take_over_stale(&lock_file, observed).await? {
                                tracing::warn!(
                                    path = %lock_file.display(),
                                    "token_lock.stale_lock_removed"
                                );
                                continue;
                            }
                        }
                        Sidecar::Held => {}
                    }
                }
                Err(err) => {
                    return Err(AuthGateError::Storage(format!(
                        "failed to create lock file {}: {err}",
                        lock_file.display()
                    )))
                }
            }

            if Instant::now() >= deadline {
                tracing::warn!(path = %lock_file.display(), "token_lock.timeout");
                return Err(AuthGateError::Storage(format!(
                    "timed out waiting for lock file {}",
                    lock_file.display()
                )));
            }
            tokio::time::sleep(options.retry_delay).await;
        }
    }

    /// Remove the sidecar.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.lock_file).await {
            Ok(()) => {
                tracing::debug!(path = %self.lock_file.display(), "token_lock.released");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthGateError::Storage(format!(
                "failed to remove lock file {}: {err}",
                self.lock_file.display()
            ))),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.lock_file) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %self.lock_file.display(), "token_lock.remove_failed");
            }
        } else {
            tracing::debug!(path = %self.lock_file.display(), "token_lock.released");
        }
    }
}

async fn create_exclusive(path: &Path) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await.map(drop)
}

enum Sidecar {
    Held,
    /// Removed between the create attempt and now; retry immediately.
    Vanished,
    /// Older than the stale timeout, with the modification time seen.
    Stale(SystemTime),
}

async fn inspect(path: &Path, stale_after: Duration) -> Sidecar {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Sidecar::Vanished,
        Err(_) => return Sidecar::Held,
    };
    let Ok(modified) = metadata.modified() else {
        return Sidecar::Held;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) if age > stale_after => Sidecar::Stale(modified),
        _ => Sidecar::Held,
    }
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).await.ok()?.modified().ok()
}

/// Remove the sidecar at `lock_file` if it is still the one last modified at
/// `observed`. Returns `true` when it was removed.
///
/// The rename is atomic, so of several waiters that judged the same sidecar
/// stale only one moves it. A waiter that instead moves a fresh sidecar
/// links it back into place.
async fn take_over_stale(lock_file: &Path, observed: SystemTime) -> Result<bool> {
    let mut name = lock_file.as_os_str().to_os_string();
    name.push(format!(".stale-{}", uuid::Uuid::new_v4().simple()));
    let aside = PathBuf::from(name);

    match fs::rename(lock_file, &aside).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(AuthGateError::Storage(format!(
                "failed to remove stale lock file {}: {err}",
                lock_file.display()
            )))
        }
    }

    let unchanged = modified_at(&aside).await == Some(observed);
    if !unchanged {
        tracing::debug!(path = %lock_file.display(), "token_lock.stale_lock_refreshed");
        if let Err(err) = fs::hard_link(&aside, lock_file).await {
            tracing::warn!(error = %err, path = %lock_file.display(), "token_lock.restore_failed");
        }
    }
    if let Err(err) = fs::remove_file(&aside).await {
        if err.kind() != ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %aside.display(), "token_lock.remove_failed");
        }
    }
    Ok(unchanged)
}
