//! Per-client lock files
//!
//! ## Design Notes
//!
//! - A lock is the file `locks/<slug>.lock` holding a JSON [`LockRecord`]
//!   naming the owner pid, the acquisition time and the operation. The
//!   record is written and synced to a private temp file first, then
//!   hard-linked onto the lock path, so exactly one process wins and the
//!   lock never exists half-written.
//! - When the file already exists its pid is probed. A dead owner makes the
//!   lock stale. Reclaiming renames the file aside, which only one process
//!   can do, and re-reads it: if it is still the stale record it is deleted,
//!   otherwise it is linked back untouched. Acquisition is then retried at
//!   once, without waiting for the next poll.
//! - A lock file that cannot be parsed counts as held; `force-unlock`
//!   clears it.
//! - [`LockGuard`] removes the file when dropped, on every exit path, but
//!   only while the file still names this process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use adsync_core::{
    domain::{ClientSlug, Operation},
    ports::{IClock, IProcessProbe},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::SyncError;

/// Contents of a lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub operation: Operation,
}

/// What is currently on disk for a client lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// No lock file
    Free,
    /// Lock file owned by a running process
    Held(LockRecord),
    /// Lock file whose owner no longer exists
    Stale(LockRecord),
    /// Lock file that cannot be parsed
    Unreadable,
}

/// Acquires and inspects client lock files in a locks directory
#[derive(Clone)]
pub struct LockManager {
    locks_dir: PathBuf,
    poll_interval: Duration,
    probe: Arc<dyn IProcessProbe>,
    clock: Arc<dyn IClock>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("locks_dir", &self.locks_dir)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(
        locks_dir: impl Into<PathBuf>,
        poll_interval: Duration,
        probe: Arc<dyn IProcessProbe>,
        clock: Arc<dyn IClock>,
    ) -> Self {
        Self {
            locks_dir: locks_dir.into(),
            poll_interval,
            probe,
            clock,
        }
    }

    /// Path of the lock file for `slug`
    #[must_use]
    pub fn path_for(&self, slug: &ClientSlug) -> PathBuf {
        self.locks_dir.join(format!("{slug}.lock"))
    }

    /// Take the lock for `slug`, polling until `timeout` elapses
    ///
    /// # Errors
    /// `SyncError::LockTimeout` if the lock is still held at the deadline,
    /// `SyncError::WriteFailure` if the lock file cannot be created
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn acquire(
        &self,
        slug: &ClientSlug,
        timeout: Duration,
        operation: Operation,
    ) -> Result<LockGuard, SyncError> {
        let path = self.path_for(slug);
        tokio::fs::create_dir_all(&self.locks_dir)
            .await
            .map_err(|e| SyncError::write(&self.locks_dir, e))?;

        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            let record = LockRecord {
                pid: std::process::id(),
                acquired_at: self.clock.now(),
                operation,
            };
            match create_lock_file(&path, &record).await {
                Ok(()) => {
                    info!(waited_ms = started.elapsed().as_millis() as u64, "lock acquired");
                    return Ok(LockGuard {
                        path,
                        pid: record.pid,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(SyncError::write(&path, e)),
            }

            match self.status_at(&path).await {
                LockStatus::Stale(stale) => {
                    self.reclaim_stale(&path, &stale)
                        .await
                        .map_err(|e| SyncError::write(&path, e))?;
                    continue;
                }
                // Released between our attempt and the read
                LockStatus::Free => continue,
                LockStatus::Held(owner) => {
                    debug!(pid = owner.pid, operation = %owner.operation, "lock held, waiting");
                }
                LockStatus::Unreadable => debug!("lock file unreadable, waiting"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SyncError::LockTimeout {
                    slug: slug.clone(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Current lock state for `slug`
    pub async fn status(&self, slug: &ClientSlug) -> LockStatus {
        self.status_at(&self.path_for(slug)).await
    }

    /// Delete the lock file for `slug` regardless of its owner
    ///
    /// Returns whether a lock file existed.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn force_unlock(&self, slug: &ClientSlug) -> Result<bool, SyncError> {
        let path = self.path_for(slug);
        let status = self.status_at(&path).await;
        let existed = remove_if_exists(&path)
            .await
            .map_err(|e| SyncError::write(&path, e))?;

        if existed {
            match status {
                LockStatus::Held(owner) | LockStatus::Stale(owner) => warn!(
                    pid = owner.pid,
                    operation = %owner.operation,
                    "lock forcibly removed"
                ),
                _ => warn!("lock forcibly removed"),
            }
        }
        Ok(existed)
    }

    /// Remove `path` only if it still holds the `stale` record
    ///
    /// Returns whether the stale lock was removed. Losing the rename to a
    /// rival, or finding a different record, leaves the lock in place.
    async fn reclaim_stale(&self, path: &Path, stale: &LockRecord) -> std::io::Result<bool> {
        let aside = sibling(path, &format!("stale.{}", Uuid::new_v4()));
        match tokio::fs::rename(path, &aside).await {
            Ok(()) => {}
            // Someone else reclaimed or released it first
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }

        let taken = tokio::fs::read(&aside)
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockRecord>(&bytes).ok());
        let still_stale = taken
            .as_ref()
            .is_some_and(|record| record == stale && !self.probe.exists(record.pid));

        if still_stale {
            warn!(pid = stale.pid, operation = %stale.operation, "removed stale lock");
        } else {
            // A rival replaced the stale lock before our rename; give it back
            match tokio::fs::hard_link(&aside, path).await {
                Ok(()) => debug!("lock changed owner during reclaim, restored"),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    warn!(?taken, "lock changed owner during reclaim and was taken again")
                }
                Err(e) => {
                    warn!(error = %e, "cannot restore lock moved during reclaim");
                    return Err(e);
                }
            }
        }
        remove_if_exists(&aside).await?;
        Ok(still_stale)
    }

    async fn status_at(&self, path: &Path) -> LockStatus {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LockStatus::Free,
            Err(e) => {
                debug!(error = %e, "cannot read lock file");
                return LockStatus::Unreadable;
            }
        };

        match serde_json::from_slice::<LockRecord>(&contents) {
            Ok(record) if self.probe.exists(record.pid) => LockStatus::Held(record),
            Ok(record) => LockStatus::Stale(record),
            Err(_) => LockStatus::Unreadable,
        }
    }
}

/// Held client lock; the file is removed on drop
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    pid: u32,
}

impl LockGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Someone may have force-unlocked and re-acquired in the meantime
        let owned = std::fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockRecord>(&bytes).ok())
            .is_some_and(|record| record.pid == self.pid);
        if !owned {
            debug!(path = %self.path.display(), "lock no longer ours, leaving it");
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release lock"),
        }
    }
}

/// `<lock path>.<suffix>` in the same directory
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Publish `record` at `path`, failing with `AlreadyExists` if a lock is there
///
/// The lock path only ever appears with the complete record in it.
async fn create_lock_file(path: &Path, record: &LockRecord) -> std::io::Result<()> {
    let bytes = serde_json::to_vec_pretty(record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let staged = sibling(path, &format!("{}.{}.tmp", record.pid, Uuid::new_v4()));
    let published = write_staged(&staged, &bytes).await;
    let published = match published {
        Ok(()) => tokio::fs::hard_link(&staged, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = remove_if_exists(&staged).await {
        debug!(path = %staged.display(), error = %e, "cannot remove staged lock file");
    }
    published
}

async fn write_staged(staged: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staged)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
