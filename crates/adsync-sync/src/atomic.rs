//! Atomic file replacement
//!
//! Every file the engine persists (dataset, state, error records) goes
//! through here. Content is written to `<target>.tmp` in the target's own
//! directory, flushed to disk, then renamed over the target. A reader sees
//! either the old file or the new one, never a partial write.
//!
//! Writing is split in two phases so callers (and tests) can stage content
//! and decide later whether to commit it. A [`StagedFile`] dropped without
//! [`StagedFile::commit`] removes its temp file and leaves the target alone.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::SyncError;

/// Temp file waiting to replace its target
#[derive(Debug)]
pub struct StagedFile {
    tmp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Write `data` to the temp file next to `target` and fsync it
    #[instrument(skip(target, data), fields(path = %target.display(), bytes = data.len()))]
    pub async fn stage(target: &Path, data: &[u8]) -> Result<Self, SyncError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::write(parent, e))?;
        }

        let tmp_path = tmp_path_for(target);
        // Constructed before writing so a failed write still cleans up.
        let staged = Self {
            tmp_path: tmp_path.clone(),
            target: target.to_path_buf(),
            committed: false,
        };

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| SyncError::write(&tmp_path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| SyncError::write(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| SyncError::write(&tmp_path, e))?;

        debug!(tmp = %tmp_path.display(), "staged temporary file");
        Ok(staged)
    }

    /// Path of the temp file
    #[must_use]
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Rename the temp file over the target
    pub async fn commit(mut self) -> Result<(), SyncError> {
        tokio::fs::rename(&self.tmp_path, &self.target)
            .await
            .map_err(|e| SyncError::write(&self.target, e))?;
        self.committed = true;
        sync_parent_dir(&self.target).await;
        debug!(path = %self.target.display(), "committed");
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.tmp_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(tmp = %self.tmp_path.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}

/// Replace `target` with `data` atomically
pub async fn write_atomic(target: &Path, data: &[u8]) -> Result<(), SyncError> {
    StagedFile::stage(target, data).await?.commit().await
}

fn tmp_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

/// Persist the rename itself. Best effort: the data is already durable.
async fn sync_parent_dir(target: &Path) {
    #[cfg(unix)]
    if let Some(parent) = target.parent() {
        match tokio::fs::File::open(parent).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    debug!(dir = %parent.display(), error = %e, "directory fsync failed");
                }
            }
            Err(e) => debug!(dir = %parent.display(), error = %e, "cannot open directory for fsync"),
        }
    }
    #[cfg(not(unix))]
    let _ = target;
}
