//! Client state persistence
//!
//! One pretty-printed JSON document per client at `state/<slug>.json`,
//! always replaced whole through the atomic writer.

use std::path::{Path, PathBuf};

use adsync_core::domain::ClientState;
use tracing::{debug, instrument};

use crate::{atomic, SyncError};

/// Reads and writes [`ClientState`] documents under a state directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the state file for `slug`
    #[must_use]
    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }

    /// Load the state for `slug`; `Ok(None)` if the client was never initialised
    #[instrument(skip(self))]
    pub async fn load(&self, slug: &str) -> Result<Option<ClientState>, SyncError> {
        read_state(&self.path_for(slug)).await
    }

    /// Persist `state` atomically
    #[instrument(skip(self, state), fields(slug = %state.slug))]
    pub async fn save(&self, state: &ClientState) -> Result<(), SyncError> {
        let path = self.path_for(state.slug.as_str());
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| {
            SyncError::write(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        atomic::write_atomic(&path, &bytes).await?;
        debug!(path = %path.display(), "state saved");
        Ok(())
    }
}

async fn read_state(path: &Path) -> Result<Option<ClientState>, SyncError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SyncError::StateCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| SyncError::StateCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsync_core::domain::{ClientSlug, DataSource};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_state_is_none() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        let now = Utc.with_ymd_and_hms(2025, 9, 20, 8, 0, 0).unwrap();

        let mut state = ClientState::new(ClientSlug::new("acme").unwrap(), now);
        state.reset_watermark(
            DataSource::GoogleAds,
            NaiveDate::from_ymd_opt(2025, 9, 19).unwrap(),
            now,
        );
        store.save(&state).await.unwrap();

        assert!(dir.path().join("state/acme.json").exists());
        assert_eq!(store.load("acme").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_unparseable_state_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        tokio::fs::write(store.path_for("acme"), b"{ not json").await.unwrap();

        let err = store.load("acme").await.unwrap_err();
        assert!(matches!(err, SyncError::StateCorrupt { .. }));
    }
}
