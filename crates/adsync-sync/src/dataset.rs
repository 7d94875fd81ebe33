//! Master dataset codec
//!
//! The dataset is a single CSV file per client with a header row and one
//! line per [`CampaignRow`]. Derived metrics with a zero denominator are
//! written as empty fields.

use std::path::Path;

use adsync_core::domain::CampaignRow;
use tracing::{debug, instrument};

use crate::{atomic, SyncError};

/// Serialize rows to CSV bytes, header first
pub fn encode(rows: &[CampaignRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Parse CSV bytes produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<Vec<CampaignRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    reader.deserialize().collect()
}

/// Load the dataset at `path`; `Ok(None)` when the file does not exist
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<Option<Vec<CampaignRow>>, SyncError> {
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

    let rows = decode(&bytes).map_err(|e| SyncError::StateCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(rows = rows.len(), "dataset loaded");
    Ok(Some(rows))
}

/// Replace the dataset at `path` atomically
#[instrument(skip(path, rows), fields(path = %path.display(), rows = rows.len()))]
pub async fn save(path: &Path, rows: &[CampaignRow]) -> Result<(), SyncError> {
    let bytes = encode(rows).map_err(|e| {
        SyncError::write(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    atomic::write_atomic(path, &bytes).await
}
