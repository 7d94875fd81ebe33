//! Error recovery records
//!
//! Writes each [`ErrorRecord`] to `errors/<slug>/error_<timestamp>.json`.
//! Records are never rewritten; the file name carries millisecond precision
//! so two failures in the same second do not collide.

use std::path::{Path, PathBuf};

use adsync_core::domain::ErrorRecord;
use tracing::{error, instrument};

use crate::atomic;

/// Writes error records below an errors directory
#[derive(Debug, Clone)]
pub struct ErrorRecorder {
    errors_dir: PathBuf,
}

impl ErrorRecorder {
    #[must_use]
    pub fn new(errors_dir: impl Into<PathBuf>) -> Self {
        Self {
            errors_dir: errors_dir.into(),
        }
    }

    /// Directory holding the records for `slug`
    #[must_use]
    pub fn client_dir(&self, slug: &str) -> PathBuf {
        self.errors_dir.join(slug)
    }

    /// Persist `record` and return its path
    #[instrument(skip(self, record), fields(slug = %record.slug, kind = %record.error_kind))]
    pub async fn record(&self, record: &ErrorRecord) -> anyhow::Result<PathBuf> {
        let file_name = format!("error_{}.json", record.timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let path = self.client_dir(record.slug.as_str()).join(file_name);

        let bytes = serde_json::to_vec_pretty(record)?;
        atomic::write_atomic(&path, &bytes).await?;

        error!(
            operation = %record.operation,
            error_message = %record.error_message,
            recovery = %record.recovery_command,
            path = %path.display(),
            "operation failed, error record written"
        );
        Ok(path)
    }

    /// All records for `slug`, oldest first
    pub async fn list(&self, slug: &str) -> anyhow::Result<Vec<ErrorRecord>> {
        let dir = self.client_dir(slug);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_record_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path).await?;
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }
}

fn is_record_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("error_") && n.ends_with(".json"))
}
