//! adsync Sync - Incremental dataset synchronization engine
//!
//! Provides:
//! - Per-client cooperative locking with stale-lock reclaim
//! - Backfill, incremental append and range repair of the campaign dataset
//! - Last-write-wins merge with derived metric recomputation
//! - Sampled schema validation and date-gap detection
//! - Error recovery records with a literal resume command
//!
//! ## Modules
//!
//! - [`engine`] - Orchestrator composing the steps into `init`/`append`/`repair`/`validate`
//! - [`lock`] - Lock files under `locks/<slug>.lock`
//! - [`atomic`] - Temp-file + rename writer used for every persisted file
//! - [`dataset`] - CSV codec for the master dataset
//! - [`state_store`] - JSON persistence of [`ClientState`](adsync_core::domain::ClientState)
//! - [`merge`] - Dedup/merge and gap detection
//! - [`schema`] - Declarative row schema and sampled validation
//! - [`recovery`] - Error record writer
//! - [`system`] - Real clock and process probe adapters

pub mod atomic;
pub mod dataset;
pub mod engine;
pub mod lock;
pub mod merge;
pub mod recovery;
pub mod schema;
pub mod state_store;
pub mod system;

use std::path::PathBuf;
use std::time::Duration;

use adsync_core::domain::{
    ClientSlug, DateRange, DomainError, ErrorKind, Operation,
};
use thiserror::Error;

/// Errors that abort a sync operation
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another process kept the client lock for longer than the timeout
    #[error("timed out after {}s waiting for the lock on client '{slug}'", .waited.as_secs())]
    LockTimeout { slug: ClientSlug, waited: Duration },

    /// `append`/`repair` found no state or dataset from a previous `init`
    #[error("client '{slug}' has no prior sync: {path} is missing")]
    MissingPriorState { slug: ClientSlug, path: PathBuf },

    /// The performance source failed for a chunk
    #[error("fetch failed for {range}: {message}")]
    FetchFailure { range: DateRange, message: String },

    /// Persisting a file failed
    #[error("failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file or dataset exists but cannot be read back
    #[error("cannot read {path}: {reason}")]
    StateCorrupt { path: PathBuf, reason: String },

    /// Client configuration is missing or invalid
    #[error("invalid client configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Operation arguments are unusable
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A domain-level error propagated from adsync-core
    #[error("{0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    /// Classification recorded in the error record
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            Self::MissingPriorState { .. } => ErrorKind::MissingPriorState,
            Self::FetchFailure { .. } => ErrorKind::FetchFailure,
            Self::WriteFailure { .. } => ErrorKind::WriteFailure,
            Self::StateCorrupt { .. } => ErrorKind::StateCorrupt,
            Self::Config { .. } => ErrorKind::Config,
            Self::InvalidInput(_) | Self::Domain(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

/// A failed operation, after its error record has been written
#[derive(Debug, Error)]
#[error("{operation} failed for client '{slug}'{}", range_suffix(.range))]
pub struct OperationFailure {
    pub operation: Operation,
    pub slug: ClientSlug,
    /// Range the operation was working on, once it was known
    pub range: Option<DateRange>,
    #[source]
    pub error: SyncError,
    /// Where the error record landed; `None` if it could not be written
    pub record_path: Option<PathBuf>,
}

impl OperationFailure {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

fn range_suffix(range: &Option<DateRange>) -> String {
    range.map(|r| format!(" ({r})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let slug = ClientSlug::new("acme").unwrap();
        let err = SyncError::LockTimeout {
            slug: slug.clone(),
            waited: Duration::from_secs(300),
        };
        assert_eq!(err.kind(), ErrorKind::LockTimeout);
        assert_eq!(
            err.to_string(),
            "timed out after 300s waiting for the lock on client 'acme'"
        );

        let err = SyncError::from(DomainError::InvalidDate("2025-13-01".into()));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_operation_failure_display_includes_range() {
        let failure = OperationFailure {
            operation: Operation::Append,
            slug: ClientSlug::new("acme").unwrap(),
            range: Some(DateRange::parse("2025-09-07", "2025-09-19").unwrap()),
            error: SyncError::InvalidInput("boom".into()),
            record_path: None,
        };
        assert_eq!(
            failure.to_string(),
            "append failed for client 'acme' (2025-09-07..2025-09-19)"
        );
        assert_eq!(failure.kind(), ErrorKind::InvalidInput);
    }
}
