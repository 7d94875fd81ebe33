//! Domain entities and business logic
//!
//! This module contains the core domain types for adsync:
//! - Newtypes for validated client and customer identifiers
//! - Per-client sync state and data-quality bookkeeping
//! - Dataset rows and derived metric computation
//! - Date windows and the window calculator
//! - Error recovery records
//! - Domain-specific error types

pub mod error_record;
pub mod errors;
pub mod newtypes;
pub mod row;
pub mod state;
pub mod window;

// Re-export commonly used types
pub use error_record::{ErrorKind, ErrorRecord, Operation, OperationContext};
pub use errors::DomainError;
pub use newtypes::{ClientSlug, CustomerId};
pub use row::{CampaignRow, DataSource, DatasetRecord, RowKey};
pub use state::{ClientState, DataQuality, SourceState, ValidationReport, SCHEMA_VERSION};
pub use window::DateRange;
