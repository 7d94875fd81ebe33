//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier validation and malformed date ranges.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Client slug contains characters outside `[a-z0-9-]` or is empty
    #[error("Invalid client slug: {0}")]
    InvalidSlug(String),

    /// Customer ID is not a 10-digit account number
    #[error("Invalid customer ID: {0}")]
    InvalidCustomerId(String),

    /// Date string could not be parsed as `YYYY-MM-DD`
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Timezone name is not a known IANA zone
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Data source tag is not recognised
    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),
}
