//! adsync API - Reporting API client
//!
//! Provides an async HTTP adapter for the performance-source port:
//! - Bearer-token authenticated requests
//! - Campaign performance rows for a customer and date range
//! - Cost conversion from micros to currency units
//!
//! ## Modules
//!
//! - [`client`] - Reporting API HTTP client implementing `IPerformanceSource`

pub mod client;

use thiserror::Error;

/// Errors that can occur when talking to the reporting API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The bearer token environment variable is unset or empty
    #[error("API token not found in environment variable {0}")]
    MissingToken(String),

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The customer or endpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// Numeric HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
