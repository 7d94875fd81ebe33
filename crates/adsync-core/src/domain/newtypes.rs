//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for client and customer
//! identifiers. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Maximum accepted slug length
const MAX_SLUG_LEN: usize = 64;

// ============================================================================
// ClientSlug
// ============================================================================

/// Stable identifier of a client account, e.g. `priority-roofing`
///
/// The slug is used to build every per-client path (state file, dataset
/// directory, lock file, error records), so it is restricted to lowercase
/// ASCII letters, digits and `-`. It may not start or end with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientSlug(String);

impl ClientSlug {
    /// Create a new ClientSlug, validating its character set
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSlug` if the slug is empty, too long,
    /// or contains characters outside `[a-z0-9-]`
    pub fn new(slug: impl Into<String>) -> Result<Self, DomainError> {
        let slug = slug.into();
        if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
            return Err(DomainError::InvalidSlug(slug));
        }
        let valid_chars = slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || slug.starts_with('-') || slug.ends_with('-') {
            return Err(DomainError::InvalidSlug(slug));
        }
        Ok(Self(slug))
    }

    /// Get the slug as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClientSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientSlug {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ClientSlug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientSlug> for String {
    fn from(slug: ClientSlug) -> Self {
        slug.0
    }
}

// ============================================================================
// CustomerId
// ============================================================================

/// Advertising account (customer) identifier
///
/// Accepts both the display form `413-902-2884` and the bare form
/// `4139022884`. The stored value keeps the caller's formatting; use
/// [`CustomerId::digits`] for API calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(String);

impl CustomerId {
    /// Create a new CustomerId
    ///
    /// # Errors
    /// Returns `DomainError::InvalidCustomerId` unless the value consists of
    /// exactly 10 digits, optionally grouped as `XXX-XXX-XXXX`
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        let digits: String = trimmed.chars().filter(|c| *c != '-').collect();

        let grouped_ok = !trimmed.contains('-') || {
            let parts: Vec<&str> = trimmed.split('-').collect();
            parts.len() == 3 && parts[0].len() == 3 && parts[1].len() == 3 && parts[2].len() == 4
        };

        if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) || !grouped_ok {
            return Err(DomainError::InvalidCustomerId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identifier with hyphens removed, as the upstream API expects
    #[must_use]
    pub fn digits(&self) -> String {
        self.0.chars().filter(|c| *c != '-').collect()
    }

    /// Get the identifier as originally configured
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CustomerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CustomerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CustomerId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CustomerId> for String {
    fn from(id: CustomerId) -> Self {
        id.0
    }
}
