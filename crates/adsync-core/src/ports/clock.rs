//! Clock port
//!
//! Window calculation depends on "yesterday" in the client's timezone.
//! Injecting the clock keeps windows reproducible in tests.

use chrono::{DateTime, Utc};

/// Source of the current instant
pub trait IClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// A clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl IClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
