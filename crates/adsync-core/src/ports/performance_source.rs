//! Performance source port (driven/secondary port)
//!
//! The upstream advertising API is a black box to the engine: given a
//! customer and an inclusive date range it returns typed rows.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific;
//!   the engine classifies any error from this port as a fetch failure.
//! - Implementations must not retry internally. A failed chunk aborts the
//!   whole operation and is resumed with `repair`.

use async_trait::async_trait;

use crate::domain::{CampaignRow, CustomerId, DateRange};

/// Upstream source of daily performance rows
#[async_trait]
pub trait IPerformanceSource: Send + Sync {
    /// Fetch every row for `customer` with a date inside `range`
    ///
    /// # Arguments
    ///
    /// * `customer` - Advertising account to query
    /// * `range` - Inclusive date window, no wider than the configured chunk size
    async fn fetch(&self, customer: &CustomerId, range: DateRange) -> anyhow::Result<Vec<CampaignRow>>;
}
