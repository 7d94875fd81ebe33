//! Dataset rows
//!
//! A [`CampaignRow`] is one day of performance for one campaign from one
//! data source. Its identity is the [`RowKey`] `(date, entity_id,
//! data_source)`; the dataset holds at most one row per key.
//!
//! Derived metrics (CTR, average CPC, CPA, conversion rate) are never
//! trusted from input: [`DatasetRecord::recompute_derived`] rebuilds them
//! from the raw counters, yielding `None` whenever the denominator is zero.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// DataSource
// ============================================================================

/// Upstream source a row (and a watermark) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Search/display campaign performance
    GoogleAds,
    /// Local Services Ads leads
    GoogleLsa,
    /// Search term performance
    SearchTerms,
}

impl DataSource {
    /// All known sources, in state-file order
    pub const ALL: [DataSource; 3] = [Self::GoogleAds, Self::GoogleLsa, Self::SearchTerms];

    /// Wire/file name of the source
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleAds => "google_ads",
            Self::GoogleLsa => "google_lsa",
            Self::SearchTerms => "search_terms",
        }
    }
}

impl Display for DataSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| DomainError::UnknownDataSource(s.to_string()))
    }
}

// ============================================================================
// RowKey / DatasetRecord
// ============================================================================

/// Primary key of a dataset row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub date: NaiveDate,
    pub entity_id: String,
    pub data_source: DataSource,
}

/// Behaviour the merge pipeline needs from a row type
pub trait DatasetRecord {
    /// The row's `(date, entity_id, data_source)` key
    fn key(&self) -> RowKey;

    /// Calendar date the metrics belong to
    fn date(&self) -> NaiveDate;

    /// Source the row was fetched from
    fn data_source(&self) -> DataSource;

    /// Rebuild every derived metric from the raw counters
    fn recompute_derived(&mut self);
}

// ============================================================================
// CampaignRow
// ============================================================================

/// Daily campaign performance row
///
/// Field order is the column order of the persisted dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRow {
    pub data_source: DataSource,
    pub date: NaiveDate,
    pub campaign_id: String,
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub campaign_status: String,
    pub impressions: u64,
    pub clicks: u64,
    /// Spend in account currency units (not micros)
    pub cost: f64,
    pub conversions: f64,
    #[serde(default)]
    pub conversions_value: f64,
    #[serde(default)]
    pub all_conversions: f64,
    #[serde(default)]
    pub view_through_conversions: u64,
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub avg_cpc: Option<f64>,
    #[serde(default)]
    pub cpa: Option<f64>,
    #[serde(default)]
    pub conv_rate: Option<f64>,
    #[serde(default)]
    pub currency_code: String,
    #[serde(default)]
    pub schema_version: u32,
}

impl CampaignRow {
    /// Create a row with raw counters; derived metrics and enrichment
    /// fields start empty.
    #[must_use]
    pub fn new(
        data_source: DataSource,
        date: NaiveDate,
        campaign_id: impl Into<String>,
        impressions: u64,
        clicks: u64,
        cost: f64,
        conversions: f64,
    ) -> Self {
        Self {
            data_source,
            date,
            campaign_id: campaign_id.into(),
            campaign_name: String::new(),
            campaign_status: String::new(),
            impressions,
            clicks,
            cost,
            conversions,
            conversions_value: 0.0,
            all_conversions: 0.0,
            view_through_conversions: 0,
            ctr: None,
            avg_cpc: None,
            cpa: None,
            conv_rate: None,
            currency_code: String::new(),
            schema_version: 0,
        }
    }

    /// Set the campaign's display attributes
    #[must_use]
    pub fn with_campaign(mut self, name: impl Into<String>, status: impl Into<String>) -> Self {
        self.campaign_name = name.into();
        self.campaign_status = status.into();
        self
    }

    /// Stamp the client currency and current schema version
    pub fn enrich(&mut self, currency_code: &str, schema_version: u32) {
        self.currency_code = currency_code.to_string();
        self.schema_version = schema_version;
    }
}

impl DatasetRecord for CampaignRow {
    fn key(&self) -> RowKey {
        RowKey {
            date: self.date,
            entity_id: self.campaign_id.clone(),
            data_source: self.data_source,
        }
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn data_source(&self) -> DataSource {
        self.data_source
    }

    fn recompute_derived(&mut self) {
        let impressions = self.impressions as f64;
        let clicks = self.clicks as f64;

        self.ctr = ratio(clicks, impressions);
        self.avg_cpc = ratio(self.cost, clicks);
        self.cpa = ratio(self.cost, self.conversions);
        self.conv_rate = ratio(self.conversions, clicks);
    }
}

/// `numerator / denominator`, or `None` when the denominator is not positive
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}
