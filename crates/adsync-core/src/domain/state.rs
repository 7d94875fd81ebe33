//! Per-client sync state
//!
//! One [`ClientState`] record exists per client slug. It is created by the
//! first `init`, mutated only by the engine while holding the client's lock,
//! and persisted as a whole (never patched in place).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::ClientSlug;
use super::row::DataSource;
use super::window::DateRange;

/// Dataset/state format version. Bump on breaking layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Sync bookkeeping for a single data source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    /// Last date known to be fully synced (inclusive)
    pub watermark_date: Option<NaiveDate>,
    /// When the last successful sync for this source finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

/// Outcome of the last schema validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub rows_checked: usize,
    pub errors: Vec<String>,
}

/// Data-quality counters maintained across merges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    pub last_validation_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_validation: Option<ValidationReport>,
    pub total_rows: u64,
    pub duplicate_rows_removed: u64,
    /// Unresolved ranges with no rows, within the dataset's date span
    pub date_gaps: Vec<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_append: Option<DateTime<Utc>>,
}

/// Persistent per-client sync metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub slug: ClientSlug,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub timezone: Option<String>,
    pub currency_code: Option<String>,
    pub sources: BTreeMap<DataSource, SourceState>,
    pub schema_version: u32,
    pub data_quality: DataQuality,
}

impl ClientState {
    /// Fresh state for a client that has never been synced
    #[must_use]
    pub fn new(slug: ClientSlug, now: DateTime<Utc>) -> Self {
        let sources = DataSource::ALL
            .into_iter()
            .map(|source| (source, SourceState::default()))
            .collect();

        Self {
            slug,
            created_at: now,
            last_updated: now,
            timezone: None,
            currency_code: None,
            sources,
            schema_version: SCHEMA_VERSION,
            data_quality: DataQuality::default(),
        }
    }

    /// Watermark for `source`, if one has been recorded
    #[must_use]
    pub fn watermark(&self, source: DataSource) -> Option<NaiveDate> {
        self.sources.get(&source).and_then(|s| s.watermark_date)
    }

    /// Mutable sub-record for `source`, created on demand
    pub fn source_mut(&mut self, source: DataSource) -> &mut SourceState {
        self.sources.entry(source).or_default()
    }

    /// Move the watermark for `source` to `date`, never backwards
    ///
    /// Returns the watermark now in effect.
    pub fn advance_watermark(
        &mut self,
        source: DataSource,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> NaiveDate {
        let entry = self.source_mut(source);
        let next = match entry.watermark_date {
            Some(current) if current > date => current,
            _ => date,
        };
        entry.watermark_date = Some(next);
        entry.last_sync_timestamp = Some(now);
        next
    }

    /// Replace the watermark unconditionally (used by `init`)
    pub fn reset_watermark(&mut self, source: DataSource, date: NaiveDate, now: DateTime<Utc>) {
        let entry = self.source_mut(source);
        entry.watermark_date = Some(date);
        entry.last_sync_timestamp = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slug() -> ClientSlug {
        ClientSlug::new("priority-roofing").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_new_state_has_all_sources_without_watermarks() {
        let state = ClientState::new(slug(), Utc::now());
        assert_eq!(state.sources.len(), 3);
        assert!(DataSource::ALL.iter().all(|s| state.watermark(*s).is_none()));
        assert_eq!(state.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_advance_watermark_is_monotonic() {
        let now = Utc.with_ymd_and_hms(2025, 9, 20, 0, 0, 0).unwrap();
        let mut state = ClientState::new(slug(), now);

        assert_eq!(state.advance_watermark(DataSource::GoogleAds, date("2025-09-10"), now), date("2025-09-10"));
        assert_eq!(state.advance_watermark(DataSource::GoogleAds, date("2025-09-05"), now), date("2025-09-10"));
        assert_eq!(state.advance_watermark(DataSource::GoogleAds, date("2025-09-19"), now), date("2025-09-19"));
        assert!(state.watermark(DataSource::GoogleLsa).is_none());
    }

    #[test]
    fn test_state_json_layout() {
        let now = Utc.with_ymd_and_hms(2025, 9, 20, 0, 0, 0).unwrap();
        let mut state = ClientState::new(slug(), now);
        state.reset_watermark(DataSource::GoogleAds, date("2025-09-19"), now);

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["slug"], "priority-roofing");
        assert_eq!(value["sources"]["google_ads"]["watermark_date"], "2025-09-19");
        assert!(value["sources"]["google_lsa"]["watermark_date"].is_null());
        assert_eq!(value["data_quality"]["total_rows"], 0);

        let back: ClientState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
