//! Dataset merge engine
//!
//! ## Design Notes
//!
//! - Last write wins: rows are folded into a map keyed by the caller's key
//!   function, existing rows first, so an incoming row replaces an existing
//!   one with the same key and a later incoming row replaces an earlier one.
//! - The output is ordered by key. Identical inputs always produce an
//!   identical dataset, which is what makes `repair` byte-for-byte idempotent.
//! - Derived metrics are recomputed on every output row; values carried in
//!   from either side are never trusted.

use std::collections::{BTreeMap, BTreeSet};

use adsync_core::domain::{DataSource, DatasetRecord, DateRange};

/// Result of [`merge_rows`]
#[derive(Debug, Clone)]
pub struct MergeOutcome<R> {
    /// Deduplicated rows, ordered by key
    pub rows: Vec<R>,
    /// Input rows dropped because a later row had the same key
    pub duplicates_removed: u64,
}

/// Merge `incoming` into `existing`, keeping the last row seen per key
pub fn merge_rows<R, K, F>(existing: Vec<R>, incoming: Vec<R>, key_fn: F) -> MergeOutcome<R>
where
    R: DatasetRecord,
    K: Ord,
    F: Fn(&R) -> K,
{
    let total = existing.len() + incoming.len();
    let mut by_key: BTreeMap<K, R> = BTreeMap::new();

    for row in existing.into_iter().chain(incoming) {
        by_key.insert(key_fn(&row), row);
    }

    let rows: Vec<R> = by_key
        .into_values()
        .map(|mut row| {
            row.recompute_derived();
            row
        })
        .collect();

    MergeOutcome {
        duplicates_removed: (total - rows.len()) as u64,
        rows,
    }
}

/// Drop rows of `source` dated inside `range`
///
/// Used by `repair` so the re-fetched range fully replaces what was there,
/// including rows the upstream no longer reports.
pub fn remove_range<R: DatasetRecord>(rows: Vec<R>, source: DataSource, range: DateRange) -> Vec<R> {
    rows.into_iter()
        .filter(|row| !(row.data_source() == source && range.contains(row.date())))
        .collect()
}

/// Calendar ranges with no rows for `source` between its first and last date
pub fn date_gaps<R: DatasetRecord>(rows: &[R], source: DataSource) -> Vec<DateRange> {
    let dates: BTreeSet<_> = rows
        .iter()
        .filter(|row| row.data_source() == source)
        .map(DatasetRecord::date)
        .collect();
    DateRange::gaps_in(&dates)
}
