//! Date windows and the window calculator
//!
//! All window math works on calendar dates ([`NaiveDate`]) in the client's
//! configured timezone. "Yesterday" is always yesterday *for the client*,
//! so a run at 01:00 UTC for a Chicago client still targets the Chicago
//! calendar day before.
//!
//! Ranges are inclusive on both ends. A range whose start is after its end
//! is empty; chunking an empty range yields no windows.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Date format used on the wire, in file names and on the command line
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range. `start > end` is allowed and denotes an empty range.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse a range from two `YYYY-MM-DD` strings
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDate` if either date fails to parse
    pub fn parse(start: &str, end: &str) -> Result<Self, DomainError> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    /// Whether the range covers no days
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of calendar days covered, counting both ends
    #[must_use]
    pub fn days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    /// Whether `date` falls inside the range
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Split into consecutive sub-windows of at most `chunk_days` days
    ///
    /// The chunks cover the whole range with no gaps and no overlaps, in
    /// ascending order. A `chunk_days` of zero is treated as one day.
    #[must_use]
    pub fn chunk(&self, chunk_days: u32) -> Vec<DateRange> {
        let step = Duration::days(i64::from(chunk_days.max(1)) - 1);
        let mut chunks = Vec::new();
        let mut current = self.start;

        while current <= self.end {
            let chunk_end = (current + step).min(self.end);
            chunks.push(DateRange::new(current, chunk_end));
            match chunk_end.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        chunks
    }

    /// Calendar ranges inside `[min(dates), max(dates)]` with no date present
    #[must_use]
    pub fn gaps_in(dates: &BTreeSet<NaiveDate>) -> Vec<DateRange> {
        let mut gaps = Vec::new();
        let mut previous: Option<NaiveDate> = None;

        for &date in dates {
            if let Some(prev) = previous {
                if (date - prev).num_days() > 1 {
                    gaps.push(DateRange::new(
                        prev + Duration::days(1),
                        date - Duration::days(1),
                    ));
                }
            }
            previous = Some(date);
        }
        gaps
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Parse a `YYYY-MM-DD` date
///
/// # Errors
/// Returns `DomainError::InvalidDate` on malformed input
pub fn parse_date(s: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| DomainError::InvalidDate(s.to_string()))
}

/// Resolve an IANA timezone name such as `America/Chicago`
///
/// # Errors
/// Returns `DomainError::UnknownTimezone` for unrecognised names
pub fn parse_timezone(name: &str) -> Result<Tz, DomainError> {
    name.parse::<Tz>()
        .map_err(|_| DomainError::UnknownTimezone(name.to_string()))
}

/// The client's local "yesterday" at instant `now`
#[must_use]
pub fn yesterday_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    let today = now.with_timezone(&tz).date_naive();
    today.pred_opt().unwrap_or(today)
}

/// Window for the one-time historical backfill
///
/// End is the client's yesterday; start is `history_years` calendar years
/// before it (Feb 29 clamps to Feb 28).
#[must_use]
pub fn backfill_window(history_years: u32, tz: Tz, now: DateTime<Utc>) -> DateRange {
    let end = yesterday_in(tz, now);
    let start = end
        .checked_sub_months(Months::new(history_years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN);
    DateRange::new(start, end)
}

/// Window for an incremental append
///
/// Starts `overlap_days` before the watermark to re-fetch late or corrected
/// upstream data. Without a watermark, pulls the last `max_window_days`.
/// The span from start to yesterday never exceeds `max_window_days`.
#[must_use]
pub fn append_window(
    watermark: Option<NaiveDate>,
    overlap_days: u32,
    max_window_days: u32,
    tz: Tz,
    now: DateTime<Utc>,
) -> DateRange {
    let end = yesterday_in(tz, now);
    let max_span = Duration::days(i64::from(max_window_days));

    let mut start = match watermark {
        Some(mark) => mark - Duration::days(i64::from(overlap_days)),
        None => end - max_span,
    };

    if end - start > max_span {
        start = end - max_span;
    }

    DateRange::new(start, end)
}
