use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::date_util::{dates_in_range, last_day_of_month};
use crate::error::{Error, Result};
use crate::storage::repository::{self, MetricFamily};
use crate::storage::Database;

/// A date range [start, end] inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Dates in `[start, end]` that the store already holds for `family`.
pub async fn present_dates(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
    family: MetricFamily,
) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Ok(vec![]);
    }
    db.conn()
        .call(move |conn| repository::present_dates(conn, family, start, end))
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Dates in `[start, end]` the store lacks for `family`, ascending.
/// A sleep row only counts once its reality score is set.
pub async fn missing_dates(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
    family: MetricFamily,
) -> Result<Vec<NaiveDate>> {
    let present = present_dates(db, start, end, family).await?;
    Ok(subtract_dates(start, end, &present))
}

/// Missing dates grouped into contiguous runs, split at month boundaries
/// so each range can be fetched as one upstream batch.
pub async fn missing_ranges(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
    family: MetricFamily,
) -> Result<Vec<DateRange>> {
    let missing = missing_dates(db, start, end, family).await?;
    Ok(month_batches(&missing))
}

/// Every date in `[start, end]` not in `present` (which must be sorted).
pub fn subtract_dates(start: NaiveDate, end: NaiveDate, present: &[NaiveDate]) -> Vec<NaiveDate> {
    dates_in_range(start, end)
        .into_iter()
        .filter(|d| present.binary_search(d).is_err())
        .collect()
}

/// Group sorted dates into month-aligned contiguous ranges.
pub fn month_batches(dates: &[NaiveDate]) -> Vec<DateRange> {
    coalesce(dates)
        .into_iter()
        .flat_map(|r| split_into_months(r.start, r.end))
        .collect()
}

/// Merge sorted dates into runs of consecutive days.
fn coalesce(dates: &[NaiveDate]) -> Vec<DateRange> {
    let mut runs: Vec<DateRange> = Vec::new();
    for &d in dates {
        match runs.last_mut() {
            Some(last) if last.end.succ_opt().map_or(true, |next| d <= next) => {
                last.end = last.end.max(d);
            }
            _ => runs.push(DateRange { start: d, end: d }),
        }
    }
    runs
}

/// Split a range into month-aligned batches.
fn split_into_months(start: NaiveDate, end: NaiveDate) -> Vec<DateRange> {
    let mut batches = Vec::new();
    let mut cursor = start;

    while cursor <= end {
        let month_end = last_day_of_month(cursor.year(), cursor.month());
        let batch_end = month_end.min(end);

        batches.push(DateRange {
            start: cursor,
            end: batch_end,
        });

        match batch_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    batches
}
