use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a date as the `YYYY-MM-DD` key used by every cache table.
pub fn date_key(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` key.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate(s.to_string()))
}

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Every calendar date in `[start, end]`, ascending. Empty when `start > end`.
pub fn dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// The `days`-long window ending at (and including) `end`.
/// A zero-length window yields `start > end`, i.e. no dates. Windows
/// reaching past the earliest representable date start there.
pub fn trailing_window(end: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    if days == 0 {
        return match end.succ_opt() {
            Some(next) => (next, end),
            None => (end, end.pred_opt().unwrap_or(end)),
        };
    }
    let start = end
        .checked_sub_days(Days::new(u64::from(days) - 1))
        .unwrap_or(NaiveDate::MIN);
    (start, end)
}

/// The `days`-long window ending the day before `start`. `None` when
/// `start` is the earliest representable date.
pub fn preceding_window(start: NaiveDate, days: u32) -> Option<(NaiveDate, NaiveDate)> {
    start.pred_opt().map(|end| trailing_window(end, days))
}

/// Parse the session start timestamps emitted upstream
/// (`2023-10-27T23:30:00.000`, with or without fractional seconds).
pub fn parse_start_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
