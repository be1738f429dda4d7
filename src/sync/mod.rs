pub mod credentials;
pub mod gap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::date_util::{date_key, parse_date};
use crate::error::{Error, Result};
use crate::storage::repository::{self, MetricFamily};
use crate::storage::Database;

use gap::DateRange;

pub const LAST_SYNC_KEY: &str = "last_sync_date";

/// What a fetcher still needs to pull for one family.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyPlan {
    pub family: MetricFamily,
    pub missing_dates: Vec<NaiveDate>,
    pub ranges: Vec<DateRange>,
}

impl FamilyPlan {
    pub fn is_complete(&self) -> bool {
        self.missing_dates.is_empty()
    }
}

/// Date of the last successful sync. An unparsable stored value reads as
/// absent, which forces a resync.
pub async fn last_sync_date(db: &Database) -> Result<Option<NaiveDate>> {
    let stored = db
        .conn()
        .call(|conn| repository::get_metadata(conn, LAST_SYNC_KEY))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(stored.and_then(|s| match parse_date(&s) {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("Ignoring stored {LAST_SYNC_KEY}: {e}");
            None
        }
    }))
}

pub async fn set_last_sync_date(db: &Database, date: NaiveDate) -> Result<()> {
    let value = date_key(date);
    db.conn()
        .call(move |conn| repository::set_metadata(conn, LAST_SYNC_KEY, &value))
        .await
        .map_err(|e| {
            log::error!("Failed to record last sync date {date}: {e}");
            Error::Database(e.to_string())
        })
}

/// True when nothing has been synced yet or the last sync predates `today`.
pub async fn needs_sync(db: &Database, today: NaiveDate) -> Result<bool> {
    Ok(match last_sync_date(db).await? {
        Some(last) => last < today,
        None => true,
    })
}

/// Missing dates and month-aligned fetch ranges for each family.
pub async fn plan_sync(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
    families: &[MetricFamily],
) -> Result<Vec<FamilyPlan>> {
    let mut plans = Vec::with_capacity(families.len());
    for &family in families {
        let missing_dates = gap::missing_dates(db, start, end, family).await?;
        let ranges = gap::month_batches(&missing_dates);
        log::debug!(
            "{family}: {} missing date(s) in {} range(s)",
            missing_dates.len(),
            ranges.len()
        );
        plans.push(FamilyPlan {
            family,
            missing_dates,
            ranges,
        });
    }
    Ok(plans)
}
