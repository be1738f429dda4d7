pub mod date_util;
pub mod error;
pub mod metrics;
pub mod models;
pub mod query;
pub mod storage;
pub mod sync;
pub mod tools;

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

pub use error::{Error, Result};
pub use metrics::{
    Correlation, Derived, Metric, Readiness, ReadinessBreakdown, SleepConsistency, SleepGrade,
    SleepLogEntry, Trend, ZoneSummary,
};
pub use models::{Activity, AdvancedMetrics, CardioFitness, DailyMetrics, SleepSummary};
pub use query::{QueryOutcome, TableSchema};
pub use storage::repository::{FamilyStats, LifetimeStats, MetricFamily};
pub use storage::Database;
pub use sync::gap::DateRange;
pub use sync::FamilyPlan;

use storage::repository;

/// Main entry point for the health-data cache.
pub struct HealthDW {
    db: Database,
}

impl HealthDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run one upsert. Failures are logged with the record that was being
    /// written and returned to the caller.
    async fn write<T>(
        &self,
        kind: &'static str,
        record: &T,
        upsert: fn(&Connection, &T) -> std::result::Result<(), rusqlite::Error>,
    ) -> Result<()>
    where
        T: Clone + fmt::Debug + Send + 'static,
    {
        let record = record.clone();
        self.db
            .conn()
            .call(move |conn| {
                upsert(conn, &record).map_err(|e| format!("{e} (writing {kind} {record:?})"))
            })
            .await
            .map_err(|e| {
                log::error!("Failed to write {kind}: {e}");
                Error::Database(e.to_string())
            })
    }

    // ── Store ──────────────────────────────────────────────────────

    pub async fn put_daily_metrics(&self, m: &DailyMetrics) -> Result<()> {
        self.write("daily metrics", m, repository::upsert_daily_metrics)
            .await
    }

    pub async fn daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>> {
        self.db
            .conn()
            .call(move |conn| repository::get_daily_metrics(conn, date))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn put_sleep(&self, s: &SleepSummary) -> Result<()> {
        self.write("sleep", s, repository::upsert_sleep).await
    }

    pub async fn sleep(&self, date: NaiveDate) -> Result<Option<SleepSummary>> {
        self.db
            .conn()
            .call(move |conn| repository::get_sleep(conn, date))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn put_advanced_metrics(&self, m: &AdvancedMetrics) -> Result<()> {
        self.write("advanced metrics", m, repository::upsert_advanced_metrics)
            .await
    }

    pub async fn advanced_metrics(&self, date: NaiveDate) -> Result<Option<AdvancedMetrics>> {
        self.db
            .conn()
            .call(move |conn| repository::get_advanced_metrics(conn, date))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn put_cardio_fitness(&self, m: &CardioFitness) -> Result<()> {
        self.write("cardio fitness", m, repository::upsert_cardio_fitness)
            .await
    }

    pub async fn cardio_fitness(&self, date: NaiveDate) -> Result<Option<CardioFitness>> {
        self.db
            .conn()
            .call(move |conn| repository::get_cardio_fitness(conn, date))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn put_activity(&self, a: &Activity) -> Result<()> {
        self.write("activity", a, repository::upsert_activity).await
    }

    pub async fn activity(&self, activity_id: &str) -> Result<Option<Activity>> {
        let activity_id = activity_id.to_string();
        self.db
            .conn()
            .call(move |conn| repository::get_activity(conn, &activity_id))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// All activities on `date`.
    pub async fn activities(&self, date: NaiveDate) -> Result<Vec<Activity>> {
        self.db
            .conn()
            .call(move |conn| repository::get_activities(conn, date))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn activities_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Activity>> {
        self.db
            .conn()
            .call(move |conn| repository::get_activities_in_range(conn, start, end))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Gap detection ──────────────────────────────────────────────

    pub async fn missing_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        family: MetricFamily,
    ) -> Result<Vec<NaiveDate>> {
        sync::gap::missing_dates(&self.db, start, end, family).await
    }

    pub async fn present_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        family: MetricFamily,
    ) -> Result<Vec<NaiveDate>> {
        sync::gap::present_dates(&self.db, start, end, family).await
    }

    pub async fn missing_ranges(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        family: MetricFamily,
    ) -> Result<Vec<DateRange>> {
        sync::gap::missing_ranges(&self.db, start, end, family).await
    }

    pub async fn plan_sync(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        families: &[MetricFamily],
    ) -> Result<Vec<FamilyPlan>> {
        sync::plan_sync(&self.db, start, end, families).await
    }

    // ── Derived metrics ────────────────────────────────────────────

    pub async fn readiness(&self, date: NaiveDate) -> Result<Derived<Readiness>> {
        metrics::compute_readiness(&self.db, date).await
    }

    pub async fn sleep_consistency(
        &self,
        as_of: NaiveDate,
        days: u32,
    ) -> Result<Derived<SleepConsistency>> {
        metrics::compute_sleep_consistency(&self.db, as_of, days).await
    }

    pub async fn trend(
        &self,
        metric: Metric,
        recent_days: u32,
        baseline_days: u32,
        as_of: NaiveDate,
    ) -> Result<Derived<Trend>> {
        metrics::compute_trend(&self.db, metric, recent_days, baseline_days, as_of).await
    }

    pub async fn correlation(
        &self,
        metric_a: Metric,
        metric_b: Metric,
        days: u32,
        as_of: NaiveDate,
    ) -> Result<Derived<Correlation>> {
        metrics::compute_correlation(&self.db, metric_a, metric_b, days, as_of).await
    }

    pub async fn metric_series(
        &self,
        metric: Metric,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        metrics::metric_series(&self.db, metric, start, end).await
    }

    pub async fn zone_summary(&self, start: NaiveDate, end: NaiveDate) -> Result<ZoneSummary> {
        metrics::compute_zone_summary(&self.db, start, end).await
    }

    pub async fn sleep_log(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<SleepLogEntry>> {
        metrics::compute_sleep_log(&self.db, start, end).await
    }

    pub async fn lifetime_stats(&self) -> Result<LifetimeStats> {
        self.db
            .conn()
            .call(|conn| repository::lifetime_stats(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Query ──────────────────────────────────────────────────────

    pub async fn inspect_schema(&self) -> Result<Vec<TableSchema>> {
        query::inspect_schema(&self.db).await
    }

    pub async fn run_read_query(&self, sql: &str) -> Result<QueryOutcome> {
        query::run_read_query(&self.db, sql).await
    }

    // ── Sync bookkeeping ───────────────────────────────────────────

    pub async fn last_sync_date(&self) -> Result<Option<NaiveDate>> {
        sync::last_sync_date(&self.db).await
    }

    pub async fn set_last_sync_date(&self, date: NaiveDate) -> Result<()> {
        sync::set_last_sync_date(&self.db, date).await
    }

    pub async fn needs_sync(&self, today: NaiveDate) -> Result<bool> {
        sync::needs_sync(&self.db, today).await
    }

    pub async fn store_credential(&self, token: &str, ttl: chrono::Duration) -> Result<()> {
        sync::credentials::store_credential(&self.db, token, ttl).await
    }

    pub async fn get_credential(&self) -> Result<Option<String>> {
        sync::credentials::get_credential(&self.db).await
    }

    pub async fn credential_expiry(&self) -> Result<Option<DateTime<Utc>>> {
        sync::credentials::credential_expiry(&self.db).await
    }

    pub async fn credential_expired(&self, now: DateTime<Utc>) -> Result<bool> {
        sync::credentials::credential_expired(&self.db, now).await
    }

    // ── Maintenance ────────────────────────────────────────────────

    /// Per-family record counts and date spans.
    pub async fn cache_stats(&self) -> Result<Vec<FamilyStats>> {
        self.db
            .conn()
            .call(|conn| {
                let conn: &Connection = conn;
                MetricFamily::ALL
                    .into_iter()
                    .map(|family| repository::family_stats(conn, family))
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Delete all metric rows. Sync date and credentials are kept.
    pub async fn flush_metrics(&self) -> Result<()> {
        self.db
            .conn()
            .call(|conn| repository::clear_metrics(conn))
            .await
            .map_err(|e| {
                log::error!("Failed to flush cached metrics: {e}");
                Error::Database(e.to_string())
            })?;
        log::info!("Flushed all cached metrics");
        Ok(())
    }

    /// Delete everything, credentials included.
    pub async fn flush_all(&self) -> Result<()> {
        self.db
            .conn()
            .call(|conn| repository::clear_all(conn))
            .await
            .map_err(|e| {
                log::error!("Failed to flush cache and metadata: {e}");
                Error::Database(e.to_string())
            })?;
        log::info!("Flushed all cached metrics and metadata");
        Ok(())
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .conn()
            .call({
                let key = key.to_string();
                move |conn| repository::get_metadata(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .conn()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_metadata(conn, &key, &value)
            })
            .await
            .map_err(|e| {
                log::error!("Failed to set config {key} = {value}: {e}");
                Error::Database(format!("{e} (setting {key})"))
            })
    }

    pub async fn config_delete(&self, key: &str) -> Result<bool> {
        self.db
            .conn()
            .call({
                let key = key.to_string();
                move |conn| repository::delete_metadata(conn, &key)
            })
            .await
            .map_err(|e| {
                log::error!("Failed to delete config {key}: {e}");
                Error::Database(format!("{e} (deleting {key})"))
            })
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .conn()
            .call(|conn| repository::list_metadata(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
