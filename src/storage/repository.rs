use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::date_util::{date_key, DATE_FORMAT};
use crate::models::{Activity, AdvancedMetrics, CardioFitness, DailyMetrics, SleepSummary};

/// The five metric families the cache stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Daily,
    Sleep,
    Advanced,
    CardioFitness,
    Activities,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 5] = [
        MetricFamily::Daily,
        MetricFamily::Sleep,
        MetricFamily::Advanced,
        MetricFamily::CardioFitness,
        MetricFamily::Activities,
    ];

    pub fn table(self) -> &'static str {
        match self {
            MetricFamily::Daily => "daily_metrics_cache",
            MetricFamily::Sleep => "sleep_cache",
            MetricFamily::Advanced => "advanced_metrics_cache",
            MetricFamily::CardioFitness => "cardio_fitness_cache",
            MetricFamily::Activities => "activities_cache",
        }
    }

    /// SQL condition a row must meet to count as cached. Sleep rows only
    /// count once their reality score is known.
    fn present_condition(self) -> &'static str {
        match self {
            MetricFamily::Sleep => "reality_score IS NOT NULL",
            _ => "1 = 1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "daily_metrics" => Some(MetricFamily::Daily),
            "sleep" => Some(MetricFamily::Sleep),
            "advanced" | "advanced_metrics" => Some(MetricFamily::Advanced),
            "cardio" | "cardio_fitness" | "vo2max" => Some(MetricFamily::CardioFitness),
            "activities" | "activity" | "workouts" => Some(MetricFamily::Activities),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MetricFamily::Daily => "daily",
            MetricFamily::Sleep => "sleep",
            MetricFamily::Advanced => "advanced",
            MetricFamily::CardioFitness => "cardio_fitness",
            MetricFamily::Activities => "activities",
        };
        f.write_str(s)
    }
}

/// Read a `YYYY-MM-DD` column into a `NaiveDate`.
pub(crate) fn date_col(row: &Row<'_>, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ── Daily metrics ──────────────────────────────────────────────────

pub fn upsert_daily_metrics(conn: &Connection, m: &DailyMetrics) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO daily_metrics_cache (
            date, resting_heart_rate, steps, weight, body_fat, spo2, calories,
            distance, floors, fat_burn_minutes, cardio_minutes, peak_minutes,
            active_zone_minutes, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, CURRENT_TIMESTAMP)",
        params![
            date_key(m.date),
            m.resting_heart_rate,
            m.steps,
            m.weight,
            m.body_fat,
            m.spo2,
            m.calories,
            m.distance,
            m.floors,
            m.fat_burn_minutes,
            m.cardio_minutes,
            m.peak_minutes,
            m.active_zone_minutes,
        ],
    )?;
    Ok(())
}

pub fn get_daily_metrics(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Option<DailyMetrics>, rusqlite::Error> {
    conn.query_row(
        "SELECT date, resting_heart_rate, steps, weight, body_fat, spo2, calories,
                distance, floors, fat_burn_minutes, cardio_minutes, peak_minutes,
                active_zone_minutes
         FROM daily_metrics_cache WHERE date = ?1",
        params![date_key(date)],
        |row| {
            Ok(DailyMetrics {
                date: date_col(row, 0)?,
                resting_heart_rate: row.get(1)?,
                steps: row.get(2)?,
                weight: row.get(3)?,
                body_fat: row.get(4)?,
                spo2: row.get(5)?,
                calories: row.get(6)?,
                distance: row.get(7)?,
                floors: row.get(8)?,
                fat_burn_minutes: row.get(9)?,
                cardio_minutes: row.get(10)?,
                peak_minutes: row.get(11)?,
                active_zone_minutes: row.get(12)?,
            })
        },
    )
    .optional()
}

// ── Sleep ──────────────────────────────────────────────────────────

pub fn upsert_sleep(conn: &Connection, s: &SleepSummary) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO sleep_cache (
            date, reality_score, sleep_score, efficiency, total_sleep, deep_minutes,
            light_minutes, rem_minutes, wake_minutes, start_time, sleep_data_json,
            last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, CURRENT_TIMESTAMP)",
        params![
            date_key(s.date),
            s.reality_score,
            s.sleep_score,
            s.efficiency,
            s.total_sleep,
            s.deep_minutes,
            s.light_minutes,
            s.rem_minutes,
            s.wake_minutes,
            s.start_time,
            s.raw_payload,
        ],
    )?;
    Ok(())
}

const SLEEP_COLUMNS: &str = "date, reality_score, sleep_score, efficiency, total_sleep,
    deep_minutes, light_minutes, rem_minutes, wake_minutes, start_time, sleep_data_json";

fn sleep_from_row(row: &Row<'_>) -> Result<SleepSummary, rusqlite::Error> {
    Ok(SleepSummary {
        date: date_col(row, 0)?,
        reality_score: row.get(1)?,
        sleep_score: row.get(2)?,
        efficiency: row.get(3)?,
        total_sleep: row.get(4)?,
        deep_minutes: row.get(5)?,
        light_minutes: row.get(6)?,
        rem_minutes: row.get(7)?,
        wake_minutes: row.get(8)?,
        start_time: row.get(9)?,
        raw_payload: row.get(10)?,
    })
}

pub fn get_sleep(conn: &Connection, date: NaiveDate) -> Result<Option<SleepSummary>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {SLEEP_COLUMNS} FROM sleep_cache WHERE date = ?1"),
        params![date_key(date)],
        sleep_from_row,
    )
    .optional()
}

/// Sleep rows with `start <= date <= end`, ascending. Partial rows included.
pub fn get_sleep_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SleepSummary>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLEEP_COLUMNS} FROM sleep_cache WHERE date >= ?1 AND date <= ?2 ORDER BY date"
    ))?;
    let rows = stmt.query_map(params![date_key(start), date_key(end)], sleep_from_row)?;
    rows.collect()
}

// ── Advanced metrics ───────────────────────────────────────────────

pub fn upsert_advanced_metrics(
    conn: &Connection,
    m: &AdvancedMetrics,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO advanced_metrics_cache (
            date, hrv, breathing_rate, temperature, last_updated
        ) VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)",
        params![date_key(m.date), m.hrv, m.breathing_rate, m.skin_temperature],
    )?;
    Ok(())
}

pub fn get_advanced_metrics(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Option<AdvancedMetrics>, rusqlite::Error> {
    conn.query_row(
        "SELECT date, hrv, breathing_rate, temperature
         FROM advanced_metrics_cache WHERE date = ?1",
        params![date_key(date)],
        |row| {
            Ok(AdvancedMetrics {
                date: date_col(row, 0)?,
                hrv: row.get(1)?,
                breathing_rate: row.get(2)?,
                skin_temperature: row.get(3)?,
            })
        },
    )
    .optional()
}

// ── Cardio fitness ─────────────────────────────────────────────────

pub fn upsert_cardio_fitness(conn: &Connection, m: &CardioFitness) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO cardio_fitness_cache (date, vo2_max, last_updated)
         VALUES (?1, ?2, CURRENT_TIMESTAMP)",
        params![date_key(m.date), m.vo2_max],
    )?;
    Ok(())
}

pub fn get_cardio_fitness(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Option<CardioFitness>, rusqlite::Error> {
    conn.query_row(
        "SELECT date, vo2_max FROM cardio_fitness_cache WHERE date = ?1",
        params![date_key(date)],
        |row| {
            Ok(CardioFitness {
                date: date_col(row, 0)?,
                vo2_max: row.get(1)?,
            })
        },
    )
    .optional()
}

// ── Activities ─────────────────────────────────────────────────────

const ACTIVITY_COLUMNS: &str = "activity_id, date, activity_name, duration_ms, calories,
    average_heart_rate, steps, distance, start_time, activity_data_json";

fn activity_from_row(row: &Row<'_>) -> Result<Activity, rusqlite::Error> {
    Ok(Activity {
        activity_id: row.get(0)?,
        date: date_col(row, 1)?,
        name: row.get(2)?,
        duration_ms: row.get(3)?,
        calories: row.get(4)?,
        average_heart_rate: row.get(5)?,
        steps: row.get(6)?,
        distance: row.get(7)?,
        start_time: row.get(8)?,
        raw_payload: row.get(9)?,
    })
}

pub fn upsert_activity(conn: &Connection, a: &Activity) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO activities_cache (
            activity_id, date, activity_name, duration_ms, calories,
            average_heart_rate, steps, distance, start_time, activity_data_json,
            last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)",
        params![
            a.activity_id,
            date_key(a.date),
            a.name,
            a.duration_ms,
            a.calories,
            a.average_heart_rate,
            a.steps,
            a.distance,
            a.start_time,
            a.raw_payload,
        ],
    )?;
    Ok(())
}

pub fn get_activity(conn: &Connection, activity_id: &str) -> Result<Option<Activity>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {ACTIVITY_COLUMNS} FROM activities_cache WHERE activity_id = ?1"),
        params![activity_id],
        activity_from_row,
    )
    .optional()
}

pub fn get_activities(conn: &Connection, date: NaiveDate) -> Result<Vec<Activity>, rusqlite::Error> {
    get_activities_in_range(conn, date, date)
}

/// Activities with `start <= date <= end`, oldest first.
pub fn get_activities_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Activity>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activities_cache
         WHERE date >= ?1 AND date <= ?2
         ORDER BY date, start_time, activity_id"
    ))?;
    let rows = stmt.query_map(params![date_key(start), date_key(end)], activity_from_row)?;
    rows.collect()
}

// ── Presence ───────────────────────────────────────────────────────

/// Dates in `[start, end]` that count as cached for `family`, ascending.
pub fn present_dates(
    conn: &Connection,
    family: MetricFamily,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT date FROM {} WHERE date >= ?1 AND date <= ?2 AND {} ORDER BY date",
        family.table(),
        family.present_condition()
    ))?;
    let rows = stmt.query_map(params![date_key(start), date_key(end)], |row| date_col(row, 0))?;
    rows.collect()
}

/// Cached rows, distinct dates and their span for one family. Only
/// activities can have more records than days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyStats {
    pub family: MetricFamily,
    pub records: u64,
    pub days: u64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

pub fn family_stats(conn: &Connection, family: MetricFamily) -> Result<FamilyStats, rusqlite::Error> {
    let sql = match family {
        MetricFamily::Activities => {
            "SELECT COUNT(*), COUNT(DISTINCT date), MIN(date), MAX(date) FROM activities_cache"
                .to_string()
        }
        _ => format!(
            "SELECT COUNT(*), COUNT(DISTINCT date), MIN(date), MAX(date) FROM {} WHERE {}",
            family.table(),
            family.present_condition()
        ),
    };
    conn.query_row(&sql, [], |row| {
        Ok(FamilyStats {
            family,
            records: row.get::<_, i64>(0)? as u64,
            days: row.get::<_, i64>(1)? as u64,
            first_date: row.get(2)?,
            last_date: row.get(3)?,
        })
    })
}

// ── Metadata ───────────────────────────────────────────────────────

pub fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM cache_metadata WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map(|opt| opt.flatten())
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO cache_metadata (key, value, last_updated)
         VALUES (?1, ?2, CURRENT_TIMESTAMP)",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_metadata(conn: &Connection, key: &str) -> Result<bool, rusqlite::Error> {
    let count = conn.execute("DELETE FROM cache_metadata WHERE key = ?1", params![key])?;
    Ok(count > 0)
}

pub fn list_metadata(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT key, COALESCE(value, '') FROM cache_metadata ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Flush ──────────────────────────────────────────────────────────

/// Delete every metric row. Metadata (sync date, credentials) survives.
pub fn clear_metrics(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    for family in MetricFamily::ALL {
        tx.execute(&format!("DELETE FROM {}", family.table()), [])?;
    }
    tx.commit()
}

/// Delete every metric row and all metadata, credentials included.
pub fn clear_all(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    for family in MetricFamily::ALL {
        tx.execute(&format!("DELETE FROM {}", family.table()), [])?;
    }
    tx.execute("DELETE FROM cache_metadata", [])?;
    tx.commit()
}

// ── Aggregates ─────────────────────────────────────────────────────

/// Totals over every cached day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LifetimeStats {
    pub steps: i64,
    pub distance: f64,
    pub floors: i64,
    pub days: i64,
}

pub fn lifetime_stats(conn: &Connection) -> Result<LifetimeStats, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(SUM(steps), 0), COALESCE(SUM(distance), 0.0),
                COALESCE(SUM(floors), 0), COUNT(date)
         FROM daily_metrics_cache",
        [],
        |row| {
            Ok(LifetimeStats {
                steps: row.get(0)?,
                distance: row.get(1)?,
                floors: row.get(2)?,
                days: row.get(3)?,
            })
        },
    )
}

/// Heart-rate zone minutes for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDay {
    pub date: NaiveDate,
    pub fat_burn_minutes: i64,
    pub cardio_minutes: i64,
    pub peak_minutes: i64,
    pub active_zone_minutes: Option<i64>,
}

pub fn zone_days(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ZoneDay>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT date, COALESCE(fat_burn_minutes, 0), COALESCE(cardio_minutes, 0),
                COALESCE(peak_minutes, 0), active_zone_minutes
         FROM daily_metrics_cache
         WHERE date >= ?1 AND date <= ?2
         ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(params![date_key(start), date_key(end)], |row| {
        Ok(ZoneDay {
            date: date_col(row, 0)?,
            fat_burn_minutes: row.get(1)?,
            cardio_minutes: row.get(2)?,
            peak_minutes: row.get(3)?,
            active_zone_minutes: row.get(4)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn run(d: NaiveDate, id: &str, start: &str) -> Activity {
        Activity {
            activity_id: id.to_string(),
            date: d,
            name: Some("Run".to_string()),
            duration_ms: Some(1_800_000),
            calories: Some(320),
            average_heart_rate: Some(148),
            steps: Some(4800),
            distance: Some(5.1),
            start_time: Some(start.to_string()),
            raw_payload: Some(r#"{"logId": 1}"#.to_string()),
        }
    }

    #[tokio::test]
    async fn test_daily_metrics_round_trip_and_overwrite() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                let mut m = DailyMetrics::new(d(2024, 4, 1));
                m.resting_heart_rate = Some(57);
                m.steps = Some(10_432);
                m.weight = Some(81.2);
                m.body_fat = Some(18.5);
                m.active_zone_minutes = Some(42);
                upsert_daily_metrics(conn, &m)?;
                assert_eq!(get_daily_metrics(conn, m.date)?, Some(m.clone()));

                // A second write replaces the row; unspecified fields become NULL.
                let mut second = DailyMetrics::new(d(2024, 4, 1));
                second.steps = Some(3_000);
                upsert_daily_metrics(conn, &second)?;
                let stored = get_daily_metrics(conn, m.date)?.unwrap();
                assert_eq!(stored, second);
                assert_eq!(stored.weight, None);

                assert_eq!(get_daily_metrics(conn, d(2024, 4, 2))?, None);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sleep_advanced_cardio_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                let mut s = SleepSummary::new(d(2024, 4, 2));
                s.reality_score = Some(78);
                s.sleep_score = Some(84);
                s.efficiency = Some(92);
                s.total_sleep = Some(421);
                s.deep_minutes = Some(71);
                s.light_minutes = Some(240);
                s.rem_minutes = Some(110);
                s.wake_minutes = Some(38);
                s.start_time = Some("2024-04-01T23:12:00.000".to_string());
                s.raw_payload = Some(r#"{"isMainSleep":true}"#.to_string());
                upsert_sleep(conn, &s)?;
                assert_eq!(get_sleep(conn, s.date)?, Some(s));

                let a = AdvancedMetrics {
                    date: d(2024, 4, 2),
                    hrv: Some(48.3),
                    breathing_rate: Some(14.2),
                    skin_temperature: Some(-0.3),
                };
                upsert_advanced_metrics(conn, &a)?;
                assert_eq!(get_advanced_metrics(conn, a.date)?, Some(a));

                let c = CardioFitness { date: d(2024, 4, 2), vo2_max: Some(46.0) };
                upsert_cardio_fitness(conn, &c)?;
                assert_eq!(get_cardio_fitness(conn, c.date)?, Some(c));
                assert_eq!(get_cardio_fitness(conn, d(2024, 4, 3))?, None);

                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_activities_by_date_and_range() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                upsert_activity(conn, &run(d(2024, 4, 1), "a2", "2024-04-01T18:00:00"))?;
                upsert_activity(conn, &run(d(2024, 4, 1), "a1", "2024-04-01T07:00:00"))?;
                upsert_activity(conn, &run(d(2024, 4, 3), "a3", "2024-04-03T07:00:00"))?;

                let day = get_activities(conn, d(2024, 4, 1))?;
                let ids: Vec<&str> = day.iter().map(|a| a.activity_id.as_str()).collect();
                assert_eq!(ids, vec!["a1", "a2"]);

                let range = get_activities_in_range(conn, d(2024, 4, 1), d(2024, 4, 3))?;
                assert_eq!(range.len(), 3);
                assert!(get_activities(conn, d(2024, 4, 2))?.is_empty());

                // Re-fetch with the same id replaces the row.
                let mut again = run(d(2024, 4, 1), "a1", "2024-04-01T07:00:00");
                again.calories = Some(350);
                upsert_activity(conn, &again)?;
                assert_eq!(get_activity(conn, "a1")?.unwrap().calories, Some(350));
                assert_eq!(get_activities(conn, d(2024, 4, 1))?.len(), 2);

                let stats = family_stats(conn, MetricFamily::Activities)?;
                assert_eq!((stats.records, stats.days), (3, 2));
                assert_eq!(stats.first_date.as_deref(), Some("2024-04-01"));
                assert_eq!(stats.last_date.as_deref(), Some("2024-04-03"));

                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sleep_presence_requires_reality_score() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                let mut partial = SleepSummary::new(d(2024, 4, 1));
                partial.sleep_score = Some(80);
                upsert_sleep(conn, &partial)?;

                let mut full = SleepSummary::new(d(2024, 4, 2));
                full.reality_score = Some(75);
                upsert_sleep(conn, &full)?;

                let present = present_dates(conn, MetricFamily::Sleep, d(2024, 4, 1), d(2024, 4, 3))?;
                assert_eq!(present, vec![d(2024, 4, 2)]);

                let stats = family_stats(conn, MetricFamily::Sleep)?;
                assert_eq!(stats.records, 1);
                assert_eq!(stats.first_date.as_deref(), Some("2024-04-02"));
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                assert_eq!(get_metadata(conn, "last_sync_date")?, None);
                set_metadata(conn, "last_sync_date", "2024-04-01")?;
                set_metadata(conn, "last_sync_date", "2024-04-02")?;
                assert_eq!(get_metadata(conn, "last_sync_date")?, Some("2024-04-02".into()));
                assert_eq!(list_metadata(conn)?.len(), 1);
                assert!(delete_metadata(conn, "last_sync_date")?);
                assert!(!delete_metadata(conn, "last_sync_date")?);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clear_metrics_keeps_metadata() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                upsert_daily_metrics(conn, &DailyMetrics::new(d(2024, 4, 1)))?;
                upsert_activity(conn, &run(d(2024, 4, 1), "a1", "2024-04-01T07:00:00"))?;
                set_metadata(conn, "last_sync_date", "2024-04-01")?;

                clear_metrics(conn)?;
                assert_eq!(get_daily_metrics(conn, d(2024, 4, 1))?, None);
                assert_eq!(get_activity(conn, "a1")?, None);
                assert_eq!(get_metadata(conn, "last_sync_date")?, Some("2024-04-01".into()));

                clear_all(conn)?;
                assert_eq!(get_metadata(conn, "last_sync_date")?, None);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lifetime_and_zones() {
        let db = Database::open_memory().await.unwrap();

        db.conn()
            .call(|conn| {
                assert_eq!(lifetime_stats(conn)?, LifetimeStats::default());

                let mut a = DailyMetrics::new(d(2024, 4, 1));
                a.steps = Some(8000);
                a.distance = Some(6.0);
                a.floors = Some(10);
                a.fat_burn_minutes = Some(20);
                a.cardio_minutes = Some(5);
                a.active_zone_minutes = Some(30);
                upsert_daily_metrics(conn, &a)?;

                let mut b = DailyMetrics::new(d(2024, 4, 2));
                b.steps = Some(2000);
                upsert_daily_metrics(conn, &b)?;

                let stats = lifetime_stats(conn)?;
                assert_eq!(stats.steps, 10_000);
                assert_eq!(stats.floors, 10);
                assert_eq!(stats.days, 2);

                let zones = zone_days(conn, d(2024, 4, 1), d(2024, 4, 2))?;
                assert_eq!(zones.len(), 2);
                assert_eq!(zones[0].fat_burn_minutes, 20);
                assert_eq!(zones[1].peak_minutes, 0);
                assert_eq!(zones[1].active_zone_minutes, None);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
