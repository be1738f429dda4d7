pub mod types;

pub use types::*;

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Timelike};

use crate::date_util::{
    date_key, dates_in_range, parse_start_time, preceding_window, trailing_window,
};
use crate::error::{Error, Result};
use crate::models::{AdvancedMetrics, DailyMetrics, SleepSummary};
use crate::storage::repository;
use crate::storage::Database;

/// Days before the scored date that form the RHR/HRV baseline.
pub const READINESS_BASELINE_DAYS: u32 = 14;

/// Paired days required before a correlation is reported.
pub const MIN_CORRELATION_SAMPLES: usize = 10;

/// Compute the readiness score for `date`. Needs that date's sleep,
/// advanced and daily rows; otherwise reports insufficient data.
pub async fn compute_readiness(db: &Database, date: NaiveDate) -> Result<Derived<Readiness>> {
    let baseline = preceding_window(date, READINESS_BASELINE_DAYS)
        .map(|(start, end)| (date_key(start), date_key(end)));

    db.conn()
        .call(move |conn| {
            let sleep = repository::get_sleep(conn, date)?;
            let advanced = repository::get_advanced_metrics(conn, date)?;
            let daily = repository::get_daily_metrics(conn, date)?;

            let (sleep, advanced, daily) = match (sleep, advanced, daily) {
                (Some(s), Some(a), Some(d)) => (s, a, d),
                (s, a, d) => {
                    let missing: Vec<&str> = [
                        (s.is_none(), "sleep"),
                        (a.is_none(), "advanced metrics"),
                        (d.is_none(), "daily metrics"),
                    ]
                    .into_iter()
                    .filter_map(|(absent, name)| absent.then_some(name))
                    .collect();
                    return Ok(Derived::insufficient(format!(
                        "Insufficient data for readiness calculation on {date} (missing {})",
                        missing.join(", ")
                    )));
                }
            };

            let (rhr_history, hrv_history) = match &baseline {
                Some((start, end)) => (
                    values(metric_series_sql(conn, Metric::RestingHeartRate, start, end)?),
                    values(metric_series_sql(conn, Metric::Hrv, start, end)?),
                ),
                None => (vec![], vec![]),
            };

            Ok::<_, rusqlite::Error>(Derived::Ready(score_readiness(
                date,
                &sleep,
                &daily,
                &advanced,
                &rhr_history,
                &hrv_history,
            )))
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Bedtime and wake-time regularity over the `days` dates ending at `as_of`.
pub async fn compute_sleep_consistency(
    db: &Database,
    as_of: NaiveDate,
    days: u32,
) -> Result<Derived<SleepConsistency>> {
    let (start, end) = trailing_window(as_of, days);
    let sessions = db
        .conn()
        .call(move |conn| repository::get_sleep_in_range(conn, start, end))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(consistency_from_sessions(days, &sessions))
}

/// Compare the mean of `metric` over the `recent_days` ending at `as_of`
/// with its mean over the `baseline_days` immediately before that.
pub async fn compute_trend(
    db: &Database,
    metric: Metric,
    recent_days: u32,
    baseline_days: u32,
    as_of: NaiveDate,
) -> Result<Derived<Trend>> {
    let (recent_start, recent_end) = trailing_window(as_of, recent_days);
    let base_window = preceding_window(recent_start, baseline_days)
        .map(|(start, end)| (date_key(start), date_key(end)));
    let (recent_start, recent_end) = (date_key(recent_start), date_key(recent_end));

    let (recent, baseline) = db
        .conn()
        .call(move |conn| {
            let recent = values(metric_series_sql(conn, metric, &recent_start, &recent_end)?);
            let baseline = match &base_window {
                Some((start, end)) => values(metric_series_sql(conn, metric, start, end)?),
                None => vec![],
            };
            Ok::<_, rusqlite::Error>((recent, baseline))
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(trend_from_values(
        metric,
        recent_days,
        baseline_days,
        &recent,
        &baseline,
    ))
}

/// Pearson correlation of two metrics over the `days` dates ending at
/// `as_of`. Values are paired by calendar date with no lag.
pub async fn compute_correlation(
    db: &Database,
    metric_a: Metric,
    metric_b: Metric,
    days: u32,
    as_of: NaiveDate,
) -> Result<Derived<Correlation>> {
    let (start, end) = trailing_window(as_of, days);
    let (start, end) = (date_key(start), date_key(end));

    let (series_a, series_b) = db
        .conn()
        .call(move |conn| {
            let a = metric_series_sql(conn, metric_a, &start, &end)?;
            let b = metric_series_sql(conn, metric_b, &start, &end)?;
            Ok::<_, rusqlite::Error>((a, b))
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(correlate_series(metric_a, metric_b, &series_a, &series_b))
}

/// Present values of `metric` in `[start, end]`, ascending by date.
pub async fn metric_series(
    db: &Database,
    metric: Metric,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, f64)>> {
    let (start, end) = (date_key(start), date_key(end));
    db.conn()
        .call(move |conn| metric_series_sql(conn, metric, &start, &end))
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Zone minutes per day in `[start, end]`, with totals.
pub async fn compute_zone_summary(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ZoneSummary> {
    let days = db
        .conn()
        .call(move |conn| repository::zone_days(conn, start, end))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(ZoneSummary::from_days(start, end, days))
}

/// One entry per date in `[start, end]`, including dates with no sleep.
pub async fn compute_sleep_log(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SleepLogEntry>> {
    let sessions = db
        .conn()
        .call(move |conn| repository::get_sleep_in_range(conn, start, end))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    let by_date: BTreeMap<NaiveDate, &SleepSummary> =
        sessions.iter().map(|s| (s.date, s)).collect();

    Ok(dates_in_range(start, end)
        .into_iter()
        .map(|date| SleepLogEntry {
            date,
            night: by_date.get(&date).map(|s| SleepNight::from(*s)),
        })
        .collect())
}

// ── Scoring ────────────────────────────────────────────────────────

pub fn score_readiness(
    date: NaiveDate,
    sleep: &SleepSummary,
    daily: &DailyMetrics,
    advanced: &AdvancedMetrics,
    rhr_history: &[f64],
    hrv_history: &[f64],
) -> Readiness {
    let sleep_factor = sleep.best_score().unwrap_or(0) as f64;

    let current_rhr = daily.resting_heart_rate.map(|v| v as f64);
    let baseline_rhr = mean(rhr_history);
    let rhr_factor = match (current_rhr, baseline_rhr) {
        // Lower than usual is better.
        (Some(cur), Some(base)) => clamp_factor(50.0 - 4.0 * (cur - base)),
        _ => 50.0,
    };

    let current_hrv = advanced.hrv;
    let baseline_hrv = mean(hrv_history);
    let hrv_factor = match (current_hrv, baseline_hrv) {
        (Some(cur), Some(base)) => clamp_factor(50.0 + 2.0 * (cur - base)),
        _ => 50.0,
    };

    let score = (sleep_factor * 0.4 + rhr_factor * 0.3 + hrv_factor * 0.3).round() as i64;

    Readiness {
        date,
        score,
        breakdown: ReadinessBreakdown {
            sleep_factor,
            rhr_factor,
            hrv_factor,
            current_rhr,
            baseline_rhr,
            current_hrv,
            baseline_hrv,
        },
    }
}

fn clamp_factor(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Minutes from midnight of a bedtime. Times after noon count backwards
/// from midnight so 23:00 and 01:00 are two hours apart.
pub fn bedtime_offset(minute_of_day: i64) -> i64 {
    if minute_of_day > 12 * 60 {
        minute_of_day - 24 * 60
    } else {
        minute_of_day
    }
}

pub fn consistency_from_sessions(
    window_days: u32,
    sessions: &[SleepSummary],
) -> Derived<SleepConsistency> {
    let mut bedtimes = Vec::new();
    let mut waketimes = Vec::new();

    for s in sessions {
        let Some(raw) = s.start_time.as_deref() else {
            continue;
        };
        let Some(start) = parse_start_time(raw) else {
            log::warn!("Skipping sleep on {}: unparsable start time {raw:?}", s.date);
            continue;
        };
        let start_minute = (start.hour() * 60 + start.minute()) as i64;
        bedtimes.push(bedtime_offset(start_minute) as f64);

        let in_bed = s
            .total_sleep
            .unwrap_or(0)
            .saturating_add(s.wake_minutes.unwrap_or(0));
        match Duration::try_minutes(in_bed).and_then(|d| start.checked_add_signed(d)) {
            Some(wake) => waketimes.push((wake.hour() * 60 + wake.minute()) as f64),
            None => log::warn!("Skipping wake time on {}: {in_bed} minutes in bed", s.date),
        }
    }

    if bedtimes.is_empty() {
        return Derived::insufficient("No sleep data found for consistency analysis.");
    }

    let bedtime_stdev = sample_stdev(&bedtimes);
    Derived::Ready(SleepConsistency {
        window_days,
        nights: bedtimes.len(),
        bedtime_stdev,
        waketime_stdev: sample_stdev(&waketimes),
        grade: SleepGrade::from_stdev(bedtime_stdev),
    })
}

pub fn trend_from_values(
    metric: Metric,
    recent_days: u32,
    baseline_days: u32,
    recent: &[f64],
    baseline: &[f64],
) -> Derived<Trend> {
    let (Some(recent_mean), Some(baseline_mean)) = (mean(recent), mean(baseline)) else {
        return Derived::insufficient(format!(
            "Not enough {metric} data to compare the last {recent_days} days \
             with the previous {baseline_days} days."
        ));
    };
    let difference = recent_mean - baseline_mean;
    let percent_change = (baseline_mean != 0.0).then(|| difference / baseline_mean * 100.0);

    Derived::Ready(Trend {
        metric,
        recent_days,
        baseline_days,
        recent_mean,
        baseline_mean,
        recent_samples: recent.len(),
        baseline_samples: baseline.len(),
        difference,
        percent_change,
    })
}

pub fn correlate_series(
    metric_a: Metric,
    metric_b: Metric,
    series_a: &[(NaiveDate, f64)],
    series_b: &[(NaiveDate, f64)],
) -> Derived<Correlation> {
    let by_date: BTreeMap<NaiveDate, f64> = series_b.iter().copied().collect();
    let (xs, ys): (Vec<f64>, Vec<f64>) = series_a
        .iter()
        .filter_map(|(d, a)| by_date.get(d).map(|b| (*a, *b)))
        .unzip();

    if xs.len() < MIN_CORRELATION_SAMPLES {
        return Derived::insufficient(format!(
            "Insufficient data points for correlation (need at least {MIN_CORRELATION_SAMPLES}, have {}).",
            xs.len()
        ));
    }

    match pearson(&xs, &ys) {
        Some(coefficient) => Derived::Ready(Correlation {
            metric_a,
            metric_b,
            samples: xs.len(),
            coefficient,
        }),
        None => Derived::undefined("Correlation undefined (no variance in data)."),
    }
}

// ── Statistics ─────────────────────────────────────────────────────

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation. Zero for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Pearson's r. `None` when either series has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let (mx, my) = (mean(xs)?, mean(ys)?);
    let mut num = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        num += (x - mx) * (y - my);
        sx += (x - mx).powi(2);
        sy += (y - my).powi(2);
    }
    let denom = (sx * sy).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(num / denom)
}

// ── Internal SQL helpers ───────────────────────────────────────────

fn metric_series_sql(
    conn: &rusqlite::Connection,
    metric: Metric,
    start: &str,
    end: &str,
) -> std::result::Result<Vec<(NaiveDate, f64)>, rusqlite::Error> {
    let (table, column) = (metric.table(), metric.column());
    let sql = format!(
        "SELECT date, {column} FROM {table}
         WHERE date >= ?1 AND date <= ?2 AND {column} IS NOT NULL
         ORDER BY date"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([start, end], |row| {
        Ok((repository::date_col(row, 0)?, row.get::<_, f64>(1)?))
    })?;
    rows.collect()
}

fn values(series: Vec<(NaiveDate, f64)>) -> Vec<f64> {
    series.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardioFitness;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sleep_at(date: NaiveDate, start: &str, total: i64, wake: i64) -> SleepSummary {
        let mut s = SleepSummary::new(date);
        s.reality_score = Some(80);
        s.start_time = Some(start.to_string());
        s.total_sleep = Some(total);
        s.wake_minutes = Some(wake);
        s
    }

    async fn seed_daily(db: &Database, rows: Vec<DailyMetrics>) {
        db.conn()
            .call(move |conn| {
                for r in &rows {
                    repository::upsert_daily_metrics(conn, r)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    async fn seed_advanced(db: &Database, rows: Vec<AdvancedMetrics>) {
        db.conn()
            .call(move |conn| {
                for r in &rows {
                    repository::upsert_advanced_metrics(conn, r)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    async fn seed_sleep(db: &Database, rows: Vec<SleepSummary>) {
        db.conn()
            .call(move |conn| {
                for r in &rows {
                    repository::upsert_sleep(conn, r)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    fn daily_rhr(date: NaiveDate, rhr: i64) -> DailyMetrics {
        let mut m = DailyMetrics::new(date);
        m.resting_heart_rate = Some(rhr);
        m
    }

    fn advanced_hrv(date: NaiveDate, hrv: Option<f64>) -> AdvancedMetrics {
        AdvancedMetrics {
            date,
            hrv,
            breathing_rate: None,
            skin_temperature: None,
        }
    }

    // ── Readiness ──

    #[tokio::test]
    async fn test_readiness_rhr_factor_against_two_week_baseline() {
        let db = Database::open_memory().await.unwrap();
        let today = d(2024, 6, 15);

        let mut daily: Vec<DailyMetrics> = (1..=14)
            .map(|i| daily_rhr(today - Duration::days(i), 55))
            .collect();
        daily.push(daily_rhr(today, 50));
        seed_daily(&db, daily).await;
        seed_sleep(&db, vec![sleep_at(today, "2024-06-14T23:00:00.000", 420, 30)]).await;
        seed_advanced(&db, vec![advanced_hrv(today, Some(45.0))]).await;

        let r = compute_readiness(&db, today).await.unwrap().into_ready().unwrap();
        assert_eq!(r.breakdown.rhr_factor, 70.0);
        assert_eq!(r.breakdown.baseline_rhr, Some(55.0));
        assert_eq!(r.breakdown.current_rhr, Some(50.0));
        // No HRV history: neutral.
        assert_eq!(r.breakdown.hrv_factor, 50.0);
        assert_eq!(r.breakdown.sleep_factor, 80.0);
        assert_eq!(r.score, 68); // 32 + 21 + 15
    }

    #[tokio::test]
    async fn test_readiness_ignores_days_outside_baseline() {
        let db = Database::open_memory().await.unwrap();
        let today = d(2024, 6, 15);

        seed_daily(
            &db,
            vec![
                daily_rhr(today - Duration::days(15), 90),
                daily_rhr(today - Duration::days(3), 60),
                daily_rhr(today, 60),
            ],
        )
        .await;
        seed_sleep(&db, vec![SleepSummary::new(today)]).await;
        seed_advanced(&db, vec![advanced_hrv(today, None)]).await;

        let r = compute_readiness(&db, today).await.unwrap().into_ready().unwrap();
        assert_eq!(r.breakdown.baseline_rhr, Some(60.0));
        assert_eq!(r.breakdown.rhr_factor, 50.0);
        // Sleep row without any score contributes 0.
        assert_eq!(r.breakdown.sleep_factor, 0.0);
        assert_eq!(r.score, 30);
    }

    #[tokio::test]
    async fn test_readiness_insufficient_when_any_input_missing() {
        let today = d(2024, 6, 15);

        for skip in 0..3 {
            let db = Database::open_memory().await.unwrap();
            if skip != 0 {
                seed_sleep(&db, vec![sleep_at(today, "2024-06-14T23:00:00", 400, 20)]).await;
            }
            if skip != 1 {
                seed_advanced(&db, vec![advanced_hrv(today, Some(40.0))]).await;
            }
            if skip != 2 {
                seed_daily(&db, vec![daily_rhr(today, 58)]).await;
            }
            let result = compute_readiness(&db, today).await.unwrap();
            assert!(
                matches!(result, Derived::InsufficientData { .. }),
                "case {skip} should be insufficient, got {result:?}"
            );
        }
    }

    #[test]
    fn test_readiness_factors_clamp() {
        let date = d(2024, 1, 1);
        let mut sleep = SleepSummary::new(date);
        sleep.sleep_score = Some(90);
        let daily = daily_rhr(date, 80);
        let adv = advanced_hrv(date, Some(100.0));

        let r = score_readiness(date, &sleep, &daily, &adv, &[50.0, 52.0], &[40.0]);
        assert_eq!(r.breakdown.sleep_factor, 90.0);
        assert_eq!(r.breakdown.rhr_factor, 0.0);
        assert_eq!(r.breakdown.hrv_factor, 100.0);
        assert_eq!(r.score, 66);
        assert_eq!(r.breakdown.rhr_delta(), Some(29.0));
    }

    // ── Sleep consistency ──

    #[test]
    fn test_bedtime_offset_folds_evening() {
        assert_eq!(bedtime_offset(23 * 60), -60);
        assert_eq!(bedtime_offset(60), 60);
        assert_eq!(bedtime_offset(12 * 60), 720);
        assert_eq!(bedtime_offset(12 * 60 + 1), -719);
    }

    #[test]
    fn test_consistency_clusters_across_midnight() {
        let sessions = vec![
            sleep_at(d(2024, 3, 1), "2024-02-29T23:00:00.000", 420, 30),
            sleep_at(d(2024, 3, 2), "2024-03-01T23:30:00.000", 400, 20),
            sleep_at(d(2024, 3, 3), "2024-03-03T00:30:00.000", 380, 10),
        ];
        let c = consistency_from_sessions(7, &sessions).into_ready().unwrap();
        assert_eq!(c.nights, 3);
        // Offsets -60, -30, 30.
        assert!((c.bedtime_stdev - 2100f64.sqrt()).abs() < 1e-9);
        assert_eq!(c.grade, SleepGrade::B);
        // Wake times 06:30, 06:30, 07:00.
        assert!((c.waketime_stdev - 300f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_consistency_single_night_and_empty() {
        let one = vec![sleep_at(d(2024, 3, 1), "2024-02-29T22:45:00", 480, 0)];
        let c = consistency_from_sessions(30, &one).into_ready().unwrap();
        assert_eq!(c.bedtime_stdev, 0.0);
        assert_eq!(c.waketime_stdev, 0.0);
        assert_eq!(c.grade, SleepGrade::A);

        let no_start = vec![SleepSummary::new(d(2024, 3, 1))];
        assert!(matches!(
            consistency_from_sessions(30, &no_start),
            Derived::InsufficientData { .. }
        ));
    }

    #[tokio::test]
    async fn test_consistency_reads_trailing_window() {
        let db = Database::open_memory().await.unwrap();
        seed_sleep(
            &db,
            vec![
                sleep_at(d(2024, 3, 1), "2024-02-29T20:00:00", 400, 0),
                sleep_at(d(2024, 3, 9), "2024-03-08T23:00:00", 400, 0),
                sleep_at(d(2024, 3, 10), "2024-03-09T23:10:00", 400, 0),
            ],
        )
        .await;

        let c = compute_sleep_consistency(&db, d(2024, 3, 10), 7)
            .await
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(c.nights, 2);
        assert_eq!(c.grade, SleepGrade::A);
    }

    // ── Trend ──

    #[tokio::test]
    async fn test_trend_windows_exclude_absent_days() {
        let db = Database::open_memory().await.unwrap();
        let today = d(2024, 5, 31);

        let mut rows = Vec::new();
        // Recent 7 days (25..=31): only three have steps.
        for (day, steps) in [(25, 10_000), (28, 12_000), (31, 14_000)] {
            let mut m = DailyMetrics::new(d(2024, 5, day));
            m.steps = Some(steps);
            rows.push(m);
        }
        // Baseline 7 days (18..=24).
        for day in 18..=24 {
            let mut m = DailyMetrics::new(d(2024, 5, day));
            m.steps = Some(8_000);
            rows.push(m);
        }
        // A row with no steps in the recent window must not count as zero.
        rows.push(DailyMetrics::new(d(2024, 5, 30)));
        seed_daily(&db, rows).await;

        let t = compute_trend(&db, Metric::Steps, 7, 7, today)
            .await
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(t.recent_samples, 3);
        assert_eq!(t.baseline_samples, 7);
        assert_eq!(t.recent_mean, 12_000.0);
        assert_eq!(t.baseline_mean, 8_000.0);
        assert_eq!(t.difference, 4_000.0);
        assert_eq!(t.percent_change, Some(50.0));
        assert_eq!(t.direction(), "Up");
    }

    #[test]
    fn test_trend_zero_baseline_and_empty_window() {
        let t = trend_from_values(Metric::PeakMinutes, 7, 30, &[10.0], &[0.0, 0.0])
            .into_ready()
            .unwrap();
        assert_eq!(t.difference, 10.0);
        assert_eq!(t.percent_change, None);

        assert!(matches!(
            trend_from_values(Metric::Hrv, 7, 30, &[], &[40.0]),
            Derived::InsufficientData { .. }
        ));
        assert!(matches!(
            trend_from_values(Metric::Hrv, 7, 30, &[40.0], &[]),
            Derived::InsufficientData { .. }
        ));
    }

    // ── Correlation ──

    #[test]
    fn test_pearson_basics() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[5.0, 5.0, 5.0, 5.0]), None);
        assert_eq!(pearson(&[], &[]), None);
    }

    #[test]
    fn test_correlation_needs_ten_pairs() {
        let start = d(2024, 1, 1);
        let a: Vec<(NaiveDate, f64)> = (0..12)
            .map(|i| (start + Duration::days(i), i as f64))
            .collect();
        // Only 9 dates overlap with `a`.
        let b: Vec<(NaiveDate, f64)> = (3..20)
            .map(|i| (start + Duration::days(i), (i * 2) as f64))
            .collect();

        for (ma, mb) in [
            (Metric::Steps, Metric::SleepScore),
            (Metric::Hrv, Metric::RestingHeartRate),
            (Metric::Vo2Max, Metric::DeepSleep),
        ] {
            assert!(matches!(
                correlate_series(ma, mb, &a, &b),
                Derived::InsufficientData { .. }
            ));
        }
    }

    #[test]
    fn test_correlation_zero_variance_is_undefined() {
        let start = d(2024, 1, 1);
        let a: Vec<(NaiveDate, f64)> = (0..10)
            .map(|i| (start + Duration::days(i), i as f64))
            .collect();
        let flat: Vec<(NaiveDate, f64)> = (0..10)
            .map(|i| (start + Duration::days(i), 7.0))
            .collect();
        assert!(matches!(
            correlate_series(Metric::Steps, Metric::Hrv, &a, &flat),
            Derived::Undefined { .. }
        ));
    }

    #[tokio::test]
    async fn test_correlation_pairs_same_date_values() {
        let db = Database::open_memory().await.unwrap();
        let as_of = d(2024, 4, 30);

        let mut daily = Vec::new();
        let mut adv = Vec::new();
        for i in 0..12 {
            let date = as_of - Duration::days(i);
            daily.push(daily_rhr(date, 50 + i));
            // HRV falls as RHR rises.
            adv.push(advanced_hrv(date, Some(80.0 - 2.0 * i as f64)));
        }
        // An HRV-only day contributes nothing.
        adv.push(advanced_hrv(as_of - Duration::days(20), Some(10.0)));
        seed_daily(&db, daily).await;
        seed_advanced(&db, adv).await;

        let c = compute_correlation(&db, Metric::RestingHeartRate, Metric::Hrv, 30, as_of)
            .await
            .unwrap()
            .into_ready()
            .unwrap();
        assert_eq!(c.samples, 12);
        assert!((c.coefficient + 1.0).abs() < 1e-9);
        assert_eq!(c.strength(), "Strong");
        assert_eq!(c.direction(), "Negative");
    }

    // ── Aggregate views ──

    #[tokio::test]
    async fn test_zone_summary_totals() {
        let db = Database::open_memory().await.unwrap();
        let mut a = DailyMetrics::new(d(2024, 8, 1));
        a.fat_burn_minutes = Some(30);
        a.cardio_minutes = Some(12);
        a.peak_minutes = Some(3);
        a.active_zone_minutes = Some(60);
        let mut b = DailyMetrics::new(d(2024, 8, 2));
        b.fat_burn_minutes = Some(10);
        seed_daily(&db, vec![a, b, DailyMetrics::new(d(2024, 8, 9))]).await;

        let z = compute_zone_summary(&db, d(2024, 8, 1), d(2024, 8, 7)).await.unwrap();
        assert_eq!(z.days.len(), 2);
        assert_eq!(z.total_fat_burn, 40);
        assert_eq!(z.total_cardio, 12);
        assert_eq!(z.total_peak, 3);
    }

    #[tokio::test]
    async fn test_sleep_log_marks_missing_nights() {
        let db = Database::open_memory().await.unwrap();
        let mut upstream_only = SleepSummary::new(d(2024, 8, 1));
        upstream_only.sleep_score = Some(77);
        upstream_only.total_sleep = Some(410);
        upstream_only.deep_minutes = Some(60);
        seed_sleep(&db, vec![upstream_only, sleep_at(d(2024, 8, 3), "2024-08-02T23:00:00", 380, 20)]).await;

        let log = compute_sleep_log(&db, d(2024, 8, 1), d(2024, 8, 3)).await.unwrap();
        assert_eq!(log.len(), 3);
        let first = log[0].night.as_ref().unwrap();
        assert_eq!(first.score, 77);
        assert_eq!(first.duration_minutes, 410);
        assert_eq!(first.rem_minutes, 0);
        assert!(log[1].night.is_none());
        assert_eq!(log[2].night.as_ref().unwrap().score, 80);
    }

    #[tokio::test]
    async fn test_metric_series_reads_sparse_family() {
        let db = Database::open_memory().await.unwrap();
        db.conn()
            .call(|conn| {
                repository::upsert_cardio_fitness(
                    conn,
                    &CardioFitness { date: d(2024, 2, 3), vo2_max: Some(44.5) },
                )?;
                repository::upsert_cardio_fitness(
                    conn,
                    &CardioFitness { date: d(2024, 2, 4), vo2_max: None },
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let series = metric_series(&db, Metric::Vo2Max, d(2024, 2, 1), d(2024, 2, 29))
            .await
            .unwrap();
        assert_eq!(series, vec![(d(2024, 2, 3), 44.5)]);
    }
}
