//! Display-ready renderings for the assistant tool layer.
//!
//! Every function here returns text and never fails: errors are logged and
//! rendered as an `Error ...` line.

use std::fmt::{self, Write as _};

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::metrics::{intensity_score, Derived, IntensityLevel, Metric, ReadinessBand};
use crate::query::QueryOutcome;
use crate::HealthDW;

const EARTH_CIRCUMFERENCE_KM: f64 = 40_075.0;
const EVEREST_FLOORS: f64 = 2_900.0;

fn render(context: &str, result: Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            log::error!("Error {context}: {e}");
            format!("Error {context}: {e}")
        }
    }
}

fn or_na<T: fmt::Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn rhr_status(delta: f64) -> &'static str {
    if delta > 3.0 {
        "Elevated (Stress/Illness?)"
    } else if delta < -2.0 {
        "Recovered"
    } else {
        "Normal"
    }
}

pub fn hrv_status(delta: f64) -> &'static str {
    if delta > 5.0 {
        "Prime State"
    } else if delta < -5.0 {
        "Stressed/Fatigued"
    } else {
        "Balanced"
    }
}

// ── Daily views ────────────────────────────────────────────────────

/// Morning briefing: readiness, sleep, biometrics and activity for `date`.
pub async fn daily_snapshot(hdw: &HealthDW, date: NaiveDate) -> String {
    render("generating snapshot", daily_snapshot_text(hdw, date).await)
}

async fn daily_snapshot_text(hdw: &HealthDW, date: NaiveDate) -> Result<String> {
    let daily = hdw.daily_metrics(date).await?;
    let sleep = hdw.sleep(date).await?;
    let advanced = hdw.advanced_metrics(date).await?;
    let readiness = hdw.readiness(date).await?;

    let mut out = vec![format!("Daily Snapshot for {date}")];

    if let Derived::Ready(r) = &readiness {
        out.push(format!("Readiness: {}/100 ({})", r.score, ReadinessBand::from_score(r.score)));
    }
    if let Some(s) = &sleep {
        out.push(format!(
            "Sleep: {} (Reality) | {} (Upstream)",
            or_na(s.reality_score),
            or_na(s.sleep_score)
        ));
        out.push(format!(
            "   Duration: {} min | Deep: {} min | REM: {} min",
            or_na(s.total_sleep),
            or_na(s.deep_minutes),
            or_na(s.rem_minutes)
        ));
    }
    if let (Some(d), Some(a)) = (&daily, &advanced) {
        out.push(format!(
            "Biometrics: RHR {} bpm | HRV {} ms | SpO2 {}%",
            or_na(d.resting_heart_rate),
            or_na(a.hrv),
            or_na(d.spo2)
        ));
    }
    if let Some(d) = &daily {
        out.push(format!(
            "Activity: {} steps | {} AZM | {} kcal",
            or_na(d.steps),
            or_na(d.active_zone_minutes),
            or_na(d.calories)
        ));
    }
    Ok(out.join("\n"))
}

/// Why the readiness score for `date` is what it is.
pub async fn readiness_breakdown(hdw: &HealthDW, date: NaiveDate) -> String {
    render("getting readiness breakdown", readiness_breakdown_text(hdw, date).await)
}

async fn readiness_breakdown_text(hdw: &HealthDW, date: NaiveDate) -> Result<String> {
    let r = match hdw.readiness(date).await? {
        Derived::Ready(r) => r,
        _ => return Ok("Insufficient data to calculate readiness.".to_string()),
    };
    let b = &r.breakdown;
    let rhr_delta = b.rhr_delta().unwrap_or(0.0);
    let hrv_delta = b.hrv_delta().unwrap_or(0.0);

    let mut out = String::new();
    writeln!(out, "Readiness Breakdown for {date}: {}/100", r.score).ok();
    writeln!(out, "1. Sleep Factor (40%): {}/100", b.sleep_factor.round()).ok();
    writeln!(out, "2. RHR Factor (30%): {}/100", b.rhr_factor.round()).ok();
    writeln!(
        out,
        "   - Current: {} bpm vs Baseline: {} bpm",
        or_na(b.current_rhr),
        or_na(b.baseline_rhr.map(f64::round))
    )
    .ok();
    writeln!(out, "   - Status: {} ({rhr_delta:+.1} bpm)", rhr_status(rhr_delta)).ok();
    writeln!(out, "3. HRV Factor (30%): {}/100", b.hrv_factor.round()).ok();
    writeln!(
        out,
        "   - Current: {} ms vs Baseline: {} ms",
        or_na(b.current_hrv),
        or_na(b.baseline_hrv.map(f64::round))
    )
    .ok();
    write!(out, "   - Status: {} ({hrv_delta:+.1} ms)", hrv_status(hrv_delta)).ok();
    Ok(out)
}

// ── Sleep ──────────────────────────────────────────────────────────

pub async fn sleep_consistency_report(hdw: &HealthDW, as_of: NaiveDate, days: u32) -> String {
    let text = async {
        let report = hdw.sleep_consistency(as_of, days).await?;
        Ok::<_, Error>(match report {
            Derived::Ready(c) => format!(
                "{c}\n\nInterpretation:\n\
                 - < 30 min: Excellent circadian rhythm.\n\
                 - 30-60 min: Good, minor social jetlag.\n\
                 - > 60 min: Inconsistent, likely affecting recovery."
            ),
            other => other.to_string(),
        })
    };
    render("analyzing consistency", text.await)
}

pub async fn sleep_log(hdw: &HealthDW, start: NaiveDate, end: NaiveDate) -> String {
    let text = async {
        let entries = hdw.sleep_log(start, end).await?;
        let mut out = vec![format!("Sleep Log ({start} to {end})")];
        for e in entries {
            out.push(match e.night {
                Some(n) => format!(
                    "- {}: Score {} | {} min (Deep: {}, REM: {})",
                    e.date, n.score, n.duration_minutes, n.deep_minutes, n.rem_minutes
                ),
                None => format!("- {}: No data", e.date),
            });
        }
        Ok::<_, Error>(out.join("\n"))
    };
    render("fetching sleep log", text.await)
}

// ── Activity ───────────────────────────────────────────────────────

/// Workouts in the range with their calories-per-minute intensity.
pub async fn workout_history(hdw: &HealthDW, start: NaiveDate, end: NaiveDate) -> String {
    let text = async {
        let activities = hdw.activities_in_range(start, end).await?;
        if activities.is_empty() {
            return Ok(format!("No workouts found between {start} and {end}."));
        }
        let mut out = vec![format!("Workout History ({start} to {end})")];
        for a in &activities {
            let intensity = intensity_score(a);
            out.push(format!(
                "- {} | {}",
                a.date,
                a.name.as_deref().unwrap_or("Unknown")
            ));
            out.push(format!(
                "  {} min | {} kcal | Avg HR: {}",
                a.duration_minutes(),
                a.calories.unwrap_or(0),
                or_na(a.average_heart_rate)
            ));
            out.push(format!(
                "  Intensity: {intensity:.1} cal/min ({})",
                IntensityLevel::from_score(intensity)
            ));
        }
        Ok::<_, Error>(out.join("\n"))
    };
    render("fetching history", text.await)
}

pub async fn activity_log(hdw: &HealthDW, start: NaiveDate, end: NaiveDate) -> String {
    let text = async {
        let activities = hdw.activities_in_range(start, end).await?;
        if activities.is_empty() {
            return Ok(format!("No activities found between {start} and {end}."));
        }
        let mut out = vec![format!("Activity Log ({start} to {end})")];
        for a in &activities {
            out.push(format!(
                "- {}: {} ({} min, {} kcal)",
                a.date,
                a.name.as_deref().unwrap_or("Unknown"),
                a.duration_minutes(),
                a.calories.unwrap_or(0)
            ));
        }
        Ok::<_, Error>(out.join("\n"))
    };
    render("fetching activity log", text.await)
}

pub async fn zone_analysis(hdw: &HealthDW, start: NaiveDate, end: NaiveDate) -> String {
    let text = async {
        let z = hdw.zone_summary(start, end).await?;
        if z.days.is_empty() {
            return Ok(format!("No zone data found between {start} and {end}."));
        }
        let mut out = vec![format!("Zone Analysis ({start} to {end})")];
        for d in &z.days {
            out.push(format!(
                "- {}: Fat Burn {}m | Cardio {}m | Peak {}m ({} AZM)",
                d.date,
                d.fat_burn_minutes,
                d.cardio_minutes,
                d.peak_minutes,
                or_na(d.active_zone_minutes)
            ));
        }
        out.push("-".repeat(30));
        out.push(format!(
            "Totals: Fat Burn {}m | Cardio {}m | Peak {}m",
            z.total_fat_burn, z.total_cardio, z.total_peak
        ));
        Ok::<_, Error>(out.join("\n"))
    };
    render("analyzing zones", text.await)
}

pub async fn lifetime_stats(hdw: &HealthDW) -> String {
    let text = async {
        let s = hdw.lifetime_stats().await?;
        let pct_earth = s.distance / EARTH_CIRCUMFERENCE_KM * 100.0;
        let pct_everest = s.floors as f64 / EVEREST_FLOORS * 100.0;
        Ok::<_, Error>(format!(
            "Lifetime Stats (Cached Data - {} days)\n\
             ----------------------------------------\n\
             Steps: {}\n\
             Distance: {:.1} km ({pct_earth:.2}% of Earth's circumference)\n\
             Floors: {} ({pct_everest:.2}% of Mt. Everest)",
            s.days,
            thousands(s.steps),
            s.distance,
            thousands(s.floors)
        ))
    };
    render("calculating lifetime stats", text.await)
}

// ── Analytics ──────────────────────────────────────────────────────

pub async fn comparative_trend(
    hdw: &HealthDW,
    metric: &str,
    recent_days: u32,
    baseline_days: u32,
    as_of: NaiveDate,
) -> String {
    let text = async {
        let metric: Metric = metric.parse()?;
        Ok::<_, Error>(hdw
            .trend(metric, recent_days, baseline_days, as_of)
            .await?
            .to_string())
    };
    render("calculating trends", text.await)
}

pub async fn correlation(
    hdw: &HealthDW,
    metric_a: &str,
    metric_b: &str,
    days: u32,
    as_of: NaiveDate,
) -> String {
    let text = async {
        let a: Metric = metric_a.parse()?;
        let b: Metric = metric_b.parse()?;
        Ok::<_, Error>(hdw.correlation(a, b, days, as_of).await?.to_string())
    };
    render("calculating correlation", text.await)
}

// ── Data explorer ──────────────────────────────────────────────────

pub async fn schema(hdw: &HealthDW) -> String {
    let text = async {
        let tables = hdw.inspect_schema().await?;
        let mut out = String::from("Database Schema");
        for t in &tables {
            write!(out, "\n\n{t}").ok();
        }
        Ok::<_, Error>(out)
    };
    render("inspecting schema", text.await)
}

/// Rows as a pretty-printed JSON array of objects.
pub async fn sql_query(hdw: &HealthDW, sql: &str) -> String {
    match hdw.run_read_query(sql).await {
        Ok(QueryOutcome::Rejected { reason }) => reason,
        Ok(outcome) => {
            let records = outcome.to_records();
            if records.is_empty() {
                return "Query returned no results.".to_string();
            }
            serde_json::to_string_pretty(&records)
                .unwrap_or_else(|e| format!("SQL Error: {e}"))
        }
        Err(e) => {
            log::error!("SQL Error: {e}");
            format!("SQL Error: {e}")
        }
    }
}
