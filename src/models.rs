use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Daily biometrics and activity summary. Written as a whole row: any field
/// left `None` is stored as NULL, even if a previous write had a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub resting_heart_rate: Option<i64>,
    pub steps: Option<i64>,
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
    pub spo2: Option<f64>,
    pub calories: Option<i64>,
    pub distance: Option<f64>,
    pub floors: Option<i64>,
    pub fat_burn_minutes: Option<i64>,
    pub cardio_minutes: Option<i64>,
    pub peak_minutes: Option<i64>,
    pub active_zone_minutes: Option<i64>,
}

impl DailyMetrics {
    /// An empty row for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            resting_heart_rate: None,
            steps: None,
            weight: None,
            body_fat: None,
            spo2: None,
            calories: None,
            distance: None,
            floors: None,
            fat_burn_minutes: None,
            cardio_minutes: None,
            peak_minutes: None,
            active_zone_minutes: None,
        }
    }
}

/// Main sleep session, keyed by the morning the session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSummary {
    pub date: NaiveDate,
    /// Locally recomputed score. Gap detection treats a NULL here as missing.
    pub reality_score: Option<i64>,
    /// Score as reported upstream.
    pub sleep_score: Option<i64>,
    pub efficiency: Option<i64>,
    pub total_sleep: Option<i64>,
    pub deep_minutes: Option<i64>,
    pub light_minutes: Option<i64>,
    pub rem_minutes: Option<i64>,
    pub wake_minutes: Option<i64>,
    pub start_time: Option<String>,
    /// Full upstream sleep record as JSON text.
    pub raw_payload: Option<String>,
}

impl SleepSummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            reality_score: None,
            sleep_score: None,
            efficiency: None,
            total_sleep: None,
            deep_minutes: None,
            light_minutes: None,
            rem_minutes: None,
            wake_minutes: None,
            start_time: None,
            raw_payload: None,
        }
    }

    /// Reality score, falling back to the upstream score.
    pub fn best_score(&self) -> Option<i64> {
        self.reality_score.or(self.sleep_score)
    }

    /// Decode the stored upstream record.
    pub fn decode_raw(&self) -> Result<Option<serde_json::Value>> {
        decode_payload(self.raw_payload.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub date: NaiveDate,
    pub hrv: Option<f64>,
    pub breathing_rate: Option<f64>,
    pub skin_temperature: Option<f64>,
}

/// Estimated aerobic capacity. Upstream reports this only every few days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardioFitness {
    pub date: NaiveDate,
    pub vo2_max: Option<f64>,
}

/// A discrete exercise session. A date may have any number of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub date: NaiveDate,
    pub name: Option<String>,
    pub duration_ms: Option<i64>,
    pub calories: Option<i64>,
    pub average_heart_rate: Option<i64>,
    pub steps: Option<i64>,
    pub distance: Option<f64>,
    pub start_time: Option<String>,
    /// Full upstream activity record as JSON text.
    pub raw_payload: Option<String>,
}

impl Activity {
    pub fn duration_minutes(&self) -> i64 {
        self.duration_ms.unwrap_or(0) / 60_000
    }

    pub fn decode_raw(&self) -> Result<Option<serde_json::Value>> {
        decode_payload(self.raw_payload.as_deref())
    }
}

fn decode_payload(raw: Option<&str>) -> Result<Option<serde_json::Value>> {
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(s)?)),
        None => Ok(None),
    }
}
