use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Error;
use crate::models::{Activity, SleepSummary};
use crate::storage::repository::{MetricFamily, ZoneDay};

/// Outcome of a derived computation. Missing inputs are a value, not an error,
/// so callers can render them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Derived<T> {
    Ready(T),
    InsufficientData { reason: String },
    Undefined { reason: String },
}

impl<T> Derived<T> {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Derived::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn undefined(reason: impl Into<String>) -> Self {
        Derived::Undefined {
            reason: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Derived::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Derived::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Derived::Ready(_))
    }
}

impl<T: fmt::Display> fmt::Display for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derived::Ready(v) => v.fmt(f),
            Derived::InsufficientData { reason } | Derived::Undefined { reason } => {
                f.write_str(reason)
            }
        }
    }
}

// ── Metric catalogue ───────────────────────────────────────────────

/// Every numeric column the analytics can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RestingHeartRate,
    Steps,
    Weight,
    BodyFat,
    Spo2,
    Calories,
    Distance,
    Floors,
    FatBurnMinutes,
    CardioMinutes,
    PeakMinutes,
    ActiveZoneMinutes,
    SleepScore,
    UpstreamSleepScore,
    SleepEfficiency,
    TotalSleep,
    DeepSleep,
    LightSleep,
    RemSleep,
    WakeMinutes,
    Hrv,
    BreathingRate,
    SkinTemperature,
    Vo2Max,
}

impl Metric {
    pub const ALL: [Metric; 24] = [
        Metric::RestingHeartRate,
        Metric::Steps,
        Metric::Weight,
        Metric::BodyFat,
        Metric::Spo2,
        Metric::Calories,
        Metric::Distance,
        Metric::Floors,
        Metric::FatBurnMinutes,
        Metric::CardioMinutes,
        Metric::PeakMinutes,
        Metric::ActiveZoneMinutes,
        Metric::SleepScore,
        Metric::UpstreamSleepScore,
        Metric::SleepEfficiency,
        Metric::TotalSleep,
        Metric::DeepSleep,
        Metric::LightSleep,
        Metric::RemSleep,
        Metric::WakeMinutes,
        Metric::Hrv,
        Metric::BreathingRate,
        Metric::SkinTemperature,
        Metric::Vo2Max,
    ];

    pub fn family(self) -> MetricFamily {
        use Metric::*;
        match self {
            RestingHeartRate | Steps | Weight | BodyFat | Spo2 | Calories | Distance | Floors
            | FatBurnMinutes | CardioMinutes | PeakMinutes | ActiveZoneMinutes => {
                MetricFamily::Daily
            }
            SleepScore | UpstreamSleepScore | SleepEfficiency | TotalSleep | DeepSleep
            | LightSleep | RemSleep | WakeMinutes => MetricFamily::Sleep,
            Hrv | BreathingRate | SkinTemperature => MetricFamily::Advanced,
            Vo2Max => MetricFamily::CardioFitness,
        }
    }

    pub fn table(self) -> &'static str {
        self.family().table()
    }

    pub fn column(self) -> &'static str {
        use Metric::*;
        match self {
            RestingHeartRate => "resting_heart_rate",
            Steps => "steps",
            Weight => "weight",
            BodyFat => "body_fat",
            Spo2 => "spo2",
            Calories => "calories",
            Distance => "distance",
            Floors => "floors",
            FatBurnMinutes => "fat_burn_minutes",
            CardioMinutes => "cardio_minutes",
            PeakMinutes => "peak_minutes",
            ActiveZoneMinutes => "active_zone_minutes",
            SleepScore => "reality_score",
            UpstreamSleepScore => "sleep_score",
            SleepEfficiency => "efficiency",
            TotalSleep => "total_sleep",
            DeepSleep => "deep_minutes",
            LightSleep => "light_minutes",
            RemSleep => "rem_minutes",
            WakeMinutes => "wake_minutes",
            Hrv => "hrv",
            BreathingRate => "breathing_rate",
            SkinTemperature => "temperature",
            Vo2Max => "vo2_max",
        }
    }

    /// Friendly name used in tool output.
    pub fn name(self) -> &'static str {
        use Metric::*;
        match self {
            RestingHeartRate => "rhr",
            ActiveZoneMinutes => "azm",
            SleepScore => "sleep_score",
            UpstreamSleepScore => "upstream_sleep_score",
            SleepEfficiency => "sleep_efficiency",
            DeepSleep => "deep_sleep",
            LightSleep => "light_sleep",
            RemSleep => "rem_sleep",
            SkinTemperature => "skin_temperature",
            other => other.column(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        let metric = match key.as_str() {
            "rhr" | "resting_heart_rate" | "resting_hr" => Metric::RestingHeartRate,
            "steps" => Metric::Steps,
            "weight" => Metric::Weight,
            "body_fat" | "fat" => Metric::BodyFat,
            "spo2" => Metric::Spo2,
            "calories" => Metric::Calories,
            "distance" => Metric::Distance,
            "floors" => Metric::Floors,
            "fat_burn" | "fat_burn_minutes" => Metric::FatBurnMinutes,
            "cardio" | "cardio_minutes" => Metric::CardioMinutes,
            "peak" | "peak_minutes" => Metric::PeakMinutes,
            "azm" | "active_zone_minutes" => Metric::ActiveZoneMinutes,
            "sleep_score" | "reality_score" => Metric::SleepScore,
            "fitbit_score" | "upstream_sleep_score" => Metric::UpstreamSleepScore,
            "efficiency" | "sleep_efficiency" => Metric::SleepEfficiency,
            "total_sleep" | "sleep_duration" => Metric::TotalSleep,
            "deep" | "deep_sleep" | "deep_minutes" => Metric::DeepSleep,
            "light" | "light_sleep" | "light_minutes" => Metric::LightSleep,
            "rem" | "rem_sleep" | "rem_minutes" => Metric::RemSleep,
            "wake" | "wake_minutes" => Metric::WakeMinutes,
            "hrv" => Metric::Hrv,
            "breathing_rate" => Metric::BreathingRate,
            "temperature" | "skin_temperature" => Metric::SkinTemperature,
            "vo2_max" | "vo2max" | "cardio_fitness" => Metric::Vo2Max,
            _ => return Err(Error::UnknownMetric(s.to_string())),
        };
        Ok(metric)
    }
}

// ── Readiness ──────────────────────────────────────────────────────

/// Sub-scores and raw inputs behind a readiness score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessBreakdown {
    /// Reality score, else upstream score, else 0. Weight 40%.
    pub sleep_factor: f64,
    /// Weight 30%. 50 when there is no baseline.
    pub rhr_factor: f64,
    /// Weight 30%. 50 when there is no baseline.
    pub hrv_factor: f64,
    pub current_rhr: Option<f64>,
    pub baseline_rhr: Option<f64>,
    pub current_hrv: Option<f64>,
    pub baseline_hrv: Option<f64>,
}

impl ReadinessBreakdown {
    pub fn rhr_delta(&self) -> Option<f64> {
        Some(self.current_rhr? - self.baseline_rhr?)
    }

    pub fn hrv_delta(&self) -> Option<f64> {
        Some(self.current_hrv? - self.baseline_hrv?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readiness {
    pub date: NaiveDate,
    pub score: i64,
    pub breakdown: ReadinessBreakdown,
}

/// Headline band for a readiness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessBand {
    Prime,
    Normal,
    Recovery,
}

impl ReadinessBand {
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            ReadinessBand::Prime
        } else if score >= 50 {
            ReadinessBand::Normal
        } else {
            ReadinessBand::Recovery
        }
    }
}

impl fmt::Display for ReadinessBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadinessBand::Prime => "Prime",
            ReadinessBand::Normal => "Normal",
            ReadinessBand::Recovery => "Recovery",
        })
    }
}

impl Readiness {
    pub fn band(&self) -> ReadinessBand {
        ReadinessBand::from_score(self.score)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Readiness: {}/100 ({})", self.score, self.band())
    }
}

// ── Sleep consistency ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SleepGrade {
    A,
    B,
    C,
    D,
}

impl SleepGrade {
    /// Grade a bedtime standard deviation in minutes.
    pub fn from_stdev(minutes: f64) -> Self {
        if minutes < 30.0 {
            SleepGrade::A
        } else if minutes < 60.0 {
            SleepGrade::B
        } else if minutes < 90.0 {
            SleepGrade::C
        } else {
            SleepGrade::D
        }
    }
}

impl fmt::Display for SleepGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepConsistency {
    pub window_days: u32,
    /// Nights with a usable start time.
    pub nights: usize,
    pub bedtime_stdev: f64,
    pub waketime_stdev: f64,
    pub grade: SleepGrade,
}

impl fmt::Display for SleepConsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sleep Consistency Report ({} days)", self.window_days)?;
        writeln!(f, "Grade: {}", self.grade)?;
        writeln!(f)?;
        writeln!(f, "Bedtime Consistency: +/- {} min", self.bedtime_stdev.round())?;
        write!(f, "Wake Time Consistency: +/- {} min", self.waketime_stdev.round())
    }
}

// ── Trend ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub metric: Metric,
    pub recent_days: u32,
    pub baseline_days: u32,
    pub recent_mean: f64,
    pub baseline_mean: f64,
    pub recent_samples: usize,
    pub baseline_samples: usize,
    pub difference: f64,
    /// `None` when the baseline mean is zero.
    pub percent_change: Option<f64>,
}

impl Trend {
    pub fn direction(&self) -> &'static str {
        if self.difference > 0.0 {
            "Up"
        } else if self.difference < 0.0 {
            "Down"
        } else {
            "Flat"
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trend Analysis: {}", self.metric.name().to_uppercase())?;
        writeln!(
            f,
            "Period 1 (Last {} days): {:.1}",
            self.recent_days, self.recent_mean
        )?;
        writeln!(
            f,
            "Period 2 (Prev {} days): {:.1}",
            self.baseline_days, self.baseline_mean
        )?;
        writeln!(f)?;
        match self.percent_change {
            Some(pct) => write!(
                f,
                "Change: {} {:.1} ({:.1}%)",
                self.direction(),
                self.difference,
                pct
            ),
            None => write!(f, "Change: {} {:.1} (n/a %)", self.direction(), self.difference),
        }
    }
}

// ── Correlation ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub metric_a: Metric,
    pub metric_b: Metric,
    pub samples: usize,
    pub coefficient: f64,
}

impl Correlation {
    pub fn strength(&self) -> &'static str {
        let r = self.coefficient.abs();
        if r > 0.7 {
            "Strong"
        } else if r > 0.3 {
            "Moderate"
        } else {
            "Weak"
        }
    }

    pub fn direction(&self) -> &'static str {
        if self.coefficient > 0.0 {
            "Positive"
        } else {
            "Negative"
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Correlation Analysis ({} days)", self.samples)?;
        writeln!(f, "{} vs {}", self.metric_a, self.metric_b)?;
        writeln!(f)?;
        writeln!(f, "Coefficient (r): {:.3}", self.coefficient)?;
        write!(
            f,
            "Interpretation: {} {} Correlation.",
            self.strength(),
            self.direction()
        )
    }
}

// ── Intensity ──────────────────────────────────────────────────────

/// Calories burned per whole minute of the activity. Zero when the
/// activity lasted under a minute.
pub fn intensity_score(activity: &Activity) -> f64 {
    let minutes = activity.duration_minutes();
    if minutes <= 0 {
        return 0.0;
    }
    activity.calories.unwrap_or(0) as f64 / minutes as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityLevel {
    High,
    Moderate,
    Low,
}

impl IntensityLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 10.0 {
            IntensityLevel::High
        } else if score > 5.0 {
            IntensityLevel::Moderate
        } else {
            IntensityLevel::Low
        }
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntensityLevel::High => "High",
            IntensityLevel::Moderate => "Moderate",
            IntensityLevel::Low => "Low",
        })
    }
}

// ── Aggregate views ────────────────────────────────────────────────

/// Heart-rate zone minutes per day plus their totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<ZoneDay>,
    pub total_fat_burn: i64,
    pub total_cardio: i64,
    pub total_peak: i64,
}

impl ZoneSummary {
    pub fn from_days(start: NaiveDate, end: NaiveDate, days: Vec<ZoneDay>) -> Self {
        let total_fat_burn = days.iter().map(|d| d.fat_burn_minutes).sum();
        let total_cardio = days.iter().map(|d| d.cardio_minutes).sum();
        let total_peak = days.iter().map(|d| d.peak_minutes).sum();
        Self {
            start,
            end,
            days,
            total_fat_burn,
            total_cardio,
            total_peak,
        }
    }
}

/// One night in a sleep log. `night` is `None` when nothing is cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepLogEntry {
    pub date: NaiveDate,
    pub night: Option<SleepNight>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepNight {
    /// Reality score, else upstream score, else 0.
    pub score: i64,
    pub duration_minutes: i64,
    pub deep_minutes: i64,
    pub rem_minutes: i64,
}

impl From<&SleepSummary> for SleepNight {
    fn from(s: &SleepSummary) -> Self {
        Self {
            score: s.best_score().unwrap_or(0),
            duration_minutes: s.total_sleep.unwrap_or(0),
            deep_minutes: s.deep_minutes.unwrap_or(0),
            rem_minutes: s.rem_minutes.unwrap_or(0),
        }
    }
}
