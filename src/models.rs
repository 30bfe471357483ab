use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::zones::FormZone;

/// Fitness/fatigue/form state for a single simulated or observed day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadState {
    /// Date of the training day
    pub date: NaiveDate,

    /// Daily training stress applied on this day (never negative)
    pub training_stress: f64,

    /// Long-horizon exponentially weighted load (CTL)
    pub fitness: f64,

    /// Short-horizon exponentially weighted load (ATL)
    pub fatigue: f64,

    /// Fitness minus fatigue (TSB)
    pub form: f64,
}

/// A load state annotated with its readiness zone and day-over-day deltas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub state: LoadState,
    pub zone: FormZone,
    pub delta_tss: f64,
    pub delta_fitness: f64,
    pub delta_fatigue: f64,
    pub delta_form: f64,
    /// True when the zone differs from the previous snapshot's zone
    pub zone_changed: bool,
}

impl FormSnapshot {
    pub fn date(&self) -> NaiveDate {
        self.state.date
    }

    pub fn form(&self) -> f64 {
        self.state.form
    }
}

/// Dated training load record supplied by the external aggregation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoadRecord {
    /// Date of the activity
    pub date: NaiveDate,

    /// Training stress score of the activity
    pub tss: Decimal,

    /// Moving duration in seconds
    pub duration_seconds: u32,

    /// Distance covered in meters
    pub distance_meters: Option<Decimal>,
}

/// Percentage of time spent in each of five heart rate zones
///
/// Values are expected to sum to roughly 100 but the engine tolerates
/// anything and only lets malformed distributions lower its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrZoneDistribution {
    pub zones: [f64; 5],
}

impl HrZoneDistribution {
    pub fn new(zones: [f64; 5]) -> Self {
        HrZoneDistribution { zones }
    }

    /// Sum of all zone percentages
    pub fn total(&self) -> f64 {
        self.zones.iter().sum()
    }

    /// Share of time in zones 1-2 as a fraction of the recorded total (0-1)
    pub fn low_intensity_fraction(&self) -> f64 {
        self.fraction(0..2)
    }

    /// Share of time in zones 3-5 as a fraction of the recorded total (0-1)
    pub fn high_intensity_fraction(&self) -> f64 {
        self.fraction(2..5)
    }

    /// Share of time in zones 4-5 as a fraction of the recorded total (0-1)
    pub fn hard_fraction(&self) -> f64 {
        self.fraction(3..5)
    }

    fn fraction(&self, range: std::ops::Range<usize>) -> f64 {
        let total: f64 = self.zones.iter().map(|z| z.max(0.0)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.zones[range].iter().map(|z| z.max(0.0)).sum::<f64>() / total
    }

    /// How far the percentages stray from a valid distribution, in percentage points
    pub fn malformation(&self) -> f64 {
        let negatives: f64 = self.zones.iter().filter(|z| **z < 0.0).map(|z| -z).sum();
        let overflow: f64 = self.zones.iter().filter(|z| **z > 100.0).map(|z| z - 100.0).sum();
        (self.total() - 100.0).abs() + negatives + overflow
    }
}

/// Aggregate of one calendar week of training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyMetrics {
    /// First day (Monday) of the week
    pub week_start: NaiveDate,

    /// Total distance in meters
    pub total_distance: f64,

    /// Total moving duration in seconds
    pub total_duration_seconds: f64,

    /// Total elevation gain in meters
    pub total_elevation: f64,

    pub activity_count: u32,

    /// Sum of training stress over the week
    pub total_tss: f64,

    /// Average training stress per activity
    pub avg_tss: f64,

    pub avg_fitness: f64,
    pub avg_fatigue: f64,
    pub avg_form: f64,

    /// Optional time-in-zone distribution
    pub hr_zones: Option<HrZoneDistribution>,

    /// Identifiers of the activities aggregated into this week
    pub activity_ids: Vec<String>,
}

impl WeeklyMetrics {
    /// Last day covered by this week
    pub fn week_end(&self) -> NaiveDate {
        self.week_start + chrono::Duration::days(6)
    }

    pub fn duration_hours(&self) -> f64 {
        self.total_duration_seconds / 3600.0
    }
}

/// Personal record event used to enrich detected phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub achieved_at: DateTime<Utc>,
    /// Record category identifier (e.g. "5k", "ftp_20min")
    pub category: String,
}

/// Direction of change between two values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

impl TrendDirection {
    /// Percentage change from `start` to `end`, guarded against tiny denominators
    pub fn percent_change(start: f64, end: f64) -> f64 {
        let change = (end - start) / start.abs().max(1.0) * 100.0;
        if change.is_finite() {
            change
        } else {
            0.0
        }
    }

    /// Classify the change from `start` to `end` against a percent threshold
    pub fn from_change(start: f64, end: f64, threshold_percent: f64) -> Self {
        let change = Self::percent_change(start, end);
        if change > threshold_percent {
            TrendDirection::Increasing
        } else if change < -threshold_percent {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

/// Macro-level training phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingPhase {
    Base,
    Build,
    Peak,
    Taper,
    Recovery,
    Transition,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingPhase::Base => write!(f, "Base"),
            TrainingPhase::Build => write!(f, "Build"),
            TrainingPhase::Peak => write!(f, "Peak"),
            TrainingPhase::Taper => write!(f, "Taper"),
            TrainingPhase::Recovery => write!(f, "Recovery"),
            TrainingPhase::Transition => write!(f, "Transition"),
        }
    }
}

/// Planned future load: either the same stress every day or an explicit sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlannedLoad {
    Constant(f64),
    Daily(Vec<f64>),
}

impl PlannedLoad {
    /// Expand into exactly `days` values. Short sequences are padded with rest days.
    pub fn normalize(&self, days: usize) -> Vec<f64> {
        match self {
            PlannedLoad::Constant(tss) => vec![*tss; days],
            PlannedLoad::Daily(values) => values
                .iter()
                .copied()
                .chain(std::iter::repeat(0.0))
                .take(days)
                .collect(),
        }
    }
}

impl From<f64> for PlannedLoad {
    fn from(tss: f64) -> Self {
        PlannedLoad::Constant(tss)
    }
}

impl From<Vec<f64>> for PlannedLoad {
    fn from(values: Vec<f64>) -> Self {
        PlannedLoad::Daily(values)
    }
}
