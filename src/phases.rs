//! Training phase detection from weekly summaries
//!
//! The weekly history is cut into non-overlapping windows of
//! `min_phase_weeks` (a short trailing remainder joins the last window).
//! Each window is described by a [`WindowFeatures`] value and classified by
//! the first matching entry of [`PHASE_RULES`]. Adjacent windows with the same
//! phase are merged and re-measured, then annotated with heart rate zone and
//! personal record context.
//!
//! Malformed weeks (negative durations, percentages that do not add up) are
//! never rejected; they only lower the confidence of the phase they fall in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{PersonalRecord, TrainingPhase, TrendDirection, WeeklyMetrics};

/// How a phase was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Hybrid,
}

/// Coarse intensity level of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Low,
    Balanced,
    High,
    Unknown,
}

/// Confidence breakdown, every score in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfidence {
    pub overall: f64,
    pub volume: f64,
    pub intensity: f64,
    pub tss: f64,
}

/// Average heart rate zone distribution of a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrZoneProfile {
    /// Mean percentage per zone across weeks that recorded heart rate
    pub average_percentages: [f64; 5],
    /// The two zones (1-based) with the highest average share
    pub dominant_zones: [u8; 2],
}

/// Training context when a personal record was set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordContext {
    pub record: PersonalRecord,
    pub week_index: usize,
    pub fitness: f64,
    pub form: f64,
    pub weekly_tss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePerformance {
    pub records_achieved: usize,
    pub records: Vec<RecordContext>,
}

/// One contiguous detected phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPhase {
    pub phase: TrainingPhase,

    /// Index of the first week in the input sequence
    pub start_week: usize,

    /// Index of the last week (inclusive)
    pub end_week: usize,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_weeks: usize,
    pub confidence: PhaseConfidence,
    pub volume_trend: TrendDirection,
    pub tss_trend: TrendDirection,
    pub volume_change_percent: f64,
    pub tss_change_percent: f64,

    /// Change in average fitness between the first and last week
    pub fitness_gain: f64,

    pub avg_weekly_hours: f64,
    pub avg_weekly_tss: f64,
    pub avg_form: f64,
    pub hr_zone_profile: Option<HrZoneProfile>,
    pub performance: Option<PhasePerformance>,
    pub detection_method: DetectionMethod,

    /// Name of the heuristic rule that produced the label
    pub matched_rule: String,
}

impl DetectedPhase {
    /// True when `date` falls inside this phase's calendar span
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDetectionConfig {
    /// Minimum weeks per phase window; fewer weeks yield no phases
    pub min_phase_weeks: usize,

    /// Relative change (percent) separating a trend from noise
    pub trend_threshold_percent: f64,

    /// Window volume relative to the history average counted as high
    pub high_volume_ratio: f64,

    /// Window volume relative to the history average counted as moderate
    pub moderate_volume_ratio: f64,

    /// Window volume and TSS relative to the history average counted as very low
    pub low_volume_ratio: f64,

    /// Fraction of time in zones 1-2 marking low-intensity training
    pub low_intensity_fraction: f64,

    /// Fraction of time in zones 3-5 marking intensity-heavy training
    pub high_intensity_fraction: f64,

    /// TSS per hour below which training counts as low intensity (no HR data)
    pub low_tss_per_hour: f64,

    /// TSS per hour at or above which training counts as high intensity (no HR data)
    pub high_tss_per_hour: f64,
}

impl Default for PhaseDetectionConfig {
    fn default() -> Self {
        PhaseDetectionConfig {
            min_phase_weeks: 3,
            trend_threshold_percent: 5.0,
            high_volume_ratio: 0.9,
            moderate_volume_ratio: 0.7,
            low_volume_ratio: 0.6,
            low_intensity_fraction: 0.70,
            high_intensity_fraction: 0.45,
            low_tss_per_hour: 55.0,
            high_tss_per_hour: 75.0,
        }
    }
}

impl PhaseDetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_phase_weeks == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "phases.min_phase_weeks".to_string(),
                value: "0".to_string(),
                range: "[1, inf)".to_string(),
            });
        }
        for (name, value) in [
            ("phases.low_intensity_fraction", self.low_intensity_fraction),
            ("phases.high_intensity_fraction", self.high_intensity_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    parameter: name.to_string(),
                    value: value.to_string(),
                    range: "[0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Measurements of one window that the rules are evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub volume_trend: TrendDirection,
    pub volume_change_percent: f64,
    pub tss_trend: TrendDirection,
    pub tss_change_percent: f64,
    pub fitness_gain: f64,
    pub form_change: f64,
    /// Average weekly duration relative to the whole history
    pub volume_ratio: f64,
    /// Average weekly TSS relative to the whole history
    pub tss_ratio: f64,
    pub intensity: IntensityLevel,
    /// Mean zone 1-2 fraction over weeks with HR data
    pub low_intensity_fraction: Option<f64>,
    /// Mean zone 3-5 fraction over weeks with HR data
    pub high_intensity_fraction: Option<f64>,
    pub tss_per_hour: f64,
}

/// A single ordered classification heuristic
pub struct PhaseRule {
    pub name: &'static str,
    pub phase: TrainingPhase,
    pub matches: fn(&WindowFeatures, &PhaseDetectionConfig) -> bool,
}

/// Classification rules, evaluated top to bottom; the last one always matches
pub const PHASE_RULES: &[PhaseRule] = &[
    PhaseRule {
        name: "high_volume_low_intensity",
        phase: TrainingPhase::Base,
        matches: is_base,
    },
    PhaseRule {
        name: "balanced_intensity_rising_load",
        phase: TrainingPhase::Build,
        matches: is_build,
    },
    PhaseRule {
        name: "reduced_volume_high_intensity",
        phase: TrainingPhase::Peak,
        matches: is_peak,
    },
    PhaseRule {
        name: "falling_volume_rising_form",
        phase: TrainingPhase::Taper,
        matches: is_taper,
    },
    PhaseRule {
        name: "minimal_load_rising_form",
        phase: TrainingPhase::Recovery,
        matches: is_recovery,
    },
    PhaseRule {
        name: "fallback",
        phase: TrainingPhase::Transition,
        matches: always,
    },
];

fn is_base(f: &WindowFeatures, c: &PhaseDetectionConfig) -> bool {
    f.volume_ratio >= c.high_volume_ratio
        && f.intensity == IntensityLevel::Low
        && f.volume_trend != TrendDirection::Decreasing
}

fn is_build(f: &WindowFeatures, c: &PhaseDetectionConfig) -> bool {
    f.volume_ratio >= c.moderate_volume_ratio
        && f.intensity == IntensityLevel::Balanced
        && f.tss_trend == TrendDirection::Increasing
}

fn is_peak(f: &WindowFeatures, c: &PhaseDetectionConfig) -> bool {
    f.volume_ratio < c.high_volume_ratio && f.intensity == IntensityLevel::High
}

fn is_taper(f: &WindowFeatures, _: &PhaseDetectionConfig) -> bool {
    f.volume_trend == TrendDirection::Decreasing && f.form_change > 0.0
}

fn is_recovery(f: &WindowFeatures, c: &PhaseDetectionConfig) -> bool {
    f.volume_ratio < c.low_volume_ratio && f.tss_ratio < c.low_volume_ratio && f.form_change > 0.0
}

fn always(_: &WindowFeatures, _: &PhaseDetectionConfig) -> bool {
    true
}

/// History-wide averages used to judge a window's relative volume
struct HistoryBaseline {
    avg_duration: f64,
    avg_tss: f64,
}

impl HistoryBaseline {
    fn from_weeks(weeks: &[WeeklyMetrics]) -> Self {
        let n = weeks.len().max(1) as f64;
        HistoryBaseline {
            avg_duration: weeks.iter().map(|w| w.total_duration_seconds).sum::<f64>() / n,
            avg_tss: weeks.iter().map(|w| w.total_tss).sum::<f64>() / n,
        }
    }
}

pub struct PhaseDetector {
    config: PhaseDetectionConfig,
}

impl PhaseDetector {
    pub fn new() -> Self {
        PhaseDetector {
            config: PhaseDetectionConfig::default(),
        }
    }

    pub fn with_config(config: PhaseDetectionConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(PhaseDetector { config })
    }

    pub fn config(&self) -> &PhaseDetectionConfig {
        &self.config
    }

    /// Segment a weekly history into contiguous phases
    ///
    /// Returns an empty vector when fewer than `min_phase_weeks` weeks are
    /// supplied: insufficient data is an expected outcome, not an error.
    pub fn detect_phases(
        &self,
        weekly_metrics: &[WeeklyMetrics],
        personal_records: &[PersonalRecord],
    ) -> Vec<DetectedPhase> {
        let min_weeks = self.config.min_phase_weeks.max(1);
        if weekly_metrics.len() < min_weeks {
            tracing::debug!(
                weeks = weekly_metrics.len(),
                min_weeks,
                "Not enough weekly history for phase detection"
            );
            return Vec::new();
        }

        let baseline = HistoryBaseline::from_weeks(weekly_metrics);

        // Classify fixed windows, then merge neighbours with the same label
        let mut segments: Vec<(usize, usize, TrainingPhase, &'static str)> = Vec::new();
        for (start, end) in Self::window_bounds(weekly_metrics.len(), min_weeks) {
            let features = self.window_features(&weekly_metrics[start..end], &baseline);
            let rule = self.matching_rule(&features);
            tracing::trace!(start, end, rule = rule.name, "Classified phase window");

            match segments.last_mut() {
                Some(last) if last.2 == rule.phase => last.1 = end,
                _ => segments.push((start, end, rule.phase, rule.name)),
            }
        }

        let phases: Vec<DetectedPhase> = segments
            .into_iter()
            .map(|(start, end, phase, rule)| {
                self.build_phase(weekly_metrics, start, end, phase, rule, &baseline, personal_records)
            })
            .collect();

        tracing::debug!(
            weeks = weekly_metrics.len(),
            phases = phases.len(),
            "Phase detection complete"
        );
        phases
    }

    /// First rule whose predicate holds for the features
    pub fn matching_rule(&self, features: &WindowFeatures) -> &'static PhaseRule {
        PHASE_RULES
            .iter()
            .find(|rule| (rule.matches)(features, &self.config))
            .unwrap_or(&PHASE_RULES[PHASE_RULES.len() - 1])
    }

    /// Classify a standalone run of weeks against its own averages
    pub fn classify_weeks(&self, weeks: &[WeeklyMetrics]) -> Option<(TrainingPhase, WindowFeatures)> {
        if weeks.is_empty() {
            return None;
        }
        let baseline = HistoryBaseline::from_weeks(weeks);
        let features = self.window_features(weeks, &baseline);
        let phase = self.matching_rule(&features).phase;
        Some((phase, features))
    }

    fn window_bounds(total: usize, size: usize) -> Vec<(usize, usize)> {
        let count = total / size;
        (0..count)
            .map(|i| {
                let start = i * size;
                let end = if i + 1 == count { total } else { start + size };
                (start, end)
            })
            .collect()
    }

    fn window_features(&self, weeks: &[WeeklyMetrics], baseline: &HistoryBaseline) -> WindowFeatures {
        let threshold = self.config.trend_threshold_percent;
        let first = &weeks[0];
        let last = &weeks[weeks.len() - 1];
        let n = weeks.len() as f64;

        let avg_duration = weeks.iter().map(|w| w.total_duration_seconds).sum::<f64>() / n;
        let avg_tss = weeks.iter().map(|w| w.total_tss).sum::<f64>() / n;

        let volume_ratio = ratio(avg_duration, baseline.avg_duration);
        let tss_ratio = ratio(avg_tss, baseline.avg_tss);

        let hr_weeks: Vec<_> = weeks.iter().filter_map(|w| w.hr_zones).collect();
        let (low_fraction, high_fraction) = if hr_weeks.is_empty() {
            (None, None)
        } else {
            let count = hr_weeks.len() as f64;
            (
                Some(hr_weeks.iter().map(|d| d.low_intensity_fraction()).sum::<f64>() / count),
                Some(hr_weeks.iter().map(|d| d.high_intensity_fraction()).sum::<f64>() / count),
            )
        };

        let hours = weeks.iter().map(|w| w.total_duration_seconds.max(0.0)).sum::<f64>() / 3600.0;
        let tss_per_hour = if hours > 0.0 {
            weeks.iter().map(|w| w.total_tss.max(0.0)).sum::<f64>() / hours
        } else {
            0.0
        };

        let intensity = match (low_fraction, high_fraction) {
            (Some(low), _) if low >= self.config.low_intensity_fraction => IntensityLevel::Low,
            (_, Some(high)) if high >= self.config.high_intensity_fraction => IntensityLevel::High,
            (Some(_), Some(_)) => IntensityLevel::Balanced,
            _ if hours <= 0.0 => IntensityLevel::Unknown,
            _ if tss_per_hour < self.config.low_tss_per_hour => IntensityLevel::Low,
            _ if tss_per_hour >= self.config.high_tss_per_hour => IntensityLevel::High,
            _ => IntensityLevel::Balanced,
        };

        WindowFeatures {
            volume_trend: TrendDirection::from_change(
                first.total_duration_seconds,
                last.total_duration_seconds,
                threshold,
            ),
            volume_change_percent: TrendDirection::percent_change(
                first.total_duration_seconds,
                last.total_duration_seconds,
            ),
            tss_trend: TrendDirection::from_change(first.total_tss, last.total_tss, threshold),
            tss_change_percent: TrendDirection::percent_change(first.total_tss, last.total_tss),
            fitness_gain: last.avg_fitness - first.avg_fitness,
            form_change: last.avg_form - first.avg_form,
            volume_ratio,
            tss_ratio,
            intensity,
            low_intensity_fraction: low_fraction,
            high_intensity_fraction: high_fraction,
            tss_per_hour,
        }
    }

    fn confidence(&self, weeks: &[WeeklyMetrics], features: &WindowFeatures) -> PhaseConfidence {
        let threshold = self.config.trend_threshold_percent;
        let malformed_volume = weeks.iter().filter(|w| w.total_duration_seconds < 0.0).count() as f64;
        let malformed_tss = weeks.iter().filter(|w| w.total_tss < 0.0).count() as f64;

        let volume =
            (trend_clarity(features.volume_change_percent, threshold) - 25.0 * malformed_volume).clamp(0.0, 100.0);
        let tss = (trend_clarity(features.tss_change_percent, threshold) - 25.0 * malformed_tss).clamp(0.0, 100.0);

        let hr_weeks: Vec<_> = weeks.iter().filter_map(|w| w.hr_zones).collect();
        let intensity = if hr_weeks.is_empty() {
            // Load-per-hour proxy only
            40.0
        } else {
            let count = hr_weeks.len() as f64;
            let dominance = hr_weeks
                .iter()
                .map(|d| d.low_intensity_fraction().max(d.high_intensity_fraction()))
                .sum::<f64>()
                / count;
            let malformation = hr_weeks.iter().map(|d| d.malformation()).sum::<f64>() / count;
            if malformation > 5.0 {
                tracing::warn!(malformation, "Heart rate zone percentages do not sum to 100");
            }
            let coverage = count / weeks.len() as f64;
            (((dominance - 0.5) * 200.0) * coverage - malformation).clamp(0.0, 100.0)
        };

        PhaseConfidence {
            overall: ((volume + intensity + tss) / 3.0).clamp(0.0, 100.0),
            volume,
            intensity,
            tss,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_phase(
        &self,
        all_weeks: &[WeeklyMetrics],
        start: usize,
        end: usize,
        phase: TrainingPhase,
        rule: &'static str,
        baseline: &HistoryBaseline,
        personal_records: &[PersonalRecord],
    ) -> DetectedPhase {
        let weeks = &all_weeks[start..end];
        let features = self.window_features(weeks, baseline);
        let n = weeks.len() as f64;
        let start_date = weeks[0].week_start;
        let end_date = weeks[weeks.len() - 1].week_end();

        DetectedPhase {
            phase,
            start_week: start,
            end_week: end - 1,
            start_date,
            end_date,
            duration_weeks: weeks.len(),
            confidence: self.confidence(weeks, &features),
            volume_trend: features.volume_trend,
            tss_trend: features.tss_trend,
            volume_change_percent: features.volume_change_percent,
            tss_change_percent: features.tss_change_percent,
            fitness_gain: features.fitness_gain,
            avg_weekly_hours: weeks.iter().map(|w| w.duration_hours()).sum::<f64>() / n,
            avg_weekly_tss: weeks.iter().map(|w| w.total_tss).sum::<f64>() / n,
            avg_form: weeks.iter().map(|w| w.avg_form).sum::<f64>() / n,
            hr_zone_profile: Self::hr_zone_profile(weeks),
            performance: Self::performance(weeks, start, personal_records),
            detection_method: DetectionMethod::Hybrid,
            matched_rule: rule.to_string(),
        }
    }

    fn hr_zone_profile(weeks: &[WeeklyMetrics]) -> Option<HrZoneProfile> {
        let distributions: Vec<_> = weeks.iter().filter_map(|w| w.hr_zones).collect();
        if distributions.is_empty() {
            return None;
        }

        let count = distributions.len() as f64;
        let mut average = [0.0; 5];
        for dist in &distributions {
            for (slot, value) in average.iter_mut().zip(dist.zones.iter()) {
                *slot += value / count;
            }
        }

        let mut ranked: Vec<usize> = (0..5).collect();
        ranked.sort_by(|a, b| average[*b].total_cmp(&average[*a]).then(a.cmp(b)));

        Some(HrZoneProfile {
            average_percentages: average,
            dominant_zones: [ranked[0] as u8 + 1, ranked[1] as u8 + 1],
        })
    }

    fn performance(
        weeks: &[WeeklyMetrics],
        offset: usize,
        personal_records: &[PersonalRecord],
    ) -> Option<PhasePerformance> {
        let records: Vec<RecordContext> = personal_records
            .iter()
            .filter_map(|record| {
                let day = record.achieved_at.date_naive();
                weeks
                    .iter()
                    .position(|w| day >= w.week_start && day <= w.week_end())
                    .map(|i| RecordContext {
                        record: record.clone(),
                        week_index: offset + i,
                        fitness: weeks[i].avg_fitness,
                        form: weeks[i].avg_form,
                        weekly_tss: weeks[i].total_tss,
                    })
            })
            .collect();

        if records.is_empty() {
            None
        } else {
            Some(PhasePerformance {
                records_achieved: records.len(),
                records,
            })
        }
    }
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(value: f64, reference: f64) -> f64 {
    if reference > 0.0 && value.is_finite() {
        value / reference
    } else {
        1.0
    }
}

/// How unambiguous a percent change is relative to the trend threshold (0-100)
///
/// Changes near the threshold score 50; clearly flat or clearly trending
/// changes score towards 100.
fn trend_clarity(percent_change: f64, threshold: f64) -> f64 {
    let magnitude = percent_change.abs();
    if !magnitude.is_finite() {
        return 0.0;
    }
    if threshold <= 0.0 {
        return if magnitude == 0.0 { 100.0 } else { (50.0 + magnitude * 2.5).min(100.0) };
    }
    if magnitude <= threshold {
        50.0 + 50.0 * (1.0 - magnitude / threshold)
    } else {
        50.0 + ((magnitude - threshold) * 2.5).min(50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HrZoneDistribution;
    use chrono::{TimeZone, Utc};

    fn week(index: i64, duration: f64, tss: f64, form: f64, hr: Option<[f64; 5]>) -> WeeklyMetrics {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        WeeklyMetrics {
            week_start: monday + chrono::Duration::weeks(index),
            total_distance: duration / 3600.0 * 30_000.0,
            total_duration_seconds: duration,
            total_elevation: 1_000.0,
            activity_count: 5,
            total_tss: tss,
            avg_tss: tss / 5.0,
            avg_fitness: 50.0 + index as f64,
            avg_fatigue: 50.0 + index as f64 - form,
            avg_form: form,
            hr_zones: hr.map(HrZoneDistribution::new),
            activity_ids: vec![format!("week-{}", index)],
        }
    }

    const EASY: [f64; 5] = [45.0, 30.0, 15.0, 7.0, 3.0];
    const HARD: [f64; 5] = [20.0, 20.0, 20.0, 25.0, 15.0];
    const MIXED: [f64; 5] = [30.0, 30.0, 20.0, 15.0, 5.0];

    #[test]
    fn test_insufficient_weeks() {
        let detector = PhaseDetector::new();
        let weeks = vec![week(0, 36000.0, 200.0, -5.0, None), week(1, 36000.0, 200.0, -5.0, None)];
        assert!(detector.detect_phases(&weeks, &[]).is_empty());
        assert!(detector.detect_phases(&[], &[]).is_empty());
    }

    #[test]
    fn test_base_phase() {
        let detector = PhaseDetector::new();
        let weeks = vec![
            week(0, 36000.0, 200.0, -8.0, Some(EASY)),
            week(1, 39600.0, 220.0, -9.0, Some(EASY)),
            week(2, 43200.0, 240.0, -10.0, Some(EASY)),
        ];

        let phases = detector.detect_phases(&weeks, &[]);

        assert_eq!(phases.len(), 1);
        let phase = &phases[0];
        assert_eq!(phase.phase, TrainingPhase::Base);
        assert_eq!(phase.volume_trend, TrendDirection::Increasing);
        assert_eq!(phase.tss_trend, TrendDirection::Increasing);
        assert!((phase.volume_change_percent - 20.0).abs() < 1e-9);
        assert_eq!(phase.duration_weeks, 3);
        assert_eq!(phase.detection_method, DetectionMethod::Hybrid);
        assert_eq!(phase.matched_rule, "high_volume_low_intensity");
        assert_eq!(phase.hr_zone_profile.as_ref().unwrap().dominant_zones, [1, 2]);
        assert!((phase.fitness_gain - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_bounded() {
        let detector = PhaseDetector::new();
        let weeks = vec![
            week(0, 36000.0, 200.0, -8.0, Some(EASY)),
            week(1, 39600.0, 220.0, -9.0, Some(EASY)),
            week(2, 43200.0, 240.0, -10.0, Some(EASY)),
        ];
        let confidence = detector.detect_phases(&weeks, &[])[0].confidence;

        for score in [confidence.overall, confidence.volume, confidence.intensity, confidence.tss] {
            assert!((0.0..=100.0).contains(&score));
        }
        let mean = (confidence.volume + confidence.intensity + confidence.tss) / 3.0;
        assert!((confidence.overall - mean).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_weeks_lower_confidence() {
        let detector = PhaseDetector::new();
        let clean = vec![
            week(0, 36000.0, 200.0, -8.0, Some(EASY)),
            week(1, 36000.0, 200.0, -8.0, Some(EASY)),
            week(2, 36000.0, 200.0, -8.0, Some(EASY)),
        ];
        let mut broken = clean.clone();
        broken[1].total_duration_seconds = -3600.0;
        broken[2].hr_zones = Some(HrZoneDistribution::new([90.0, 80.0, 0.0, 0.0, 0.0]));

        let clean_phase = &detector.detect_phases(&clean, &[])[0];
        let broken_phase = &detector.detect_phases(&broken, &[])[0];

        assert!(broken_phase.confidence.volume < clean_phase.confidence.volume);
        assert!(broken_phase.confidence.intensity < clean_phase.confidence.intensity);
        assert!(broken_phase.confidence.overall < clean_phase.confidence.overall);
    }

    #[test]
    fn test_build_then_peak_then_taper() {
        let detector = PhaseDetector::new();
        let mut weeks = Vec::new();
        // Build: steady volume, mixed intensity, rising TSS
        for (i, tss) in [400.0, 440.0, 480.0].iter().enumerate() {
            weeks.push(week(i as i64, 36000.0, *tss, -15.0, Some(MIXED)));
        }
        // Peak: reduced volume, intensity heavy
        for i in 3..6 {
            weeks.push(week(i, 21600.0, 450.0, -12.0, Some(HARD)));
        }
        // Taper: falling volume, form rising
        for (i, (duration, form)) in [(25200.0, -5.0), (21600.0, 5.0), (16200.0, 15.0)].iter().enumerate() {
            weeks.push(week(6 + i as i64, *duration, 250.0, *form, Some(MIXED)));
        }

        let phases = detector.detect_phases(&weeks, &[]);
        let labels: Vec<_> = phases.iter().map(|p| p.phase).collect();

        assert_eq!(
            labels,
            vec![TrainingPhase::Build, TrainingPhase::Peak, TrainingPhase::Taper]
        );
        assert_eq!(phases[1].start_week, 3);
        assert_eq!(phases[2].end_week, 8);
        assert_eq!(phases[1].hr_zone_profile.as_ref().unwrap().dominant_zones, [4, 1]);
    }

    #[test]
    fn test_recovery_phase() {
        let detector = PhaseDetector::new();
        let mut weeks: Vec<_> = (0..3).map(|i| week(i, 43200.0, 500.0, -20.0, None)).collect();
        weeks.extend((3..6).map(|i| week(i, 14400.0, 120.0, -10.0 + 5.0 * (i - 3) as f64, None)));

        let phases = detector.detect_phases(&weeks, &[]);

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[1].phase, TrainingPhase::Recovery);
        assert_eq!(phases[1].matched_rule, "minimal_load_rising_form");
    }

    #[test]
    fn test_adjacent_windows_merge() {
        let detector = PhaseDetector::new();
        let weeks: Vec<_> = (0..7).map(|i| week(i, 36000.0, 200.0, -5.0, Some(EASY))).collect();

        let phases = detector.detect_phases(&weeks, &[]);

        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].phase, TrainingPhase::Base);
        assert_eq!(phases[0].duration_weeks, 7);
        assert_eq!(phases[0].start_week, 0);
        assert_eq!(phases[0].end_week, 6);
    }

    #[test]
    fn test_personal_records_attached() {
        let detector = PhaseDetector::new();
        let weeks = vec![
            week(0, 36000.0, 200.0, -8.0, Some(EASY)),
            week(1, 39600.0, 220.0, -9.0, Some(EASY)),
            week(2, 43200.0, 240.0, -10.0, Some(EASY)),
        ];
        let records = vec![
            PersonalRecord {
                achieved_at: Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap(),
                category: "5k".to_string(),
            },
            PersonalRecord {
                achieved_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
                category: "10k".to_string(),
            },
        ];

        let phases = detector.detect_phases(&weeks, &records);
        let performance = phases[0].performance.as_ref().unwrap();

        assert_eq!(performance.records_achieved, 1);
        assert_eq!(performance.records[0].week_index, 1);
        assert_eq!(performance.records[0].record.category, "5k");
    }

    #[test]
    fn test_rule_order_is_explicit() {
        let names: Vec<_> = PHASE_RULES.iter().map(|r| r.phase).collect();
        assert_eq!(
            names,
            vec![
                TrainingPhase::Base,
                TrainingPhase::Build,
                TrainingPhase::Peak,
                TrainingPhase::Taper,
                TrainingPhase::Recovery,
                TrainingPhase::Transition,
            ]
        );
    }

    #[test]
    fn test_individual_rules() {
        let config = PhaseDetectionConfig::default();
        let base = WindowFeatures {
            volume_trend: TrendDirection::Stable,
            volume_change_percent: 0.0,
            tss_trend: TrendDirection::Stable,
            tss_change_percent: 0.0,
            fitness_gain: 0.0,
            form_change: 0.0,
            volume_ratio: 1.0,
            tss_ratio: 1.0,
            intensity: IntensityLevel::Low,
            low_intensity_fraction: Some(0.8),
            high_intensity_fraction: Some(0.2),
            tss_per_hour: 50.0,
        };
        assert!(is_base(&base, &config));

        let taper = WindowFeatures {
            volume_trend: TrendDirection::Decreasing,
            form_change: 10.0,
            ..base.clone()
        };
        assert!(!is_base(&taper, &config));
        assert!(is_taper(&taper, &config));

        let unknown = WindowFeatures {
            intensity: IntensityLevel::Unknown,
            ..base.clone()
        };
        let detector = PhaseDetector::new();
        assert_eq!(detector.matching_rule(&unknown).phase, TrainingPhase::Transition);
    }

    #[test]
    fn test_trend_clarity() {
        assert_eq!(trend_clarity(0.0, 5.0), 100.0);
        assert_eq!(trend_clarity(5.0, 5.0), 50.0);
        assert_eq!(trend_clarity(-25.0, 5.0), 100.0);
        assert_eq!(trend_clarity(f64::NAN, 5.0), 0.0);
    }
}
