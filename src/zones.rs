//! Readiness zones derived from form (TSB) and fitness (CTL)
//!
//! Six ordered, non-overlapping bands partition the whole real line of form
//! values. Lower bounds are inclusive:
//!
//! - Optimal race: form >= +20
//! - Fresh: +5 to +20
//! - Maintenance: -10 to +5
//! - Productive training: -25 to -10
//! - Fatigued: -35 to -25
//! - Overreached: below -35
//!
//! Athletes carrying more fitness tolerate (and need) larger form swings, so
//! when `fitness_adjusted` is enabled the boundaries widen for high-fitness
//! athletes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;
use crate::models::{FormSnapshot, LoadState};

/// Readiness zone for a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormZone {
    OptimalRace,
    Fresh,
    Maintenance,
    ProductiveTraining,
    Fatigued,
    Overreached,
}

impl FormZone {
    /// All zones from freshest to most fatigued
    pub const ALL: [FormZone; 6] = [
        FormZone::OptimalRace,
        FormZone::Fresh,
        FormZone::Maintenance,
        FormZone::ProductiveTraining,
        FormZone::Fatigued,
        FormZone::Overreached,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormZone::OptimalRace => "Optimal Race",
            FormZone::Fresh => "Fresh",
            FormZone::Maintenance => "Maintenance",
            FormZone::ProductiveTraining => "Productive Training",
            FormZone::Fatigued => "Fatigued",
            FormZone::Overreached => "Overreached",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormZone::OptimalRace => "Peak freshness with fitness intact, ready for a key event",
            FormZone::Fresh => "Well recovered and able to absorb high-quality work",
            FormZone::Maintenance => "Balanced load, fitness holding steady",
            FormZone::ProductiveTraining => "Accumulating fatigue that drives adaptation",
            FormZone::Fatigued => "Heavy accumulated fatigue, adaptation at risk",
            FormZone::Overreached => "Load well beyond recovery capacity",
        }
    }

    pub fn injury_risk(&self) -> RiskLevel {
        match self {
            FormZone::OptimalRace | FormZone::Fresh | FormZone::Maintenance => RiskLevel::Low,
            FormZone::ProductiveTraining => RiskLevel::Moderate,
            FormZone::Fatigued => RiskLevel::High,
            FormZone::Overreached => RiskLevel::VeryHigh,
        }
    }

    pub fn recommended_intensity(&self) -> &'static str {
        match self {
            FormZone::OptimalRace => "Race efforts or short openers",
            FormZone::Fresh => "High intensity intervals are well tolerated",
            FormZone::Maintenance => "Mixed intensity, normal training progression",
            FormZone::ProductiveTraining => "Moderate, keep hard sessions controlled",
            FormZone::Fatigued => "Low intensity only",
            FormZone::Overreached => "Rest or very easy movement",
        }
    }

    pub fn training_focus(&self) -> &'static [&'static str] {
        match self {
            FormZone::OptimalRace => &["Race execution", "Openers", "Sleep and fuelling"],
            FormZone::Fresh => &["Key quality sessions", "Threshold work", "Time trials"],
            FormZone::Maintenance => &["Aerobic volume", "Technique", "Steady progression"],
            FormZone::ProductiveTraining => &["Structured overload", "Endurance", "Recovery between sessions"],
            FormZone::Fatigued => &["Easy aerobic", "Mobility", "Extra sleep"],
            FormZone::Overreached => &["Complete rest", "Nutrition", "Stress reduction"],
        }
    }

    pub fn workout_types(&self) -> &'static [&'static str] {
        match self {
            FormZone::OptimalRace => &["race", "openers"],
            FormZone::Fresh => &["vo2max", "threshold", "tempo"],
            FormZone::Maintenance => &["endurance", "tempo", "sweet spot"],
            FormZone::ProductiveTraining => &["endurance", "sweet spot"],
            FormZone::Fatigued => &["recovery", "easy endurance"],
            FormZone::Overreached => &["rest", "recovery"],
        }
    }
}

impl fmt::Display for FormZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Qualitative injury/illness risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Intent for the inverse range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsbPurpose {
    Race,
    Recovery,
    Training,
}

/// Inclusive lower / exclusive upper form band; `None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FormRange {
    pub fn contains(&self, form: f64) -> bool {
        self.min.map_or(true, |min| form >= min) && self.max.map_or(true, |max| form < max)
    }
}

/// Full classification result with static guidance metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneClassification {
    pub zone: FormZone,
    pub label: String,
    pub description: String,
    pub tsb_range: FormRange,
    pub injury_risk: RiskLevel,
    pub recommended_intensity: String,
    pub characteristics: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Zone boundary configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Lower bounds of optimal race, fresh, maintenance, productive and fatigued,
    /// in strictly descending order. Anything below the last is overreached.
    pub boundaries: [f64; 5],

    /// Widen bands for high-fitness athletes
    pub fitness_adjusted: bool,

    /// Fitness at which bands widen by `moderate_scale`
    pub moderate_fitness: f64,
    pub moderate_scale: f64,

    /// Fitness at which bands widen by `high_scale`
    pub high_fitness: f64,
    pub high_scale: f64,

    /// Target form band for race day
    pub race_range: (f64, f64),

    /// Target form band when recovering
    pub recovery_range: (f64, f64),

    /// Target form band during productive training
    pub training_range: (f64, f64),
}

impl Default for ZoneConfig {
    fn default() -> Self {
        ZoneConfig {
            boundaries: [20.0, 5.0, -10.0, -25.0, -35.0],
            fitness_adjusted: true,
            moderate_fitness: 70.0,
            moderate_scale: 1.1,
            high_fitness: 100.0,
            high_scale: 1.2,
            race_range: (15.0, 25.0),
            recovery_range: (5.0, 15.0),
            training_range: (-25.0, -10.0),
        }
    }
}

impl ZoneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.boundaries.windows(2).all(|pair| pair[0] > pair[1]);
        if !ordered || self.boundaries.iter().any(|b| !b.is_finite()) {
            return Err(ConfigError::UnorderedZoneBoundaries {
                boundaries: self.boundaries.to_vec(),
            });
        }
        for (name, scale) in [("moderate_scale", self.moderate_scale), ("high_scale", self.high_scale)] {
            if scale.is_nan() || scale <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    parameter: name.to_string(),
                    value: scale.to_string(),
                    range: "(0, inf)".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Maps (form, fitness) to a readiness zone
#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    config: ZoneConfig,
}

impl ZoneClassifier {
    pub fn new() -> Self {
        ZoneClassifier {
            config: ZoneConfig::default(),
        }
    }

    pub fn with_config(config: ZoneConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(ZoneClassifier { config })
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Boundary scale for the given fitness level
    fn scale(&self, fitness: f64) -> f64 {
        if !self.config.fitness_adjusted {
            1.0
        } else if fitness >= self.config.high_fitness {
            self.config.high_scale
        } else if fitness >= self.config.moderate_fitness {
            self.config.moderate_scale
        } else {
            1.0
        }
    }

    /// Zone boundaries after fitness adjustment
    pub fn boundaries(&self, fitness: f64) -> [f64; 5] {
        let scale = self.scale(fitness);
        self.config.boundaries.map(|b| b * scale)
    }

    /// Classify without building metadata
    pub fn zone_for(&self, form: f64, fitness: f64) -> FormZone {
        let bounds = self.boundaries(fitness);
        // NaN compares false everywhere and falls through to the last band
        FormZone::ALL
            .iter()
            .zip(bounds.iter())
            .find(|(_, lower)| form >= **lower)
            .map(|(zone, _)| *zone)
            .unwrap_or(FormZone::Overreached)
    }

    /// Form band a zone occupies at the given fitness
    pub fn range_for(&self, zone: FormZone, fitness: f64) -> FormRange {
        let b = self.boundaries(fitness);
        let (min, max) = match zone {
            FormZone::OptimalRace => (Some(b[0]), None),
            FormZone::Fresh => (Some(b[1]), Some(b[0])),
            FormZone::Maintenance => (Some(b[2]), Some(b[1])),
            FormZone::ProductiveTraining => (Some(b[3]), Some(b[2])),
            FormZone::Fatigued => (Some(b[4]), Some(b[3])),
            FormZone::Overreached => (None, Some(b[4])),
        };
        FormRange { min, max }
    }

    /// Classify a (form, fitness) pair with its guidance metadata
    pub fn classify(&self, form: f64, fitness: f64) -> ZoneClassification {
        let zone = self.zone_for(form, fitness);

        ZoneClassification {
            zone,
            label: zone.label().to_string(),
            description: zone.description().to_string(),
            tsb_range: self.range_for(zone, fitness),
            injury_risk: zone.injury_risk(),
            recommended_intensity: zone.recommended_intensity().to_string(),
            characteristics: zone.training_focus().iter().map(|s| s.to_string()).collect(),
            recommendations: Self::zone_recommendations(zone),
        }
    }

    fn zone_recommendations(zone: FormZone) -> Vec<String> {
        let lines: &[&str] = match zone {
            FormZone::OptimalRace => &[
                "Ideal window for a goal race or time trial",
                "Avoid adding volume; staying here too long costs fitness",
            ],
            FormZone::Fresh => &[
                "Good time for high-intensity sessions or racing",
                "Consider a training block if no event is planned",
            ],
            FormZone::Maintenance => &["Continue normal training progression"],
            FormZone::ProductiveTraining => &[
                "Training load is driving adaptation",
                "Schedule a recovery week within the next 1-2 weeks",
            ],
            FormZone::Fatigued => &[
                "Reduce intensity, focus on recovery sessions",
                "Prioritize sleep, nutrition, and active recovery",
            ],
            FormZone::Overreached => &[
                "Prioritize rest and recovery before resuming training",
                "Persistent fatigue may indicate non-functional overreaching",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }

    /// Target form band to aim for given an intent and current fitness
    pub fn recommended_tsb_range(&self, purpose: TsbPurpose, fitness: f64) -> (f64, f64) {
        let scale = self.scale(fitness);
        let (min, max) = match purpose {
            TsbPurpose::Race => self.config.race_range,
            TsbPurpose::Recovery => self.config.recovery_range,
            TsbPurpose::Training => self.config.training_range,
        };
        (min * scale, max * scale)
    }

    /// Attach zones and day-over-day deltas to a load history
    pub fn annotate(&self, states: &[LoadState]) -> Vec<FormSnapshot> {
        let mut snapshots: Vec<FormSnapshot> = Vec::with_capacity(states.len());

        for state in states {
            let zone = self.zone_for(state.form, state.fitness);
            let snapshot = match snapshots.last() {
                Some(prev) => FormSnapshot {
                    state: state.clone(),
                    zone,
                    delta_tss: state.training_stress - prev.state.training_stress,
                    delta_fitness: state.fitness - prev.state.fitness,
                    delta_fatigue: state.fatigue - prev.state.fatigue,
                    delta_form: state.form - prev.state.form,
                    zone_changed: zone != prev.zone,
                },
                None => FormSnapshot {
                    state: state.clone(),
                    zone,
                    delta_tss: 0.0,
                    delta_fitness: 0.0,
                    delta_fatigue: 0.0,
                    delta_form: 0.0,
                    zone_changed: false,
                },
            };
            snapshots.push(snapshot);
        }

        snapshots
    }
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_canonical_bands() {
        let classifier = ZoneClassifier::new();
        assert_eq!(classifier.zone_for(25.0, 60.0), FormZone::OptimalRace);
        assert_eq!(classifier.zone_for(20.0, 60.0), FormZone::OptimalRace);
        assert_eq!(classifier.zone_for(19.99, 60.0), FormZone::Fresh);
        assert_eq!(classifier.zone_for(5.0, 60.0), FormZone::Fresh);
        assert_eq!(classifier.zone_for(0.0, 60.0), FormZone::Maintenance);
        assert_eq!(classifier.zone_for(-10.0, 60.0), FormZone::Maintenance);
        assert_eq!(classifier.zone_for(-10.01, 60.0), FormZone::ProductiveTraining);
        assert_eq!(classifier.zone_for(-25.0, 60.0), FormZone::ProductiveTraining);
        assert_eq!(classifier.zone_for(-30.0, 60.0), FormZone::Fatigued);
        assert_eq!(classifier.zone_for(-35.0, 60.0), FormZone::Fatigued);
        assert_eq!(classifier.zone_for(-40.0, 60.0), FormZone::Overreached);
    }

    #[test]
    fn test_classify_metadata() {
        let classifier = ZoneClassifier::new();

        let race = classifier.classify(25.0, 60.0);
        assert_eq!(race.zone, FormZone::OptimalRace);
        assert_eq!(race.label, "Optimal Race");
        assert_eq!(race.tsb_range.min, Some(20.0));
        assert_eq!(race.tsb_range.max, None);

        let over = classifier.classify(-40.0, 60.0);
        assert_eq!(over.zone, FormZone::Overreached);
        assert_eq!(over.injury_risk, RiskLevel::VeryHigh);
        assert!(!over.recommendations.is_empty());
    }

    #[test]
    fn test_high_fitness_widens_bands() {
        let classifier = ZoneClassifier::new();
        // -38 is overreached for a moderate athlete but only fatigued at CTL 110
        assert_eq!(classifier.zone_for(-38.0, 60.0), FormZone::Overreached);
        assert_eq!(classifier.zone_for(-38.0, 110.0), FormZone::Fatigued);
        assert_eq!(classifier.zone_for(21.0, 80.0), FormZone::Fresh);
    }

    #[test]
    fn test_fitness_adjustment_disabled() {
        let classifier = ZoneClassifier::with_config(ZoneConfig {
            fitness_adjusted: false,
            ..ZoneConfig::default()
        })
        .unwrap();
        assert_eq!(classifier.zone_for(-38.0, 110.0), FormZone::Overreached);
    }

    #[test]
    fn test_ranges_match_classification() {
        let classifier = ZoneClassifier::new();
        for fitness in [30.0, 75.0, 120.0] {
            for zone in FormZone::ALL {
                let range = classifier.range_for(zone, fitness);
                if let Some(min) = range.min {
                    assert_eq!(classifier.zone_for(min, fitness), zone);
                }
            }
        }
    }

    #[test]
    fn test_recommended_tsb_range() {
        let classifier = ZoneClassifier::new();
        assert_eq!(classifier.recommended_tsb_range(TsbPurpose::Race, 50.0), (15.0, 25.0));
        assert_eq!(classifier.recommended_tsb_range(TsbPurpose::Recovery, 50.0), (5.0, 15.0));

        let (min, max) = classifier.recommended_tsb_range(TsbPurpose::Race, 110.0);
        assert!((min - 18.0).abs() < 1e-9);
        assert!((max - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_boundaries_rejected() {
        let result = ZoneClassifier::with_config(ZoneConfig {
            boundaries: [20.0, 25.0, -10.0, -25.0, -35.0],
            ..ZoneConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_annotate_deltas() {
        let classifier = ZoneClassifier::new();
        let day = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let states = vec![
            LoadState { date: day, training_stress: 50.0, fitness: 50.0, fatigue: 48.0, form: 2.0 },
            LoadState {
                date: day.succ_opt().unwrap(),
                training_stress: 0.0,
                fitness: 48.8,
                fatigue: 41.1,
                form: 7.7,
            },
        ];

        let snapshots = classifier.annotate(&states);

        assert_eq!(snapshots.len(), 2);
        assert!(!snapshots[0].zone_changed);
        assert_eq!(snapshots[0].delta_form, 0.0);
        assert_eq!(snapshots[1].zone, FormZone::Fresh);
        assert!(snapshots[1].zone_changed);
        assert!((snapshots[1].delta_tss + 50.0).abs() < 1e-9);
        assert!((snapshots[1].delta_form - 5.7).abs() < 1e-9);
    }
}
