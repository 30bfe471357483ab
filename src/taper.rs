//! Pre-race taper schedules
//!
//! A taper reduces daily training stress from a baseline of
//! `baseline_fitness_factor × fitness` toward race day. The shape of the
//! reduction is a [`TaperStrategy`]; the resulting load is simulated forward
//! to give a predicted form and zone for every day of the schedule.

use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CalculationError, ConfigError, FormcastError, Result};
use crate::models::PlannedLoad;
use crate::prediction::{Predictor, TrainingState};
use crate::zones::FormZone;

/// Shape of the volume reduction over the taper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaperStrategy {
    /// Reduction grows linearly from 0 to the full reduction
    Linear,
    /// Volume retained is `(1 - reduction)^progress`
    Exponential,
    /// Three tiers at one third, two thirds and the full reduction
    Step,
}

impl TaperStrategy {
    pub const ALL: [TaperStrategy; 3] = [TaperStrategy::Linear, TaperStrategy::Exponential, TaperStrategy::Step];

    /// Fractional reduction from baseline at `progress` in (0, 1]
    ///
    /// `reduction` is the full reduction as a fraction (0.5 for 50%).
    pub fn reduction_factor(&self, progress: f64, reduction: f64) -> f64 {
        let progress = progress.clamp(0.0, 1.0);
        let reduction = reduction.clamp(0.0, 1.0);

        match self {
            TaperStrategy::Linear => reduction * progress,
            TaperStrategy::Exponential => 1.0 - (1.0 - reduction).powf(progress),
            TaperStrategy::Step => {
                if progress <= 1.0 / 3.0 {
                    reduction / 3.0
                } else if progress <= 2.0 / 3.0 {
                    reduction * 2.0 / 3.0
                } else {
                    reduction
                }
            }
        }
    }
}

impl std::fmt::Display for TaperStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaperStrategy::Linear => write!(f, "linear"),
            TaperStrategy::Exponential => write!(f, "exponential"),
            TaperStrategy::Step => write!(f, "step"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaperRequest {
    pub race_date: NaiveDate,
    pub taper_duration_days: u32,
    pub target_form: f64,
    pub strategy: TaperStrategy,
    /// Reduction on the final taper day, 0-100
    pub volume_reduction_percent: f64,
    pub maintain_intensity: bool,
    pub current: TrainingState,
}

/// One day of the schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaperDay {
    pub date: NaiveDate,
    pub days_to_race: u32,
    pub planned_tss: f64,
    pub reduction_percent: f64,
    pub predicted_form: f64,
    pub predicted_zone: FormZone,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaperTarget {
    pub target_form: f64,
    pub target_zone: FormZone,
    pub projected_fitness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaperPlan {
    pub race_date: NaiveDate,
    pub taper_start_date: NaiveDate,
    pub taper_duration_days: u32,
    pub current: TrainingState,
    pub target: TaperTarget,
    pub strategy: TaperStrategy,
    pub volume_reduction_percent: f64,
    pub maintain_intensity: bool,
    pub baseline_tss: f64,
    pub days: Vec<TaperDay>,
    pub projected_race_form: f64,
    pub projected_race_zone: FormZone,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl TaperPlan {
    /// Distance of projected race-day form from the target
    pub fn target_miss(&self) -> f64 {
        (self.projected_race_form - self.target.target_form).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaperConfig {
    pub default_duration_days: u32,
    pub default_target_form: f64,
    pub default_volume_reduction_percent: f64,
    pub default_strategy: TaperStrategy,
    pub maintain_intensity: bool,

    /// Baseline daily load as a fraction of current fitness
    pub baseline_fitness_factor: f64,

    // Advisory warning thresholds
    pub low_fitness_warning: f64,
    pub fatigued_form_warning: f64,
    pub short_taper_warning_days: u32,
    pub max_form_swing: f64,
}

impl Default for TaperConfig {
    fn default() -> Self {
        TaperConfig {
            default_duration_days: 14,
            default_target_form: 17.0,
            default_volume_reduction_percent: 50.0,
            default_strategy: TaperStrategy::Exponential,
            maintain_intensity: true,
            baseline_fitness_factor: 0.9,
            low_fitness_warning: 40.0,
            fatigued_form_warning: -20.0,
            short_taper_warning_days: 7,
            max_form_swing: 30.0,
        }
    }
}

impl TaperConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.default_volume_reduction_percent) {
            return Err(ConfigError::OutOfRange {
                parameter: "taper.default_volume_reduction_percent".to_string(),
                value: self.default_volume_reduction_percent.to_string(),
                range: "[0, 100]".to_string(),
            });
        }
        if self.default_duration_days == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "taper.default_duration_days".to_string(),
                value: "0".to_string(),
                range: "[1, inf)".to_string(),
            });
        }
        if self.baseline_fitness_factor.is_nan() || self.baseline_fitness_factor < 0.0 {
            return Err(ConfigError::OutOfRange {
                parameter: "taper.baseline_fitness_factor".to_string(),
                value: self.baseline_fitness_factor.to_string(),
                range: "[0, inf)".to_string(),
            });
        }
        Ok(())
    }
}

pub struct TaperPlanner {
    predictor: Predictor,
    config: TaperConfig,
}

impl TaperPlanner {
    pub fn new() -> Self {
        TaperPlanner {
            predictor: Predictor::new(),
            config: TaperConfig::default(),
        }
    }

    pub fn with_config(predictor: Predictor, config: TaperConfig) -> Result<Self> {
        config.validate()?;
        Ok(TaperPlanner { predictor, config })
    }

    /// A request carrying the configured defaults
    pub fn request(&self, race_date: NaiveDate, current: TrainingState) -> TaperRequest {
        TaperRequest {
            race_date,
            taper_duration_days: self.config.default_duration_days,
            target_form: self.config.default_target_form,
            strategy: self.config.default_strategy,
            volume_reduction_percent: self.config.default_volume_reduction_percent,
            maintain_intensity: self.config.maintain_intensity,
            current,
        }
    }

    /// Build a day-by-day taper ending the day before `race_date`
    ///
    /// Warnings are advisory and never prevent plan generation.
    pub fn generate_taper_plan(&self, request: &TaperRequest) -> Result<TaperPlan> {
        if request.taper_duration_days == 0 {
            return Err(FormcastError::validation("taper duration must be at least one day"));
        }
        if !(0.0..=100.0).contains(&request.volume_reduction_percent) {
            return Err(FormcastError::validation(format!(
                "volume reduction {} is outside 0-100%",
                request.volume_reduction_percent
            )));
        }

        let duration = request.taper_duration_days;
        let taper_start_date = request
            .race_date
            .checked_sub_days(Days::new(u64::from(duration)))
            .ok_or_else(|| CalculationError::DateOutOfRange {
                calculation: "taper start".to_string(),
            })?;
        let simulation_origin = taper_start_date
            .pred_opt()
            .ok_or_else(|| CalculationError::DateOutOfRange {
                calculation: "taper start".to_string(),
            })?;

        let current = request.current;
        let baseline_tss = (current.fitness * self.config.baseline_fitness_factor).max(0.0);
        let reduction = request.volume_reduction_percent / 100.0;

        let reductions: Vec<f64> = (0..duration)
            .map(|i| {
                let progress = f64::from(i + 1) / f64::from(duration);
                request.strategy.reduction_factor(progress, reduction)
            })
            .collect();
        let planned: Vec<f64> = reductions.iter().map(|r| baseline_tss * (1.0 - r)).collect();

        let simulated = self.predictor.simulate_scenario(
            current,
            simulation_origin,
            planned.len(),
            &PlannedLoad::Daily(planned.clone()),
        );

        let days: Vec<TaperDay> = simulated
            .iter()
            .zip(reductions.iter())
            .map(|(day, reduction)| {
                let days_to_race = duration + 1 - day.day as u32;
                TaperDay {
                    date: day.date,
                    days_to_race,
                    planned_tss: day.tss,
                    reduction_percent: reduction * 100.0,
                    predicted_form: day.form,
                    predicted_zone: day.zone,
                    note: taper_note(days_to_race, request.maintain_intensity),
                }
            })
            .collect();

        let (projected_race_form, projected_fitness) = simulated
            .last()
            .map(|d| (d.form, d.fitness))
            .unwrap_or((current.form, current.fitness));
        let classifier = self.predictor.classifier();
        let projected_race_zone = classifier.zone_for(projected_race_form, projected_fitness);
        let target_zone = classifier.zone_for(request.target_form, current.fitness);

        tracing::debug!(
            strategy = %request.strategy,
            duration,
            baseline_tss,
            projected_race_form,
            "Generated taper plan"
        );

        Ok(TaperPlan {
            race_date: request.race_date,
            taper_start_date,
            taper_duration_days: duration,
            current,
            target: TaperTarget {
                target_form: request.target_form,
                target_zone,
                projected_fitness,
            },
            strategy: request.strategy,
            volume_reduction_percent: request.volume_reduction_percent,
            maintain_intensity: request.maintain_intensity,
            baseline_tss,
            warnings: self.warnings(request),
            recommendations: self.recommendations(request, projected_race_form, projected_fitness),
            days,
            projected_race_form,
            projected_race_zone,
        })
    }

    /// Build the plan under every strategy, closest to target first
    pub fn compare_strategies(&self, request: &TaperRequest) -> Result<Vec<TaperPlan>> {
        let mut plans = TaperStrategy::ALL
            .par_iter()
            .map(|&strategy| {
                let request = TaperRequest {
                    strategy,
                    ..request.clone()
                };
                self.generate_taper_plan(&request)
            })
            .collect::<Result<Vec<_>>>()?;

        plans.sort_by(|a, b| a.target_miss().total_cmp(&b.target_miss()));
        Ok(plans)
    }

    fn warnings(&self, request: &TaperRequest) -> Vec<String> {
        let current = request.current;
        let mut warnings = Vec::new();

        if current.fitness < self.config.low_fitness_warning {
            warnings.push(format!(
                "Fitness is low ({:.0}); a taper will not add fitness and may leave you underprepared",
                current.fitness
            ));
        }
        if current.form < self.config.fatigued_form_warning {
            warnings.push(format!(
                "Entering the taper fatigued (form {:.0}); the target may not be reached",
                current.form
            ));
        }
        if request.taper_duration_days < self.config.short_taper_warning_days {
            warnings.push(format!(
                "Short taper ({} days); expect limited freshening",
                request.taper_duration_days
            ));
        }
        let swing = request.target_form - current.form;
        if swing.abs() > self.config.max_form_swing {
            warnings.push(format!(
                "Target requires a form swing of {:.0} points, more than {:.0}",
                swing, self.config.max_form_swing
            ));
        }

        warnings
    }

    fn recommendations(&self, request: &TaperRequest, race_form: f64, race_fitness: f64) -> Vec<String> {
        let mut recommendations = Vec::new();
        let miss = race_form - request.target_form;

        if miss < -5.0 {
            recommendations.push(format!(
                "Projected race-day form {:.1} is below the target {:.1}; lengthen the taper or reduce volume further",
                race_form, request.target_form
            ));
        } else if miss > 10.0 {
            recommendations.push(format!(
                "Projected race-day form {:.1} overshoots the target {:.1}; a shorter taper preserves more fitness",
                race_form, request.target_form
            ));
        } else {
            recommendations.push("Taper lands close to the target form".to_string());
        }

        let fitness_loss = request.current.fitness - race_fitness;
        if request.current.fitness > 0.0 && fitness_loss / request.current.fitness > 0.1 {
            recommendations.push(format!("Expect to lose about {:.0} fitness points", fitness_loss));
        }

        if request.maintain_intensity {
            recommendations.push("Keep short race-pace efforts; cut volume, not intensity".to_string());
        } else {
            recommendations.push("Keep all sessions easy; reintroduce a brief opener two days out".to_string());
        }
        recommendations.push("Prioritize sleep and carbohydrate intake in the final three days".to_string());

        recommendations
    }
}

impl Default for TaperPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn taper_note(days_to_race: u32, maintain_intensity: bool) -> String {
    let base = match days_to_race {
        0..=2 => "Final preparation: short openers only, stay off your feet",
        3..=5 => "Race week: reduced volume, check equipment and logistics",
        6..=10 => "Mid taper: volume falling, keep sessions purposeful",
        _ => "Early taper: begin reducing volume",
    };
    if maintain_intensity && days_to_race > 2 {
        format!("{base}. Include a few race-pace efforts")
    } else {
        base.to_string()
    }
}
