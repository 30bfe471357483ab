//! Forward projection of form under hypothetical training plans
//!
//! [`Predictor::simulate_scenario`] is the what-if primitive; form prediction
//! and recovery estimation are thin policies on top of it, and all of them run
//! through the shared [`LoadSimulator`] recurrence.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{CalculationError, ConfigError, FormcastError, Result};
use crate::models::{LoadState, PlannedLoad};
use crate::pmc::LoadSimulator;
use crate::zones::{FormRange, FormZone, ZoneClassifier};

/// Current fitness/fatigue/form of an athlete
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub fitness: f64,
    pub fatigue: f64,
    pub form: f64,
}

impl TrainingState {
    pub fn new(fitness: f64, fatigue: f64) -> Self {
        TrainingState {
            fitness,
            fatigue,
            form: fitness - fatigue,
        }
    }
}

impl From<&LoadState> for TrainingState {
    fn from(state: &LoadState) -> Self {
        TrainingState {
            fitness: state.fitness,
            fatigue: state.fatigue,
            form: state.form,
        }
    }
}

/// One simulated future day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDay {
    /// 1-based day offset from the scenario start
    pub day: usize,
    pub date: NaiveDate,
    pub tss: f64,
    pub fitness: f64,
    pub fatigue: f64,
    pub form: f64,
    pub zone: FormZone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormPredictionRequest {
    pub target_date: NaiveDate,
    pub planned_load: PlannedLoad,
    /// 0-based day indices forced to zero training stress
    pub recovery_days: Vec<usize>,
    pub current: TrainingState,
    /// Reference "today"; defaults to the current UTC date
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormPrediction {
    pub target_date: NaiveDate,
    pub days_ahead: usize,
    pub predicted_form: f64,
    pub predicted_zone: FormZone,
    pub projected_fitness: f64,
    pub projected_fatigue: f64,
    /// 0-100, decays with horizon and plan variability
    pub confidence: f64,
    pub assumptions: Vec<String>,
    pub recommendations: Vec<String>,
    pub trajectory: Vec<ScenarioDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEstimate {
    /// Days until form enters the target range, or the horizon when `capped`
    pub estimated_days: usize,
    /// True when the target was not reached within the horizon
    pub capped: bool,
    pub daily_form_change_rate: f64,
    pub target_zone: FormZone,
    pub target_form_range: FormRange,
    pub projected_form: f64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Per-day multiplicative confidence decay
    pub confidence_decay: f64,

    /// Maximum confidence points removed for variable plans
    pub max_variance_penalty: f64,

    /// Horizon (days) considered "near-term" for under-training notes
    pub near_term_days: usize,

    /// Recovery simulation horizon under complete rest
    pub rest_horizon_days: usize,

    /// Recovery simulation horizon under active recovery
    pub active_horizon_days: usize,

    /// Active recovery load as a fraction of current fitness
    pub active_recovery_fraction: f64,

    /// Furthest target date accepted by form prediction, in days
    pub max_horizon_days: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            confidence_decay: 0.98,
            max_variance_penalty: 20.0,
            near_term_days: 7,
            rest_horizon_days: 60,
            active_horizon_days: 30,
            active_recovery_fraction: 0.3,
            max_horizon_days: 365,
        }
    }
}

impl PredictionConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.confidence_decay > 0.0 && self.confidence_decay <= 1.0) {
            return Err(ConfigError::OutOfRange {
                parameter: "prediction.confidence_decay".to_string(),
                value: self.confidence_decay.to_string(),
                range: "(0, 1]".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.active_recovery_fraction) {
            return Err(ConfigError::OutOfRange {
                parameter: "prediction.active_recovery_fraction".to_string(),
                value: self.active_recovery_fraction.to_string(),
                range: "[0, 1]".to_string(),
            });
        }
        if self.max_horizon_days == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "prediction.max_horizon_days".to_string(),
                value: "0".to_string(),
                range: "[1, inf)".to_string(),
            });
        }
        Ok(())
    }
}

pub struct Predictor {
    simulator: LoadSimulator,
    classifier: ZoneClassifier,
    config: PredictionConfig,
}

impl Predictor {
    pub fn new() -> Self {
        Predictor {
            simulator: LoadSimulator::new(),
            classifier: ZoneClassifier::new(),
            config: PredictionConfig::default(),
        }
    }

    pub fn with_components(
        simulator: LoadSimulator,
        classifier: ZoneClassifier,
        config: PredictionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Predictor {
            simulator,
            classifier,
            config,
        })
    }

    pub fn simulator(&self) -> &LoadSimulator {
        &self.simulator
    }

    pub fn classifier(&self) -> &ZoneClassifier {
        &self.classifier
    }

    /// Simulate `scenario_days` days after `as_of` under a planned load
    pub fn simulate_scenario(
        &self,
        current: TrainingState,
        as_of: NaiveDate,
        scenario_days: usize,
        planned_load: &PlannedLoad,
    ) -> Vec<ScenarioDay> {
        let Some(first_day) = as_of.succ_opt() else {
            return Vec::new();
        };
        let plan = planned_load.normalize(scenario_days);

        self.simulator
            .simulate(current.fitness, current.fatigue, first_day, &plan)
            .into_iter()
            .enumerate()
            .map(|(i, state)| ScenarioDay {
                day: i + 1,
                date: state.date,
                tss: state.training_stress,
                zone: self.classifier.zone_for(state.form, state.fitness),
                fitness: state.fitness,
                fatigue: state.fatigue,
                form: state.form,
            })
            .collect()
    }

    /// Predict form on `target_date` under a planned load
    ///
    /// A target date before `as_of` or more than `max_horizon_days` ahead is
    /// a validation error; the same day is accepted and reports the current
    /// state.
    pub fn predict_future_form(&self, request: &FormPredictionRequest) -> Result<FormPrediction> {
        let today = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let days_ahead = (request.target_date - today).num_days();
        if days_ahead < 0 {
            return Err(FormcastError::validation(format!(
                "target date {} is before {}",
                request.target_date, today
            )));
        }
        let days = usize::try_from(days_ahead).map_err(|_| CalculationError::InvalidParameter {
            calculation: "form prediction".to_string(),
            parameter: "target_date".to_string(),
            value: request.target_date.to_string(),
        })?;
        if days > self.config.max_horizon_days {
            return Err(FormcastError::validation(format!(
                "target date {} is {} days ahead; the limit is {}",
                request.target_date, days, self.config.max_horizon_days
            )));
        }

        let mut plan = request.planned_load.normalize(days);
        for &index in &request.recovery_days {
            if let Some(tss) = plan.get_mut(index) {
                *tss = 0.0;
            }
        }

        let trajectory = self.simulate_scenario(request.current, today, days, &PlannedLoad::Daily(plan.clone()));
        let (fitness, fatigue, form) = trajectory
            .last()
            .map(|d| (d.fitness, d.fatigue, d.form))
            .unwrap_or((request.current.fitness, request.current.fatigue, request.current.form));
        let zone = self.classifier.zone_for(form, fitness);
        let confidence = self.prediction_confidence(days, &plan);

        tracing::debug!(days, form, ?zone, confidence, "Form prediction");

        let mut assumptions = vec![
            format!(
                "Fitness and fatigue time constants of {} and {} days",
                self.simulator.config().fitness_time_constant,
                self.simulator.config().fatigue_time_constant
            ),
            "Planned training stress is completed exactly as scheduled".to_string(),
        ];
        match &request.planned_load {
            PlannedLoad::Constant(tss) => {
                assumptions.push(format!("Constant daily training stress of {:.0}", tss))
            }
            PlannedLoad::Daily(values) if values.len() < days => assumptions.push(format!(
                "Plan covers {} of {} days; remaining days are rest",
                values.len(),
                days
            )),
            PlannedLoad::Daily(_) => {}
        }
        if !request.recovery_days.is_empty() {
            assumptions.push(format!("{} scheduled recovery day(s) with zero load", request.recovery_days.len()));
        }

        Ok(FormPrediction {
            target_date: request.target_date,
            days_ahead: days,
            predicted_form: form,
            predicted_zone: zone,
            projected_fitness: fitness,
            projected_fatigue: fatigue,
            confidence,
            assumptions,
            recommendations: self.prediction_recommendations(zone, days, fitness, request.current.fitness),
            trajectory,
        })
    }

    /// Confidence = 100 x decay^days, minus a penalty for variable plans
    fn prediction_confidence(&self, days: usize, plan: &[f64]) -> f64 {
        let exponent = i32::try_from(days).unwrap_or(i32::MAX);
        let base = 100.0 * self.config.confidence_decay.powi(exponent);

        let penalty = if plan.len() < 2 {
            0.0
        } else {
            let mean = plan.iter().mean();
            let std_dev = plan.iter().population_std_dev();
            if mean > 0.0 && std_dev.is_finite() {
                (std_dev / mean * self.config.max_variance_penalty).min(self.config.max_variance_penalty)
            } else {
                0.0
            }
        };

        (base - penalty).clamp(0.0, 100.0)
    }

    fn prediction_recommendations(
        &self,
        zone: FormZone,
        days: usize,
        projected_fitness: f64,
        current_fitness: f64,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        match zone {
            FormZone::Overreached => {
                recommendations.push(
                    "Warning: this plan leads to overreaching. Add recovery days or reduce load".to_string(),
                );
            }
            FormZone::Fatigued => {
                recommendations.push("Plan ends heavily fatigued; schedule recovery before any key event".to_string());
            }
            FormZone::OptimalRace => {
                recommendations.push("Plan arrives in the race-ready window".to_string());
            }
            FormZone::Fresh if days <= self.config.near_term_days => {
                recommendations.push(
                    "Form will be fresh very soon; if no event is planned, the load may be too low to build fitness"
                        .to_string(),
                );
            }
            _ => {}
        }

        if projected_fitness < current_fitness * 0.9 {
            recommendations.push(format!(
                "Fitness is projected to drop from {:.0} to {:.0}",
                current_fitness, projected_fitness
            ));
        }

        recommendations
    }

    /// Estimate days until form enters `target_zone`
    ///
    /// Complete rest applies zero load for up to the rest horizon; active
    /// recovery applies a fixed fraction of current fitness for up to the
    /// active horizon. Not converging returns the horizon with `capped` set.
    pub fn estimate_recovery_time(
        &self,
        current: TrainingState,
        target_zone: FormZone,
        use_complete_rest: bool,
    ) -> RecoveryEstimate {
        let target_range = self.classifier.range_for(target_zone, current.fitness);
        let (horizon, daily_load) = if use_complete_rest {
            (self.config.rest_horizon_days, 0.0)
        } else {
            (
                self.config.active_horizon_days,
                current.fitness.max(0.0) * self.config.active_recovery_fraction,
            )
        };

        if target_range.contains(current.form) {
            return RecoveryEstimate {
                estimated_days: 0,
                capped: false,
                daily_form_change_rate: 0.0,
                target_zone,
                target_form_range: target_range,
                projected_form: current.form,
                recommendations: vec![format!("Already in the {} zone", target_zone.label())],
            };
        }

        // Only day offsets are reported, so any fixed origin works
        let origin = NaiveDate::MIN;
        let days = self.simulate_scenario(current, origin, horizon, &PlannedLoad::Constant(daily_load));
        let reached = days.iter().find(|d| target_range.contains(d.form));

        let (estimated_days, projected_form, capped) = match reached {
            Some(day) => (day.day, day.form, false),
            None => {
                let last_form = days.last().map(|d| d.form).unwrap_or(current.form);
                tracing::warn!(horizon, ?target_zone, "Recovery target not reached within horizon");
                (horizon, last_form, true)
            }
        };

        let daily_form_change_rate = if estimated_days > 0 {
            (projected_form - current.form) / estimated_days as f64
        } else {
            0.0
        };

        let mut recommendations = Vec::new();
        if use_complete_rest {
            recommendations.push("Complete rest: no structured training until the target is reached".to_string());
        } else {
            recommendations.push(format!(
                "Active recovery: keep daily load around {:.0} TSS at easy intensity",
                daily_load
            ));
        }
        if capped {
            recommendations.push(format!(
                "Target not reached within {} days; the estimate is capped",
                horizon
            ));
            if !use_complete_rest {
                recommendations.push("Consider complete rest to recover faster".to_string());
            }
        } else if estimated_days > 14 {
            recommendations.push("Recovery will take more than two weeks; monitor sleep and HRV".to_string());
        }

        RecoveryEstimate {
            estimated_days,
            capped,
            daily_form_change_rate,
            target_zone,
            target_form_range: target_range,
            projected_form,
            recommendations,
        }
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new()
    }
}
