//! Next-phase recommendations from detected phases and recent load
//!
//! Decisions come from [`RECOMMENDATION_RULES`], evaluated in order; the first
//! rule that fires determines the recommended phase. Every recommendation
//! carries numeric target ranges plus free-text actions and cautions.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{FormSnapshot, TrainingPhase, TrendDirection, WeeklyMetrics};
use crate::phases::DetectedPhase;
use crate::trends::{FormTrendDirection, TrendAnalyzer};
use crate::zones::{FormZone, ZoneClassifier};

/// Optional goal event steering the recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetModel {
    pub event_date: NaiveDate,
    /// Reference "today"; defaults to the current UTC date
    pub as_of: Option<NaiveDate>,
}

impl TargetModel {
    pub fn days_until_event(&self) -> i64 {
        let today = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        (self.event_date - today).num_days()
    }
}

/// Share of training time per intensity band, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityDistribution {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRanges {
    pub duration_weeks: (u32, u32),
    pub weekly_hours: (f64, f64),
    pub weekly_tss: (f64, f64),
    pub form_range: (f64, f64),
    /// Heart-rate zones (1-5) to emphasize
    pub hr_zone_emphasis: Vec<u8>,
    pub intensity_distribution: IntensityDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecommendation {
    pub current_phase: Option<TrainingPhase>,
    pub recommended_phase: TrainingPhase,
    /// Name of the rule that fired
    pub rule: String,
    pub reasoning: String,
    pub confidence: f64,
    pub weeks_in_phase: usize,
    pub avg_form: f64,
    pub avg_fitness: f64,
    pub targets: TargetRanges,
    pub actions: Vec<String>,
    pub cautions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Trailing weeks averaged for form and fitness
    pub trailing_weeks: usize,

    pub overload_form: f64,
    pub max_weeks_in_phase: usize,
    pub max_overreached_days: usize,
    /// Overreaching beyond this widens recovery to 2-3 weeks
    pub extended_recovery_days: usize,

    pub fresh_idle_form: f64,
    pub event_taper_days: i64,

    pub base_weeks_before_build: usize,
    pub build_weeks_before_peak: usize,
    pub build_min_fitness: f64,
    pub peak_weeks_before_taper: usize,
    pub recovery_exit_form: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig {
            trailing_weeks: 4,
            overload_form: -25.0,
            max_weeks_in_phase: 12,
            max_overreached_days: 7,
            extended_recovery_days: 14,
            fresh_idle_form: 20.0,
            event_taper_days: 21,
            base_weeks_before_build: 8,
            build_weeks_before_peak: 6,
            build_min_fitness: 50.0,
            peak_weeks_before_taper: 3,
            recovery_exit_form: 10.0,
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trailing_weeks == 0 {
            return Err(ConfigError::OutOfRange {
                parameter: "recommendation.trailing_weeks".to_string(),
                value: "0".to_string(),
                range: "[1, inf)".to_string(),
            });
        }
        Ok(())
    }
}

/// Facts a rule decides on
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionContext {
    pub current_phase: Option<TrainingPhase>,
    pub weeks_in_phase: usize,
    pub avg_form: f64,
    pub avg_fitness: f64,
    pub overreached_days: usize,
    pub form_rising: bool,
    pub days_until_event: Option<i64>,
}

/// Outcome of a fired rule
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub phase: TrainingPhase,
    pub reasoning: String,
    pub confidence: f64,
    pub duration_weeks: Option<(u32, u32)>,
}

pub struct RecommendationRule {
    pub name: &'static str,
    pub decide: fn(&DecisionContext, &RecommendationConfig) -> Option<Decision>,
}

/// Ordered decision rules; the first match wins and the last always matches
pub const RECOMMENDATION_RULES: &[RecommendationRule] = &[
    RecommendationRule {
        name: "overload",
        decide: overload,
    },
    RecommendationRule {
        name: "fresh_idle",
        decide: fresh_idle,
    },
    RecommendationRule {
        name: "event_imminent",
        decide: event_imminent,
    },
    RecommendationRule {
        name: "base_complete",
        decide: base_complete,
    },
    RecommendationRule {
        name: "build_complete",
        decide: build_complete,
    },
    RecommendationRule {
        name: "peak_complete",
        decide: peak_complete,
    },
    RecommendationRule {
        name: "post_taper",
        decide: post_taper,
    },
    RecommendationRule {
        name: "recovered",
        decide: recovered,
    },
    RecommendationRule {
        name: "continue",
        decide: continue_phase,
    },
];

fn overload(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    let low_form = ctx.avg_form < config.overload_form;
    let too_long = ctx.weeks_in_phase > config.max_weeks_in_phase;
    let overreached = ctx.overreached_days > config.max_overreached_days;
    if !(low_form || too_long || overreached) {
        return None;
    }

    let mut reasons = Vec::new();
    if low_form {
        reasons.push(format!("average form {:.1} is below {:.0}", ctx.avg_form, config.overload_form));
    }
    if too_long {
        reasons.push(format!("{} weeks in the current phase", ctx.weeks_in_phase));
    }
    if overreached {
        reasons.push(format!("{} overreached days in this phase", ctx.overreached_days));
    }
    let duration = if ctx.overreached_days > config.extended_recovery_days {
        (2, 3)
    } else {
        (1, 2)
    };

    Some(Decision {
        phase: TrainingPhase::Recovery,
        reasoning: format!("Accumulated load needs absorbing: {}", reasons.join(", ")),
        confidence: 90.0,
        duration_weeks: Some(duration),
    })
}

fn fresh_idle(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    if ctx.avg_form <= config.fresh_idle_form || ctx.form_rising {
        return None;
    }
    let phase = if ctx.current_phase == Some(TrainingPhase::Recovery) {
        TrainingPhase::Build
    } else {
        TrainingPhase::Base
    };
    Some(Decision {
        phase,
        reasoning: format!(
            "Average form {:.1} is well rested and no longer rising; resume structured training",
            ctx.avg_form
        ),
        confidence: 75.0,
        duration_weeks: None,
    })
}

fn event_imminent(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    let days = ctx.days_until_event?;
    if !(0..=config.event_taper_days).contains(&days) {
        return None;
    }
    if matches!(ctx.current_phase, Some(TrainingPhase::Taper | TrainingPhase::Recovery)) {
        return None;
    }
    let weeks = u32::try_from((days + 6) / 7).unwrap_or(1).max(1);
    Some(Decision {
        phase: TrainingPhase::Taper,
        reasoning: format!("Target event in {} days; begin tapering", days),
        confidence: 85.0,
        duration_weeks: Some((weeks.saturating_sub(1).max(1), weeks)),
    })
}

fn base_complete(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    (ctx.current_phase == Some(TrainingPhase::Base) && ctx.weeks_in_phase >= config.base_weeks_before_build).then(
        || Decision {
            phase: TrainingPhase::Build,
            reasoning: format!("{} weeks of base completed; add intensity", ctx.weeks_in_phase),
            confidence: 80.0,
            duration_weeks: None,
        },
    )
}

fn build_complete(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    let ready = ctx.current_phase == Some(TrainingPhase::Build)
        && ctx.weeks_in_phase >= config.build_weeks_before_peak
        && ctx.avg_fitness > config.build_min_fitness;
    ready.then(|| Decision {
        phase: TrainingPhase::Peak,
        reasoning: format!(
            "{} weeks of build with fitness {:.0}; sharpen for peak performance",
            ctx.weeks_in_phase, ctx.avg_fitness
        ),
        confidence: 80.0,
        duration_weeks: None,
    })
}

fn peak_complete(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    (ctx.current_phase == Some(TrainingPhase::Peak) && ctx.weeks_in_phase >= config.peak_weeks_before_taper).then(
        || Decision {
            phase: TrainingPhase::Taper,
            reasoning: format!("{} weeks of peak training; taper to realize the gains", ctx.weeks_in_phase),
            confidence: 80.0,
            duration_weeks: None,
        },
    )
}

fn post_taper(ctx: &DecisionContext, _: &RecommendationConfig) -> Option<Decision> {
    (ctx.current_phase == Some(TrainingPhase::Taper)).then(|| Decision {
        phase: TrainingPhase::Recovery,
        reasoning: "Taper complete; recover after the race".to_string(),
        confidence: 80.0,
        duration_weeks: None,
    })
}

fn recovered(ctx: &DecisionContext, config: &RecommendationConfig) -> Option<Decision> {
    (ctx.current_phase == Some(TrainingPhase::Recovery) && ctx.avg_form > config.recovery_exit_form).then(|| {
        Decision {
            phase: TrainingPhase::Build,
            reasoning: format!("Form {:.1} shows recovery is complete; return to build", ctx.avg_form),
            confidence: 75.0,
            duration_weeks: None,
        }
    })
}

fn continue_phase(ctx: &DecisionContext, _: &RecommendationConfig) -> Option<Decision> {
    match ctx.current_phase {
        None | Some(TrainingPhase::Transition) => Some(Decision {
            phase: TrainingPhase::Base,
            reasoning: "No structured phase in progress; start with aerobic base".to_string(),
            confidence: 60.0,
            duration_weeks: None,
        }),
        Some(phase) => Some(Decision {
            phase,
            reasoning: format!("Continue the {} phase ({} weeks so far)", phase, ctx.weeks_in_phase),
            confidence: 65.0,
            duration_weeks: None,
        }),
    }
}

pub struct RecommendationEngine {
    classifier: ZoneClassifier,
    trends: TrendAnalyzer,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new() -> Self {
        RecommendationEngine {
            classifier: ZoneClassifier::new(),
            trends: TrendAnalyzer::new(),
            config: RecommendationConfig::default(),
        }
    }

    pub fn with_components(
        classifier: ZoneClassifier,
        trends: TrendAnalyzer,
        config: RecommendationConfig,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(RecommendationEngine {
            classifier,
            trends,
            config,
        })
    }

    /// Recommend the next training phase
    ///
    /// `snapshots` are optional daily history used for overreaching counts and
    /// form trend; without them both are estimated from the weekly metrics.
    /// Returns `None` only when there are no phases and no weekly metrics.
    pub fn recommend_next_phase(
        &self,
        phases: &[DetectedPhase],
        recent_weeks: &[WeeklyMetrics],
        snapshots: &[FormSnapshot],
        target: Option<&TargetModel>,
    ) -> Option<PhaseRecommendation> {
        if phases.is_empty() && recent_weeks.is_empty() {
            return None;
        }

        let context = self.decision_context(phases, recent_weeks, snapshots, target);
        let (rule, decision) = RECOMMENDATION_RULES
            .iter()
            .find_map(|rule| (rule.decide)(&context, &self.config).map(|d| (rule.name, d)))?;

        tracing::debug!(
            rule,
            current = ?context.current_phase,
            recommended = %decision.phase,
            avg_form = context.avg_form,
            "Phase recommendation"
        );

        let phase_confidence = phases.last().map(|p| p.confidence.overall);
        let mut confidence = match phase_confidence {
            Some(c) => (decision.confidence + c) / 2.0,
            None => decision.confidence,
        };
        if recent_weeks.len() < self.config.trailing_weeks {
            confidence -= 10.0;
        }

        let mut targets = target_ranges(decision.phase, recent_weeks, context.avg_fitness);
        if let Some(duration) = decision.duration_weeks {
            targets.duration_weeks = duration;
        }

        Some(PhaseRecommendation {
            current_phase: context.current_phase,
            recommended_phase: decision.phase,
            rule: rule.to_string(),
            reasoning: decision.reasoning,
            confidence: confidence.clamp(0.0, 100.0),
            weeks_in_phase: context.weeks_in_phase,
            avg_form: context.avg_form,
            avg_fitness: context.avg_fitness,
            actions: actions(decision.phase),
            cautions: self.cautions(&context, snapshots),
            targets,
        })
    }

    /// Gather the facts the rules decide on
    pub fn decision_context(
        &self,
        phases: &[DetectedPhase],
        recent_weeks: &[WeeklyMetrics],
        snapshots: &[FormSnapshot],
        target: Option<&TargetModel>,
    ) -> DecisionContext {
        let current = phases.last();
        let trailing = &recent_weeks[recent_weeks.len().saturating_sub(self.config.trailing_weeks)..];

        let (avg_form, avg_fitness) = if !trailing.is_empty() {
            let n = trailing.len() as f64;
            (
                trailing.iter().map(|w| w.avg_form).sum::<f64>() / n,
                trailing.iter().map(|w| w.avg_fitness).sum::<f64>() / n,
            )
        } else if !snapshots.is_empty() {
            let recent = &snapshots[snapshots.len().saturating_sub(self.config.trailing_weeks * 7)..];
            let n = recent.len() as f64;
            (
                recent.iter().map(|s| s.form()).sum::<f64>() / n,
                recent.iter().map(|s| s.state.fitness).sum::<f64>() / n,
            )
        } else {
            (current.map_or(0.0, |p| p.avg_form), 0.0)
        };

        let form_rising = if snapshots.is_empty() {
            match trailing {
                [.., previous, last] => {
                    TrendDirection::from_change(previous.avg_form, last.avg_form, self.trends.config().threshold_percent)
                        == TrendDirection::Increasing
                }
                _ => false,
            }
        } else {
            self.trends
                .analyze_trend(snapshots, 7)
                .is_some_and(|t| t.direction == FormTrendDirection::Improving)
        };

        DecisionContext {
            current_phase: current.map(|p| p.phase),
            weeks_in_phase: current.map_or(0, |p| p.duration_weeks),
            avg_form,
            avg_fitness,
            overreached_days: current.map_or(0, |p| self.overreached_days(p, recent_weeks, snapshots)),
            form_rising,
            days_until_event: target.map(TargetModel::days_until_event),
        }
    }

    /// Days classified overreached since the current phase began
    fn overreached_days(&self, phase: &DetectedPhase, weeks: &[WeeklyMetrics], snapshots: &[FormSnapshot]) -> usize {
        if !snapshots.is_empty() {
            return snapshots
                .iter()
                .filter(|s| s.date() >= phase.start_date && s.zone == FormZone::Overreached)
                .count();
        }
        // Weekly fallback: a whole week at overreached average form counts as seven days
        7 * weeks
            .iter()
            .filter(|w| w.week_start >= phase.start_date)
            .filter(|w| self.classifier.zone_for(w.avg_form, w.avg_fitness) == FormZone::Overreached)
            .count()
    }

    fn cautions(&self, context: &DecisionContext, snapshots: &[FormSnapshot]) -> Vec<String> {
        let mut cautions = Vec::new();

        if context.overreached_days > 0 {
            cautions.push(format!(
                "{} overreached day(s) in the current phase; watch for persistent fatigue",
                context.overreached_days
            ));
        }
        if let Some(trend) = self.trends.analyze_trend(snapshots, 14) {
            if trend.zone_changes.len() > 3 {
                cautions.push(format!(
                    "Form zone changed {} times in {} days; load has been inconsistent",
                    trend.zone_changes.len(),
                    trend.days_analyzed
                ));
            }
        }
        if context.avg_fitness < 30.0 {
            cautions.push("Fitness is low; progress load by no more than 5-10% per week".to_string());
        }
        cautions.push("Reduce load if resting heart rate or HRV deviates from baseline".to_string());

        cautions
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Target ranges scaled from the athlete's recent weekly volume
fn target_ranges(phase: TrainingPhase, recent_weeks: &[WeeklyMetrics], avg_fitness: f64) -> TargetRanges {
    let (hours, tss) = if recent_weeks.is_empty() {
        // Roughly one hour per 10 daily fitness points, fitness x 7 per week
        ((avg_fitness / 10.0).max(3.0), (avg_fitness * 7.0).max(150.0))
    } else {
        let n = recent_weeks.len() as f64;
        (
            recent_weeks.iter().map(WeeklyMetrics::duration_hours).sum::<f64>() / n,
            recent_weeks.iter().map(|w| w.total_tss).sum::<f64>() / n,
        )
    };

    let (duration_weeks, hours_scale, tss_scale, form_range, zones, (low, moderate, high)) = match phase {
        TrainingPhase::Base => ((8, 12), (1.0, 1.15), (0.9, 1.1), (-20.0, -5.0), vec![1, 2], (80.0, 15.0, 5.0)),
        TrainingPhase::Build => ((6, 8), (0.95, 1.1), (1.05, 1.2), (-25.0, -10.0), vec![3, 4], (70.0, 20.0, 10.0)),
        TrainingPhase::Peak => ((2, 4), (0.8, 0.95), (0.95, 1.1), (-15.0, 0.0), vec![4, 5], (65.0, 15.0, 20.0)),
        TrainingPhase::Taper => ((1, 3), (0.5, 0.7), (0.5, 0.7), (15.0, 25.0), vec![4, 5], (75.0, 10.0, 15.0)),
        TrainingPhase::Recovery => ((1, 2), (0.4, 0.6), (0.4, 0.6), (5.0, 15.0), vec![1, 2], (90.0, 10.0, 0.0)),
        TrainingPhase::Transition => ((1, 4), (0.3, 0.5), (0.3, 0.5), (5.0, 25.0), vec![1, 2], (95.0, 5.0, 0.0)),
    };

    TargetRanges {
        duration_weeks,
        weekly_hours: (hours * hours_scale.0, hours * hours_scale.1),
        weekly_tss: (tss * tss_scale.0, tss * tss_scale.1),
        form_range,
        hr_zone_emphasis: zones,
        intensity_distribution: IntensityDistribution { low, moderate, high },
    }
}

fn actions(phase: TrainingPhase) -> Vec<String> {
    let actions: &[&str] = match phase {
        TrainingPhase::Base => &[
            "Build aerobic volume with mostly zone 1-2 sessions",
            "Add one long session per week, extending it gradually",
            "Include strength work twice per week",
        ],
        TrainingPhase::Build => &[
            "Introduce two quality sessions per week at threshold or tempo",
            "Hold long-session duration while intensity rises",
            "Schedule a lighter week every third or fourth week",
        ],
        TrainingPhase::Peak => &[
            "Make key sessions race-specific in pace and duration",
            "Cut junk volume; every session has a purpose",
            "Rehearse race nutrition and equipment",
        ],
        TrainingPhase::Taper => &[
            "Reduce volume progressively while keeping short intense efforts",
            "Prioritize sleep and fueling",
            "Avoid new training stimuli",
        ],
        TrainingPhase::Recovery => &[
            "Keep sessions short and easy, or rest completely",
            "Focus on sleep, nutrition and mobility",
            "Resume structure only once form is positive",
        ],
        TrainingPhase::Transition => &[
            "Train unstructured and for enjoyment",
            "Cross-train to maintain general fitness",
        ],
    };
    actions.iter().map(|a| a.to_string()).collect()
}
