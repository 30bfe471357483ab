use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CalculationError, ConfigError, FormcastError, Result};
use crate::models::{DailyLoadRecord, LoadState};

/// Daily TSS total aggregated from one or more load records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTss {
    /// Date of the training day
    pub date: NaiveDate,

    /// Total TSS for the day (sum of all activities)
    pub total_tss: Decimal,

    /// Number of activities completed on this day
    pub activity_count: u16,

    /// Total moving time for the day in seconds
    pub duration_seconds: u64,
}

/// Time constants for the fitness/fatigue model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmcConfig {
    /// Fitness (CTL) time constant in days (default: 42)
    pub fitness_time_constant: u16,

    /// Fatigue (ATL) time constant in days (default: 7)
    pub fatigue_time_constant: u16,
}

impl Default for PmcConfig {
    fn default() -> Self {
        PmcConfig {
            fitness_time_constant: 42,
            fatigue_time_constant: 7,
        }
    }
}

impl PmcConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.fitness_time_constant == 0 {
            return Err(ConfigError::NonPositiveTimeConstant {
                name: "fitness_time_constant".to_string(),
            });
        }
        if self.fatigue_time_constant == 0 {
            return Err(ConfigError::NonPositiveTimeConstant {
                name: "fatigue_time_constant".to_string(),
            });
        }
        Ok(())
    }
}

/// Exponentially weighted fitness/fatigue simulator
///
/// Every forward projection in the crate goes through [`LoadSimulator::step`],
/// so prediction, taper planning and recovery estimates share one recurrence.
#[derive(Debug, Clone)]
pub struct LoadSimulator {
    config: PmcConfig,
}

impl LoadSimulator {
    /// Create a simulator with the standard 42/7 day constants
    pub fn new() -> Self {
        LoadSimulator {
            config: PmcConfig::default(),
        }
    }

    /// Create a simulator with custom time constants
    pub fn with_config(config: PmcConfig) -> Result<Self> {
        config.validate()?;
        Ok(LoadSimulator { config })
    }

    pub fn config(&self) -> &PmcConfig {
        &self.config
    }

    /// Advance one day: returns the new (fitness, fatigue) pair
    ///
    /// fitness_today = fitness_yesterday + (tss - fitness_yesterday) / fitness_constant
    /// fatigue_today = fatigue_yesterday + (tss - fatigue_yesterday) / fatigue_constant
    pub fn step(&self, fitness: f64, fatigue: f64, tss: f64) -> (f64, f64) {
        let tss = non_negative(tss);
        let fitness = fitness + (tss - fitness) / f64::from(self.config.fitness_time_constant);
        let fatigue = fatigue + (tss - fatigue) / f64::from(self.config.fatigue_time_constant);
        (fitness, fatigue)
    }

    /// Simulate day-by-day load evolution starting from a known state
    ///
    /// The first output is dated `start_date`. Output length equals input length
    /// and an empty input yields an empty series. Negative or non-finite starting
    /// values are clamped to zero; dates past `NaiveDate::MAX` repeat the last date.
    pub fn simulate(
        &self,
        initial_fitness: f64,
        initial_fatigue: f64,
        start_date: NaiveDate,
        daily_tss: &[f64],
    ) -> Vec<LoadState> {
        let mut fitness = non_negative(initial_fitness);
        let mut fatigue = non_negative(initial_fatigue);
        if fitness != initial_fitness || fatigue != initial_fatigue {
            tracing::warn!(initial_fitness, initial_fatigue, "Clamped invalid starting state to zero");
        }
        let mut date = start_date;
        let mut states = Vec::with_capacity(daily_tss.len());

        for (index, &raw_tss) in daily_tss.iter().enumerate() {
            if index > 0 {
                date = match date.succ_opt() {
                    Some(next) => next,
                    None => {
                        tracing::warn!(day = index, "Simulation ran past the last representable date");
                        date
                    }
                };
            }

            let tss = non_negative(raw_tss);
            if tss != raw_tss {
                tracing::warn!(day = index, tss = raw_tss, "Clamped invalid training stress to zero");
            }

            (fitness, fatigue) = self.step(fitness, fatigue, tss);
            states.push(LoadState {
                date,
                training_stress: tss,
                fitness,
                fatigue,
                form: fitness - fatigue,
            });
        }

        states
    }

    /// Aggregate dated load records into per-day totals
    pub fn aggregate_daily_tss(&self, records: &[DailyLoadRecord]) -> BTreeMap<NaiveDate, DailyTss> {
        let mut daily_tss: BTreeMap<NaiveDate, DailyTss> = BTreeMap::new();

        for record in records {
            daily_tss
                .entry(record.date)
                .and_modify(|day| {
                    day.total_tss += record.tss;
                    day.activity_count += 1;
                    day.duration_seconds += u64::from(record.duration_seconds);
                })
                .or_insert(DailyTss {
                    date: record.date,
                    total_tss: record.tss,
                    activity_count: 1,
                    duration_seconds: u64::from(record.duration_seconds),
                });
        }

        daily_tss
    }

    /// Expand aggregated days into a contiguous series, filling rest days with zero
    pub fn daily_tss_series(
        &self,
        daily_tss: &BTreeMap<NaiveDate, DailyTss>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<f64>> {
        if start_date > end_date {
            return Err(FormcastError::validation(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }

        let mut series = Vec::new();
        let mut current_date = start_date;
        while current_date <= end_date {
            let tss = daily_tss
                .get(&current_date)
                .and_then(|d| d.total_tss.to_f64())
                .unwrap_or(0.0);
            series.push(tss);

            current_date = current_date.succ_opt().ok_or_else(|| {
                CalculationError::DateOutOfRange {
                    calculation: "daily TSS series".to_string(),
                }
            })?;
        }

        Ok(series)
    }

    /// Build the observed load history for a date range from raw records
    ///
    /// The model is warmed up from zero over one fitness time constant before
    /// `start_date` so the first reported day is not artificially low.
    pub fn history_from_records(
        &self,
        records: &[DailyLoadRecord],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<LoadState>> {
        let warmup_start = start_date
            .checked_sub_days(chrono::Days::new(u64::from(self.config.fitness_time_constant)))
            .unwrap_or(start_date);

        let daily = self.aggregate_daily_tss(records);
        let series = self.daily_tss_series(&daily, warmup_start, end_date)?;
        tracing::debug!(
            records = records.len(),
            days = series.len(),
            "Simulating observed load history"
        );

        Ok(self
            .simulate(0.0, 0.0, warmup_start, &series)
            .into_iter()
            .filter(|state| state.date >= start_date)
            .collect())
    }
}

impl Default for LoadSimulator {
    fn default() -> Self {
        Self::new()
    }
}

fn non_negative(tss: f64) -> f64 {
    if tss.is_finite() && tss > 0.0 {
        tss
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, tss: Decimal) -> DailyLoadRecord {
        DailyLoadRecord {
            date,
            tss,
            duration_seconds: 3600,
            distance_meters: None,
        }
    }

    #[test]
    fn test_empty_input() {
        let simulator = LoadSimulator::new();
        assert!(simulator.simulate(50.0, 50.0, date(2024, 9, 1), &[]).is_empty());
    }

    #[test]
    fn test_rest_week_raises_form() {
        let simulator = LoadSimulator::new();
        let states = simulator.simulate(50.0, 50.0, date(2024, 9, 1), &[0.0; 7]);

        assert_eq!(states.len(), 7);
        for pair in states.windows(2) {
            assert!(pair[1].form > pair[0].form);
        }
        assert!(states[6].form > 0.0);
        assert_eq!(states[6].date, date(2024, 9, 7));
    }

    #[test]
    fn test_form_identity() {
        let simulator = LoadSimulator::new();
        let tss = [120.0, 0.0, 80.0, 200.0, 45.5, 0.0, 300.0];
        for state in simulator.simulate(33.0, 61.0, date(2024, 9, 1), &tss) {
            assert!((state.form - (state.fitness - state.fatigue)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fatigue_responds_faster() {
        let simulator = LoadSimulator::new();
        let states = simulator.simulate(0.0, 0.0, date(2024, 9, 1), &[100.0]);

        assert!((states[0].fitness - 100.0 / 42.0).abs() < 1e-9);
        assert!((states[0].fatigue - 100.0 / 7.0).abs() < 1e-9);
        assert!(states[0].form < 0.0);
    }

    #[test]
    fn test_invalid_tss_clamped() {
        let simulator = LoadSimulator::new();
        let states = simulator.simulate(10.0, 10.0, date(2024, 9, 1), &[-50.0, f64::NAN]);

        assert_eq!(states[0].training_stress, 0.0);
        assert_eq!(states[1].training_stress, 0.0);
        assert!(states.iter().all(|s| s.fitness >= 0.0 && s.fatigue >= 0.0));
    }

    #[test]
    fn test_negative_starting_state_clamped() {
        let simulator = LoadSimulator::new();
        let states = simulator.simulate(-10.0, f64::NAN, date(2024, 9, 1), &[0.0, 0.0]);

        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|s| s.fitness == 0.0 && s.fatigue == 0.0 && s.form == 0.0));
    }

    #[test]
    fn test_length_preserved_at_last_date() {
        let simulator = LoadSimulator::new();
        let states = simulator.simulate(50.0, 50.0, NaiveDate::MAX.pred_opt().unwrap(), &[50.0; 4]);

        assert_eq!(states.len(), 4);
        assert_eq!(states[1].date, NaiveDate::MAX);
        assert_eq!(states[3].date, NaiveDate::MAX);
    }

    #[test]
    fn test_restartable_from_any_state() {
        let simulator = LoadSimulator::new();
        let tss = [60.0, 80.0, 100.0, 0.0];
        let full = simulator.simulate(40.0, 30.0, date(2024, 9, 1), &tss);

        let resumed = simulator.simulate(full[1].fitness, full[1].fatigue, date(2024, 9, 3), &tss[2..]);
        assert_eq!(resumed, full[2..].to_vec());
    }

    #[test]
    fn test_custom_config() {
        let simulator = LoadSimulator::with_config(PmcConfig {
            fitness_time_constant: 28,
            fatigue_time_constant: 5,
        })
        .unwrap();
        let states = simulator.simulate(0.0, 0.0, date(2024, 9, 1), &[100.0]);

        assert!((states[0].fitness - 100.0 / 28.0).abs() < 1e-9);
        assert!((states[0].fatigue - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_time_constant_rejected() {
        let result = LoadSimulator::with_config(PmcConfig {
            fitness_time_constant: 0,
            ..PmcConfig::default()
        });
        assert!(matches!(result, Err(FormcastError::Configuration(_))));
    }

    #[test]
    fn test_daily_tss_aggregation() {
        let simulator = LoadSimulator::new();
        let day = date(2024, 9, 23);
        let records = vec![record(day, dec!(50)), record(day, dec!(30.5))];

        let daily = simulator.aggregate_daily_tss(&records);

        assert_eq!(daily.len(), 1);
        let totals = daily.get(&day).unwrap();
        assert_eq!(totals.total_tss, dec!(80.5));
        assert_eq!(totals.activity_count, 2);
        assert_eq!(totals.duration_seconds, 7200);
    }

    #[test]
    fn test_series_fills_rest_days() {
        let simulator = LoadSimulator::new();
        let records = vec![
            record(date(2024, 9, 1), dec!(100)),
            record(date(2024, 9, 4), dec!(40)),
        ];
        let daily = simulator.aggregate_daily_tss(&records);
        let series = simulator
            .daily_tss_series(&daily, date(2024, 9, 1), date(2024, 9, 4))
            .unwrap();

        assert_eq!(series, vec![100.0, 0.0, 0.0, 40.0]);
    }

    #[test]
    fn test_series_rejects_inverted_range() {
        let simulator = LoadSimulator::new();
        let result = simulator.daily_tss_series(&BTreeMap::new(), date(2024, 9, 4), date(2024, 9, 1));
        assert!(matches!(result, Err(FormcastError::Validation(_))));
    }

    #[test]
    fn test_history_from_records_includes_warmup() {
        let simulator = LoadSimulator::new();
        let mut records = Vec::new();
        let mut day = date(2024, 8, 1);
        while day <= date(2024, 9, 30) {
            records.push(record(day, dec!(70)));
            day = day.succ_opt().unwrap();
        }

        let history = simulator
            .history_from_records(&records, date(2024, 9, 15), date(2024, 9, 30))
            .unwrap();

        assert_eq!(history.len(), 16);
        assert_eq!(history[0].date, date(2024, 9, 15));
        // Six weeks of warm-up at 70 TSS/day has already built meaningful fitness
        assert!(history[0].fitness > 30.0);
    }
}
