//! Rolling-window form trend analysis over annotated snapshots

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::FormSnapshot;
use crate::zones::FormZone;

/// Direction of form over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormTrendDirection {
    Improving,
    Stable,
    Declining,
}

/// A day on which the classified zone differed from the previous day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneTransition {
    /// Index into the analyzed window
    pub index: usize,
    pub date: NaiveDate,
    pub from: FormZone,
    pub to: FormZone,
}

/// Trend result for one window size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTrend {
    /// Requested window length in days
    pub window_days: usize,

    /// Snapshots actually covered (shorter when history is shorter than the window)
    pub days_analyzed: usize,

    pub direction: FormTrendDirection,

    /// Absolute relative change in percent
    pub magnitude: f64,

    /// Signed relative change in percent
    pub percent_change: f64,

    pub start_form: f64,
    pub end_form: f64,

    pub zone_changes: Vec<ZoneTransition>,
}

impl FormTrend {
    /// Zone changes per analyzed day, a churn indicator
    pub fn zone_change_rate(&self) -> f64 {
        if self.days_analyzed == 0 {
            0.0
        } else {
            self.zone_changes.len() as f64 / self.days_analyzed as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Relative change (percent) separating a trend from noise
    pub threshold_percent: f64,

    /// Window sizes evaluated by default
    pub default_windows: Vec<usize>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            threshold_percent: 5.0,
            default_windows: vec![7, 14],
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold_percent.is_nan() || self.threshold_percent < 0.0 {
            return Err(ConfigError::OutOfRange {
                parameter: "trend.threshold_percent".to_string(),
                value: self.threshold_percent.to_string(),
                range: "[0, inf)".to_string(),
            });
        }
        Ok(())
    }
}

pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        TrendAnalyzer {
            config: TrendConfig::default(),
        }
    }

    pub fn with_config(config: TrendConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(TrendAnalyzer { config })
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Analyze the most recent `window_days` snapshots
    ///
    /// Returns `None` for an empty history or a zero-length window.
    pub fn analyze_trend(&self, snapshots: &[FormSnapshot], window_days: usize) -> Option<FormTrend> {
        if snapshots.is_empty() || window_days == 0 {
            return None;
        }

        let start = snapshots.len().saturating_sub(window_days);
        let window = &snapshots[start..];
        let first = window.first()?;
        let last = window.last()?;

        let start_form = first.form();
        let end_form = last.form();
        let percent_change = crate::models::TrendDirection::percent_change(start_form, end_form);

        let direction = if percent_change > self.config.threshold_percent {
            FormTrendDirection::Improving
        } else if percent_change < -self.config.threshold_percent {
            FormTrendDirection::Declining
        } else {
            FormTrendDirection::Stable
        };

        let zone_changes = window
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].zone != pair[0].zone)
            .map(|(i, pair)| ZoneTransition {
                index: i + 1,
                date: pair[1].date(),
                from: pair[0].zone,
                to: pair[1].zone,
            })
            .collect();

        Some(FormTrend {
            window_days,
            days_analyzed: window.len(),
            direction,
            magnitude: percent_change.abs(),
            percent_change,
            start_form,
            end_form,
            zone_changes,
        })
    }

    /// Analyze several window sizes independently
    pub fn analyze_windows(&self, snapshots: &[FormSnapshot], windows: &[usize]) -> Vec<FormTrend> {
        windows
            .iter()
            .filter_map(|&window| self.analyze_trend(snapshots, window))
            .collect()
    }

    /// Analyze the configured default windows
    pub fn analyze_default_windows(&self, snapshots: &[FormSnapshot]) -> Vec<FormTrend> {
        self.analyze_windows(snapshots, &self.config.default_windows)
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
