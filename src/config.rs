use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::phases::{PhaseDetectionConfig, PhaseDetector};
use crate::pmc::{LoadSimulator, PmcConfig};
use crate::prediction::{PredictionConfig, Predictor};
use crate::recommendation::{RecommendationConfig, RecommendationEngine};
use crate::taper::{TaperConfig, TaperPlanner};
use crate::trends::{TrendAnalyzer, TrendConfig};
use crate::zones::{ZoneClassifier, ZoneConfig};

/// Every tunable threshold of the engine
///
/// All sections default individually, so a TOML file only needs the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Fitness/fatigue time constants
    pub load: PmcConfig,

    /// Form zone boundaries and fitness adjustment
    pub zones: ZoneConfig,

    /// Phase detection heuristics
    pub phases: PhaseDetectionConfig,

    /// Trend threshold and default windows
    pub trend: TrendConfig,

    /// Prediction confidence and recovery horizons
    pub prediction: PredictionConfig,

    /// Taper defaults and warning thresholds
    pub taper: TaperConfig,

    /// Next-phase decision thresholds
    pub recommendation: RecommendationConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Last modification timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        ConfigMetadata {
            version: "1.0".to_string(),
            updated_at: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig = toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Some(Utc::now());

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".formcast")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default configuration ({}): {:#}", config_path.display(), e);
                Self::default()
            }
        }
    }

    /// Check every section
    pub fn validate(&self) -> crate::error::Result<()> {
        self.load.validate()?;
        self.zones.validate()?;
        self.phases.validate()?;
        self.trend.validate()?;
        self.prediction.validate()?;
        self.taper.validate()?;
        self.recommendation.validate()?;
        Ok(())
    }

    pub fn load_simulator(&self) -> crate::error::Result<LoadSimulator> {
        LoadSimulator::with_config(self.load.clone())
    }

    pub fn zone_classifier(&self) -> crate::error::Result<ZoneClassifier> {
        ZoneClassifier::with_config(self.zones.clone())
    }

    pub fn trend_analyzer(&self) -> crate::error::Result<TrendAnalyzer> {
        TrendAnalyzer::with_config(self.trend.clone())
    }

    pub fn phase_detector(&self) -> crate::error::Result<PhaseDetector> {
        PhaseDetector::with_config(self.phases.clone())
    }

    pub fn predictor(&self) -> crate::error::Result<Predictor> {
        Predictor::with_components(self.load_simulator()?, self.zone_classifier()?, self.prediction.clone())
    }

    pub fn taper_planner(&self) -> crate::error::Result<TaperPlanner> {
        TaperPlanner::with_config(self.predictor()?, self.taper.clone())
    }

    pub fn recommendation_engine(&self) -> crate::error::Result<RecommendationEngine> {
        RecommendationEngine::with_components(
            self.zone_classifier()?,
            self.trend_analyzer()?,
            self.recommendation.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
        assert_eq!(deserialized.load.fitness_time_constant, 42);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [load]
            fatigue_time_constant = 10

            [trend]
            threshold_percent = 8.0
            "#,
        )
        .unwrap();

        assert_eq!(config.load.fatigue_time_constant, 10);
        assert_eq!(config.load.fitness_time_constant, 42);
        assert_eq!(config.trend.threshold_percent, 8.0);
        assert_eq!(config.taper.default_duration_days, 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = EngineConfig::default();
        original.prediction.confidence_decay = 0.95;

        original.save_to_file(&config_path).unwrap();
        let loaded = EngineConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.prediction.confidence_decay, 0.95);
        assert!(loaded.metadata.updated_at.is_some());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[load]\nfitness_time_constant = 0\n").unwrap();

        let err = EngineConfig::load_from_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid configuration"));
    }

    #[test]
    fn test_components_from_config() {
        let mut config = EngineConfig::default();
        config.zones.fitness_adjusted = false;

        let classifier = config.zone_classifier().unwrap();
        assert_eq!(classifier.boundaries(120.0), [20.0, 5.0, -10.0, -25.0, -35.0]);
        assert!(config.taper_planner().is_ok());
        assert!(config.recommendation_engine().is_ok());
        assert!(config.phase_detector().is_ok());
    }
}
