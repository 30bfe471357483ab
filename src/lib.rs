// Library interface for formcast
// Training-load modelling: fitness/fatigue simulation, readiness zones,
// phase detection, form prediction, taper planning and phase recommendations.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod phases;
pub mod pmc;
pub mod prediction;
pub mod recommendation;
pub mod store;
pub mod taper;
pub mod trends;
pub mod zones;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use error::{CalculationError, ConfigError, FormcastError, Result};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use phases::{DetectedPhase, PhaseDetector};
pub use pmc::{LoadSimulator, PmcConfig};
pub use prediction::{FormPrediction, FormPredictionRequest, Predictor, RecoveryEstimate, ScenarioDay, TrainingState};
pub use recommendation::{PhaseRecommendation, RecommendationEngine, TargetModel};
pub use store::{InMemorySnapshotStore, SnapshotStore};
pub use taper::{TaperPlan, TaperPlanner, TaperRequest, TaperStrategy};
pub use trends::{FormTrend, FormTrendDirection, TrendAnalyzer};
pub use zones::{FormZone, ZoneClassifier};
