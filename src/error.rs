//! Unified error hierarchy for formcast
//!
//! Only logically impossible requests surface as errors. Insufficient data and
//! non-converging simulations are modelled as empty or capped results by the
//! individual components, never as variants here.

use thiserror::Error;

/// Top-level error type for all formcast operations
#[derive(Debug, Error)]
pub enum FormcastError {
    /// Caller supplied a request that cannot be satisfied (e.g. a past target date)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid or inconsistent engine configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Snapshot store contract violations
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A time constant must be a positive number of days
    #[error("Time constant {name} must be positive")]
    NonPositiveTimeConstant { name: String },

    /// Zone boundaries must be strictly descending
    #[error("Zone boundaries must be strictly descending: {boundaries:?}")]
    UnorderedZoneBoundaries { boundaries: Vec<f64> },

    /// Parameter outside its permitted range
    #[error("Parameter {parameter}={value} outside {range}")]
    OutOfRange {
        parameter: String,
        value: String,
        range: String,
    },
}

/// Calculation errors
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },

    /// Date arithmetic left the representable calendar
    #[error("Date out of range in {calculation}")]
    DateOutOfRange { calculation: String },
}

/// Result type alias for formcast operations
pub type Result<T> = std::result::Result<T, FormcastError>;

impl FormcastError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        FormcastError::Validation(message.into())
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FormcastError::Validation(_) => ErrorSeverity::Warning,
            FormcastError::Configuration(_) => ErrorSeverity::Error,
            FormcastError::Calculation(_) => ErrorSeverity::Error,
            FormcastError::Storage(_) => ErrorSeverity::Error,
            FormcastError::Io(_) => ErrorSeverity::Error,
            FormcastError::Serialization(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            FormcastError::Validation(reason) => {
                format!("The request could not be processed: {}", reason)
            }
            FormcastError::Configuration(err) => {
                format!("Engine configuration is invalid ({}). Check your config file.", err)
            }
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for FormcastError {
    fn from(err: serde_json::Error) -> Self {
        FormcastError::Serialization(err.to_string())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents the operation
    Error,
    /// Caller mistake; the engine itself is healthy
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = FormcastError::validation("target date in the past");
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::WARN);

        let err = FormcastError::Configuration(ConfigError::NonPositiveTimeConstant {
            name: "fitness_time_constant".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_user_messages() {
        let err = FormcastError::validation("target date 2024-01-01 is in the past");
        assert!(err.user_message().contains("could not be processed"));

        let err = FormcastError::Storage("duplicate".to_string());
        assert_eq!(err.user_message(), "Storage error: duplicate");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnorderedZoneBoundaries {
            boundaries: vec![20.0, 25.0],
        };
        assert!(err.to_string().contains("strictly descending"));
    }
}
