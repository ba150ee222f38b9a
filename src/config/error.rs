//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Temperature {0} is outside 0.0-2.0")]
    InvalidTemperature(f32),

    #[error("Model does not match any provider: {0}")]
    UnsupportedModel(String),

    #[error("Retry delay must be at least one second")]
    InvalidRetryDelay,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
