//! Conversation runtime and logging configuration

use serde::Deserialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// Conversation runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Delay before the single automatic retry of a failed send
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl ChatConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.retry_delay_secs == 0 {
            return Err(ValidationError::InvalidRetryDelay);
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay(),
        }
    }
}

fn default_retry_delay() -> u64 {
    25
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.filter)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidLogFilter(e.to_string()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}
