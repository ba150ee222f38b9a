//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CASE_DIALOGUE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use case_dialogue::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Chatting with {}", config.ai.default_model);
//! ```

mod ai;
mod chat;
mod error;

pub use ai::AiConfig;
pub use chat::{ChatConfig, LoggingConfig};
pub use error::{ConfigError, ValidationError};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// AI provider configuration (keys, endpoints, models)
    #[serde(default)]
    pub ai: AiConfig,

    /// Conversation runtime (retry delay)
    #[serde(default)]
    pub chat: ChatConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CASE_DIALOGUE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CASE_DIALOGUE__AI__ANTHROPIC_API_KEY=...` -> `ai.anthropic_api_key = ...`
    /// - `CASE_DIALOGUE__CHAT__RETRY_DELAY_SECS=10` -> `chat.retry_delay_secs = 10`
    /// - `CASE_DIALOGUE__LOGGING__JSON=true` -> `logging.json = true`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CASE_DIALOGUE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        self.chat.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 5] = [
        "CASE_DIALOGUE__AI__GEMINI_API_KEY",
        "CASE_DIALOGUE__AI__DEFAULT_MODEL",
        "CASE_DIALOGUE__AI__PROMPT_CACHE",
        "CASE_DIALOGUE__CHAT__RETRY_DELAY_SECS",
        "CASE_DIALOGUE__LOGGING__JSON",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_defaults_without_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.chat.retry_delay_secs, 25);
        assert!(!config.logging.json);
        assert_eq!(config.ai.default_model, "gemini-2.0-flash");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("CASE_DIALOGUE__AI__GEMINI_API_KEY", "g-key");
        env::set_var("CASE_DIALOGUE__AI__PROMPT_CACHE", "false");
        env::set_var("CASE_DIALOGUE__CHAT__RETRY_DELAY_SECS", "10");
        env::set_var("CASE_DIALOGUE__LOGGING__JSON", "true");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.ai.gemini_api_key.as_deref(), Some("g-key"));
        assert!(!config.ai.prompt_cache);
        assert_eq!(config.chat.retry_delay_secs, 10);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_key_for_model() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("CASE_DIALOGUE__AI__DEFAULT_MODEL", "gpt-4o");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("OPENAI_API_KEY"))
        );
    }
}
