//! AI provider configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::ports::{GenerationOptions, ProviderKind};

/// AI provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Gemini API key
    pub gemini_api_key: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Anthropic API key
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Model used for the protagonist
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used for scoring; falls back to the chat model
    pub evaluation_model: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    pub temperature: Option<f32>,

    /// Tag the cacheable system block for providers that support it
    #[serde(default = "default_prompt_cache")]
    pub prompt_cache: bool,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the configured key for a provider, ignoring blank values.
    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        let key = match provider {
            ProviderKind::Gemini => &self.gemini_api_key,
            ProviderKind::OpenAi => &self.openai_api_key,
            ProviderKind::Anthropic => &self.anthropic_api_key,
        };
        key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn base_url(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Gemini => &self.gemini_base_url,
            ProviderKind::OpenAi => &self.openai_base_url,
            ProviderKind::Anthropic => &self.anthropic_base_url,
        }
    }

    pub fn has_provider(&self, provider: ProviderKind) -> bool {
        self.api_key(provider).is_some()
    }

    /// Model used for the evaluation call.
    pub fn evaluation_model(&self) -> &str {
        self.evaluation_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.default_model)
    }

    /// Sampling options for chat sessions.
    pub fn generation(&self) -> GenerationOptions {
        GenerationOptions {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            json_output: false,
        }
    }

    /// Validate AI configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ValidationError::InvalidTemperature(t));
            }
        }

        for model in [self.default_model.as_str(), self.evaluation_model()] {
            let provider = ProviderKind::for_model(model)
                .map_err(|_| ValidationError::UnsupportedModel(model.to_string()))?;
            if !self.has_provider(provider) {
                return Err(ValidationError::MissingRequired(key_name(provider)));
            }
        }

        Ok(())
    }
}

fn key_name(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Gemini => "GEMINI_API_KEY",
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_base_url: default_gemini_base_url(),
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            default_model: default_model(),
            evaluation_model: None,
            timeout_secs: default_timeout(),
            max_output_tokens: default_max_output_tokens(),
            temperature: None,
            prompt_cache: default_prompt_cache(),
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_prompt_cache() -> bool {
    true
}
