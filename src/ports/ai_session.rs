//! AI Session Port - Interface for stateful conversations with an LLM provider.
//!
//! A session is bound to one provider, one model and one system prompt, and
//! accumulates the exchange history needed to keep later calls coherent.
//! Providers differ in where the system prompt goes, how history is encoded
//! and whether cache directives exist; callers see none of that.
//!
//! # Example
//!
//! ```ignore
//! let mut session = factory.open(SessionSpec::new("claude-sonnet-4", prompt))?;
//! let reply = session.send("I think we should stay in catering").await?;
//! println!("{}", reply.text);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::conversation::{Message, Role};
use crate::domain::prompt::SystemPrompt;

/// Port for one conversation with an AI provider.
///
/// Implementations append the user turn and the model turn to their history
/// only after a successful call, so a failed call leaves the replay state
/// untouched.
#[async_trait]
pub trait AISession: Send {
    /// Sends one user message and returns the model reply.
    async fn send(&mut self, text: &str) -> Result<SessionReply, AIError>;

    /// Provider this session talks to.
    fn provider(&self) -> ProviderKind;

    /// Model identifier.
    fn model(&self) -> &str;

    /// Exchange history so far, oldest first.
    fn history(&self) -> &[Turn];
}

/// Port for opening sessions.
pub trait SessionFactory: Send + Sync {
    /// Opens a session for `spec.model_id`.
    ///
    /// Fails fast with [`AIError::UnsupportedModel`] or
    /// [`AIError::MissingCredentials`]; never falls back to another provider.
    fn open(&self, spec: SessionSpec) -> Result<Box<dyn AISession>, AIError>;
}

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub model_id: String,
    pub system_prompt: SystemPrompt,
    /// Turns replayed into the session before the first send.
    pub prior_history: Vec<Turn>,
    pub generation: GenerationOptions,
}

impl SessionSpec {
    pub fn new(model_id: impl Into<String>, system_prompt: SystemPrompt) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt,
            prior_history: Vec::new(),
            generation: GenerationOptions::default(),
        }
    }

    /// Sets the prior history.
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.prior_history = history;
        self
    }

    /// Sets generation options.
    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }
}

/// One entry of a session's exchange history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            text: message.content.clone(),
        }
    }
}

/// Sampling and output options for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object response where supported.
    pub json_output: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            temperature: None,
            json_output: false,
        }
    }
}

/// Reply to one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Prompt tokens served from the provider cache.
    pub cache_read_tokens: u32,
    /// Prompt tokens written to the provider cache.
    pub cache_write_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, read: u32, write: u32) -> Self {
        self.cache_read_tokens = read;
        self.cache_write_tokens = write;
        self
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// The three supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Routes a model identifier to its provider by prefix.
    ///
    /// Pure and deterministic: the same identifier always yields the same
    /// provider, and unknown identifiers are an error rather than a fallback.
    pub fn for_model(model_id: &str) -> Result<Self, AIError> {
        let id = model_id.trim().to_ascii_lowercase();
        if id.starts_with("gemini") {
            Ok(Self::Gemini)
        } else if ["gpt-", "o1", "o3", "o4", "chatgpt"]
            .iter()
            .any(|p| id.starts_with(p))
        {
            Ok(Self::OpenAi)
        } else if id.starts_with("claude") {
            Ok(Self::Anthropic)
        } else {
            Err(AIError::UnsupportedModel(model_id.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI provider errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AIError {
    /// Rate limited by provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until retry is allowed.
        retry_after_secs: u32,
    },

    /// Prompt plus history exceeds the model limit.
    #[error("context too long: {0}")]
    ContextTooLong(String),

    /// Content was filtered for safety.
    #[error("content filtered: {reason}")]
    ContentFiltered {
        /// Reason for filtering.
        reason: String,
    },

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// API key rejected by the provider.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// No API key configured for the provider.
    #[error("no credentials configured for {provider}")]
    MissingCredentials {
        provider: ProviderKind,
    },

    /// Model identifier does not route to any provider.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u32,
    },
}

impl AIError {
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn content_filtered(reason: impl Into<String>) -> Self {
        Self::ContentFiltered {
            reason: reason.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn missing_credentials(provider: ProviderKind) -> Self {
        Self::MissingCredentials { provider }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AIError::RateLimited { .. }
                | AIError::Unavailable { .. }
                | AIError::Network(_)
                | AIError::Timeout { .. }
        )
    }

    /// Returns true for configuration problems detected before any call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AIError::MissingCredentials { .. } | AIError::UnsupportedModel(_)
        )
    }
}
