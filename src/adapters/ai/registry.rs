//! Provider dispatch.
//!
//! [`ClientRegistry`] owns the shared HTTP client and the per-provider
//! credentials for the life of the process. [`RegistrySessionFactory`] routes a
//! model identifier to exactly one provider and wraps the concrete session in
//! [`ProviderSession`].

use async_trait::async_trait;
use reqwest::Client;
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;

use super::anthropic_session::AnthropicSession;
use super::gemini_session::GeminiSession;
use super::openai_session::OpenAiSession;
use super::transport::Endpoint;
use crate::config::AiConfig;
use crate::ports::{
    AIError, AISession, ProviderKind, SessionFactory, SessionReply, SessionSpec, Turn,
};

#[derive(Debug, Clone)]
struct Credentials {
    api_key: Secret<String>,
    base_url: String,
}

/// Shared client plus credentials for each configured provider.
#[derive(Debug)]
pub struct ClientRegistry {
    client: Client,
    timeout: Duration,
    prompt_cache: bool,
    gemini: Option<Credentials>,
    openai: Option<Credentials>,
    anthropic: Option<Credentials>,
}

impl ClientRegistry {
    /// Creates an empty registry with its own HTTP client.
    pub fn new(timeout: Duration) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AIError::network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            timeout,
            prompt_cache: true,
            gemini: None,
            openai: None,
            anthropic: None,
        })
    }

    /// Builds a registry from configuration, registering every provider
    /// that has a non-blank key.
    pub fn from_config(config: &AiConfig) -> Result<Self, AIError> {
        let mut registry = Self::new(config.timeout())?.with_prompt_cache(config.prompt_cache);
        for provider in [ProviderKind::Gemini, ProviderKind::OpenAi, ProviderKind::Anthropic] {
            if let Some(key) = config.api_key(provider) {
                registry = registry.with_provider(provider, key, config.base_url(provider));
            }
        }
        Ok(registry)
    }

    /// Registers credentials for a provider, replacing any previous entry.
    pub fn with_provider(
        mut self,
        provider: ProviderKind,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let credentials = Some(Credentials {
            api_key: Secret::new(api_key.into()),
            base_url: base_url.into(),
        });
        match provider {
            ProviderKind::Gemini => self.gemini = credentials,
            ProviderKind::OpenAi => self.openai = credentials,
            ProviderKind::Anthropic => self.anthropic = credentials,
        }
        self
    }

    /// Enables or disables the Anthropic cache directive.
    pub fn with_prompt_cache(mut self, enabled: bool) -> Self {
        self.prompt_cache = enabled;
        self
    }

    pub fn has_provider(&self, provider: ProviderKind) -> bool {
        self.credentials(provider).is_some()
    }

    fn credentials(&self, provider: ProviderKind) -> Option<&Credentials> {
        match provider {
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::OpenAi => self.openai.as_ref(),
            ProviderKind::Anthropic => self.anthropic.as_ref(),
        }
    }

    fn endpoint(&self, provider: ProviderKind) -> Result<Endpoint, AIError> {
        let credentials = self
            .credentials(provider)
            .ok_or_else(|| AIError::missing_credentials(provider))?;
        Ok(Endpoint::new(
            self.client.clone(),
            credentials.api_key.clone(),
            credentials.base_url.clone(),
            self.timeout,
        ))
    }

    /// Opens a provider session for `spec.model_id`.
    pub fn open_session(&self, spec: SessionSpec) -> Result<ProviderSession, AIError> {
        let provider = ProviderKind::for_model(&spec.model_id)?;
        let endpoint = self.endpoint(provider)?;
        Ok(match provider {
            ProviderKind::Gemini => ProviderSession::Gemini(GeminiSession::new(endpoint, spec)),
            ProviderKind::OpenAi => ProviderSession::OpenAi(OpenAiSession::new(endpoint, spec)),
            ProviderKind::Anthropic => ProviderSession::Anthropic(AnthropicSession::new(
                endpoint,
                spec,
                self.prompt_cache,
            )),
        })
    }
}

/// A session for one of the supported providers.
#[derive(Debug)]
pub enum ProviderSession {
    Gemini(GeminiSession),
    OpenAi(OpenAiSession),
    Anthropic(AnthropicSession),
}

#[async_trait]
impl AISession for ProviderSession {
    async fn send(&mut self, text: &str) -> Result<SessionReply, AIError> {
        match self {
            Self::Gemini(s) => s.send(text).await,
            Self::OpenAi(s) => s.send(text).await,
            Self::Anthropic(s) => s.send(text).await,
        }
    }

    fn provider(&self) -> ProviderKind {
        match self {
            Self::Gemini(_) => ProviderKind::Gemini,
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Anthropic(_) => ProviderKind::Anthropic,
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::Gemini(s) => s.model(),
            Self::OpenAi(s) => s.model(),
            Self::Anthropic(s) => s.model(),
        }
    }

    fn history(&self) -> &[Turn] {
        match self {
            Self::Gemini(s) => s.history(),
            Self::OpenAi(s) => s.history(),
            Self::Anthropic(s) => s.history(),
        }
    }
}

/// [`SessionFactory`] backed by a [`ClientRegistry`].
#[derive(Debug, Clone)]
pub struct RegistrySessionFactory {
    registry: Arc<ClientRegistry>,
}

impl RegistrySessionFactory {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}

impl SessionFactory for RegistrySessionFactory {
    fn open(&self, spec: SessionSpec) -> Result<Box<dyn AISession>, AIError> {
        let model = spec.model_id.clone();
        let session = self.registry.open_session(spec)?;
        tracing::debug!(model = %model, provider = %session.provider(), "AI session opened");
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prompt::SystemPrompt;

    fn spec(model: &str) -> SessionSpec {
        SessionSpec::new(model, SystemPrompt::new("rules", "student"))
    }

    fn registry() -> ClientRegistry {
        ClientRegistry::new(Duration::from_secs(5))
            .unwrap()
            .with_provider(ProviderKind::Gemini, "g-key", "https://g.example.com")
            .with_provider(ProviderKind::OpenAi, "o-key", "https://o.example.com")
            .with_provider(ProviderKind::Anthropic, "a-key", "https://a.example.com")
    }

    #[test]
    fn each_prefix_opens_its_adapter() {
        let r = registry();
        assert!(matches!(r.open_session(spec("gemini-2.0-flash")).unwrap(), ProviderSession::Gemini(_)));
        assert!(matches!(r.open_session(spec("gpt-4o-mini")).unwrap(), ProviderSession::OpenAi(_)));
        assert!(matches!(r.open_session(spec("claude-3-haiku")).unwrap(), ProviderSession::Anthropic(_)));
    }

    #[test]
    fn missing_key_fails_fast_without_fallback() {
        let r = ClientRegistry::new(Duration::from_secs(5))
            .unwrap()
            .with_provider(ProviderKind::OpenAi, "o-key", "https://o.example.com");
        let err = r.open_session(spec("claude-3-haiku")).unwrap_err();
        assert_eq!(err, AIError::missing_credentials(ProviderKind::Anthropic));
    }

    #[test]
    fn unknown_model_is_rejected() {
        let err = registry().open_session(spec("llama-3")).unwrap_err();
        assert_eq!(err, AIError::UnsupportedModel("llama-3".to_string()));
    }

    #[test]
    fn from_config_registers_configured_providers_only() {
        let config = AiConfig {
            anthropic_api_key: Some("a-key".to_string()),
            openai_api_key: Some("".to_string()),
            ..AiConfig::default()
        };
        let r = ClientRegistry::from_config(&config).unwrap();
        assert!(r.has_provider(ProviderKind::Anthropic));
        assert!(!r.has_provider(ProviderKind::OpenAi));
        assert!(!r.has_provider(ProviderKind::Gemini));
    }

    #[test]
    fn session_reports_model_and_prior_history() {
        let session = registry()
            .open_session(spec("gpt-4o").with_history(vec![Turn::model("Opening")]))
            .unwrap();
        assert_eq!(session.model(), "gpt-4o");
        assert_eq!(session.provider(), ProviderKind::OpenAi);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn factory_boxes_registry_sessions() {
        let factory = RegistrySessionFactory::new(Arc::new(registry()));
        let session = factory.open(spec("gemini-1.5-pro")).unwrap();
        assert_eq!(session.provider(), ProviderKind::Gemini);
    }
}
