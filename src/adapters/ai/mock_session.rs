//! Mock AI sessions for testing.
//!
//! A [`MockSessionFactory`] hands out [`MockSession`]s that share one script
//! of replies and one call log, so a test can script a whole conversation
//! (including the evaluation call) up front and inspect every send after.
//!
//! # Example
//!
//! ```ignore
//! let factory = MockSessionFactory::new()
//!     .with_reply("Why stay?")
//!     .with_error(MockError::Unavailable { message: "overloaded".into() });
//!
//! let mut session = factory.open(SessionSpec::new("gemini-2.0-flash", prompt))?;
//! assert_eq!(session.send("Stay").await?.text, "Why stay?");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AISession, ProviderKind, SessionFactory, SessionReply, SessionSpec, TokenUsage, Turn,
};

/// A configured mock reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success { text: String, usage: TokenUsage },
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    ContentFiltered { reason: String },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::ContentFiltered { reason } => AIError::content_filtered(reason),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
        }
    }
}

/// One recorded send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub model: String,
    pub text: String,
    /// Session history length at the time of the call.
    pub history_len: usize,
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<MockResponse>,
    calls: Vec<MockCall>,
    opened: Vec<SessionSpec>,
}

/// Factory for scripted sessions.
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    state: Arc<Mutex<MockState>>,
    delay: Duration,
    open_error: Option<AIError>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(MockResponse::Success {
            text: text.into(),
            usage: TokenUsage::new(10, 20),
        })
    }

    /// Queues an error.
    pub fn with_error(self, error: MockError) -> Self {
        self.push(MockResponse::Error(error))
    }

    /// Sets simulated latency per send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes every `open` fail with the given error.
    pub fn failing_open(mut self, error: AIError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Queues a reply on an existing factory.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.lock().responses.push_back(MockResponse::Success {
            text: text.into(),
            usage: TokenUsage::new(10, 20),
        });
    }

    /// Queues an error on an existing factory.
    pub fn push_error(&self, error: MockError) {
        self.lock().responses.push_back(MockResponse::Error(error));
    }

    /// Number of sends across all sessions.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// All recorded sends, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Specs of every opened session.
    pub fn opened(&self) -> Vec<SessionSpec> {
        self.lock().opened.clone()
    }

    fn push(self, response: MockResponse) -> Self {
        self.lock().responses.push_back(response);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionFactory for MockSessionFactory {
    fn open(&self, spec: SessionSpec) -> Result<Box<dyn AISession>, AIError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        let provider = ProviderKind::for_model(&spec.model_id)?;
        self.lock().opened.push(spec.clone());
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            delay: self.delay,
            provider,
            model: spec.model_id,
            history: spec.prior_history,
        }))
    }
}

/// Scripted session handed out by [`MockSessionFactory`].
#[derive(Debug)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    delay: Duration,
    provider: ProviderKind,
    model: String,
    history: Vec<Turn>,
}

#[async_trait]
impl AISession for MockSession {
    async fn send(&mut self, text: &str) -> Result<SessionReply, AIError> {
        let next = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.calls.push(MockCall {
                model: self.model.clone(),
                text: text.to_string(),
                history_len: self.history.len(),
            });
            state.responses.pop_front()
        };

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match next.unwrap_or_else(|| MockResponse::Success {
            text: "Mock response".to_string(),
            usage: TokenUsage::new(5, 10),
        }) {
            MockResponse::Success { text: reply, usage } => {
                self.history.push(Turn::user(text));
                self.history.push(Turn::model(reply.clone()));
                Ok(SessionReply { text: reply, usage })
            }
            MockResponse::Error(err) => Err(err.into()),
        }
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prompt::SystemPrompt;

    fn spec() -> SessionSpec {
        SessionSpec::new("claude-3-haiku", SystemPrompt::new("rules", "student"))
    }

    #[tokio::test]
    async fn replies_are_consumed_in_order() {
        let factory = MockSessionFactory::new().with_reply("one").with_reply("two");
        let mut session = factory.open(spec()).unwrap();

        assert_eq!(session.send("a").await.unwrap().text, "one");
        assert_eq!(session.send("b").await.unwrap().text, "two");
        assert_eq!(session.send("c").await.unwrap().text, "Mock response");
        assert_eq!(factory.call_count(), 3);
    }

    #[tokio::test]
    async fn errors_do_not_touch_history() {
        let factory = MockSessionFactory::new().with_error(MockError::Unavailable {
            message: "down".to_string(),
        });
        let mut session = factory.open(spec()).unwrap();

        let err = session.send("a").await.unwrap_err();
        assert!(matches!(err, AIError::Unavailable { .. }));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn successful_send_appends_both_turns() {
        let factory = MockSessionFactory::new().with_reply("Why?");
        let mut session = factory.open(spec()).unwrap();
        session.send("Stay").await.unwrap();
        assert_eq!(session.history(), &[Turn::user("Stay"), Turn::model("Why?")]);
    }

    #[test]
    fn open_routes_by_model() {
        let factory = MockSessionFactory::new();
        let session = factory.open(spec()).unwrap();
        assert_eq!(session.provider(), ProviderKind::Anthropic);

        let bad = SessionSpec::new("mistral-large", SystemPrompt::default());
        assert!(matches!(factory.open(bad), Err(AIError::UnsupportedModel(_))));
    }

    #[test]
    fn failing_open_is_reported() {
        let factory =
            MockSessionFactory::new().failing_open(AIError::missing_credentials(ProviderKind::Gemini));
        assert!(factory.open(spec()).is_err());
        assert!(factory.opened().is_empty());
    }

    #[test]
    fn mock_error_converts_to_ai_error() {
        let err: AIError = MockError::RateLimited { retry_after_secs: 30 }.into();
        assert!(matches!(err, AIError::RateLimited { retry_after_secs: 30 }));
    }
}
