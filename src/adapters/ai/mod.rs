//! AI Session Adapters.
//!
//! Implementations of the AISession port for the supported LLM providers.
//!
//! ## Available Adapters
//!
//! - `GeminiSession` - Google Gemini models (system instruction + role/parts history)
//! - `OpenAiSession` - OpenAI chat models (flattened message list)
//! - `AnthropicSession` - Anthropic Claude models (top-level system blocks with cache directive)
//! - `ProviderSession` / `RegistrySessionFactory` - Prefix routing over the three
//! - `MockSessionFactory` - Scripted sessions for testing

mod anthropic_session;
mod gemini_session;
mod mock_session;
mod openai_session;
mod registry;
mod transport;

pub use anthropic_session::AnthropicSession;
pub use gemini_session::GeminiSession;
pub use mock_session::{MockCall, MockError, MockResponse, MockSession, MockSessionFactory};
pub use openai_session::OpenAiSession;
pub use registry::{ClientRegistry, ProviderSession, RegistrySessionFactory};
pub use transport::Endpoint;
