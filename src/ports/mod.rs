//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## AI Ports
//!
//! - `AISession` - A stateful, single-model conversation with one provider
//! - `SessionFactory` - Opens sessions for a model identifier

mod ai_session;

pub use ai_session::{
    AIError, AISession, GenerationOptions, ProviderKind, SessionFactory, SessionReply,
    SessionSpec, TokenUsage, Turn,
};
