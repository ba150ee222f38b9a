//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Provider sessions (Gemini, OpenAI, Anthropic, mock) and routing
//! - `case_file` - YAML loading of case content, chat options and persona overrides

pub mod ai;
pub mod case_file;

pub use ai::{ClientRegistry, MockSessionFactory, RegistrySessionFactory};
pub use case_file::{load_case, load_options, load_persona_override, CaseFileError};
