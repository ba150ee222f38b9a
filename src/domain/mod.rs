//! Domain layer containing the conversation rules and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, state machine trait)
//! - `case` - Case content the protagonist argues about
//! - `persona` - Built-in personas and override resolution
//! - `conversation` - Phases, transcript, input classifiers, transition engine
//! - `prompt` - Cache-ordered system and coach prompts
//! - `evaluation` - Rubric, evaluation result and hint penalty

pub mod case;
pub mod conversation;
pub mod evaluation;
pub mod foundation;
pub mod persona;
pub mod prompt;
