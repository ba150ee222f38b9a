use serde::{Deserialize, Serialize};

use crate::domain::persona::PersonaId;

/// Per-assignment configuration for a conversation.
///
/// Resolved once by the content collaborator and treated as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    /// Maximum number of hint requests the protagonist will answer.
    pub hints_allowed: u32,
    /// Hints that carry no score penalty.
    pub free_hints: u32,
    pub allowed_personas: Vec<PersonaId>,
    pub default_persona: PersonaId,
    /// Ask the short helpfulness questionnaire after the chat.
    pub ask_for_feedback: bool,
    /// Ask for consent to keep an anonymized transcript.
    pub ask_save_transcript: bool,
    pub run_evaluation: bool,
    /// Extra personality instructions appended to the persona.
    pub personality: Option<String>,
    /// Learner messages required before "time is up" is honored.
    pub min_exchanges: u32,
    /// Per-message character ceiling; `None` means unlimited.
    pub max_message_length: Option<usize>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            hints_allowed: 3,
            free_hints: 1,
            allowed_personas: PersonaId::ALL.to_vec(),
            default_persona: PersonaId::default(),
            ask_for_feedback: true,
            ask_save_transcript: true,
            run_evaluation: true,
            personality: None,
            min_exchanges: 0,
            max_message_length: None,
        }
    }
}

impl ChatOptions {
    /// Returns true if learners may select the persona.
    ///
    /// An empty allow-list permits only the default persona.
    pub fn allows_persona(&self, persona: PersonaId) -> bool {
        if self.allowed_personas.is_empty() {
            persona == self.default_persona
        } else {
            self.allowed_personas.contains(&persona)
        }
    }

    /// Returns the extra personality text if it has content.
    pub fn personality_text(&self) -> Option<&str> {
        self.personality
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns true if the message exceeds the per-message ceiling.
    pub fn exceeds_length(&self, text: &str) -> bool {
        self.max_message_length
            .map(|max| text.chars().count() > max)
            .unwrap_or(false)
    }
}
