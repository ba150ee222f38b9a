//! Case content supplied by the content collaborator.
//!
//! A case is immutable for the lifetime of a conversation. The teaching note
//! is only ever placed in prompts; it is never shown to the learner.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// The protagonist the AI plays during the dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protagonist {
    /// Full name, e.g. "Kent Beck".
    pub name: String,
    /// Initials shown beside protagonist messages.
    #[serde(default)]
    pub initials: String,
    /// Role within the case, e.g. "CEO of Malawi's Pizza".
    pub role: String,
}

impl Protagonist {
    /// Creates a protagonist, deriving initials from the name.
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        let name = name.into();
        let initials = initials_of(&name);
        Self {
            name,
            initials,
            role: role.into(),
        }
    }

    /// Returns the first name, used when the protagonist refers to itself.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

fn initials_of(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Arguments for and against the decision the case revolves around.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentFramework {
    #[serde(default)]
    pub arguments_for: Vec<String>,
    #[serde(default)]
    pub arguments_against: Vec<String>,
}

impl ArgumentFramework {
    /// Returns true if neither side has any arguments.
    pub fn is_empty(&self) -> bool {
        self.arguments_for.is_empty() && self.arguments_against.is_empty()
    }
}

/// Everything the engine needs to know about a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseData {
    pub case_id: String,
    pub title: String,
    pub protagonist: Protagonist,
    /// The opening question the protagonist asks the learner.
    pub chat_question: String,
    /// Full case body text.
    pub case_text: String,
    /// Instructor teaching note. Prompt-only.
    #[serde(default)]
    pub teaching_note: String,
    #[serde(default)]
    pub supplementary_materials: Option<String>,
    #[serde(default)]
    pub argument_framework: Option<ArgumentFramework>,
}

impl CaseData {
    /// Checks the fields the prompts cannot do without.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.case_id.trim().is_empty() {
            return Err(ValidationError::empty_field("case_id"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::empty_field("title"));
        }
        if self.protagonist.name.trim().is_empty() {
            return Err(ValidationError::empty_field("protagonist.name"));
        }
        if self.case_text.trim().is_empty() {
            return Err(ValidationError::empty_field("case_text"));
        }
        Ok(())
    }

    /// Returns the argument framework if one was supplied with content.
    pub fn arguments(&self) -> Option<&ArgumentFramework> {
        self.argument_framework.as_ref().filter(|a| !a.is_empty())
    }
}
