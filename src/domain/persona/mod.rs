//! Persona Resolver.
//!
//! Turns a selected persona identifier plus an optional database override into
//! the concrete behavioral instructions the protagonist follows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::conversation::ChatOptions;

/// Placeholder replaced with the learner's name in override templates.
pub const STUDENT_NAME_PLACEHOLDER: &str = "{student_name}";

/// Placeholder replaced with the case title in override templates.
pub const CASE_TITLE_PLACEHOLDER: &str = "{case_title}";

/// The five built-in protagonist personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    /// Balanced challenger, the default.
    #[default]
    Moderate,
    /// Demands rigorous evidence before conceding anything.
    Strict,
    /// Open-minded and easily persuaded by reasonable arguments.
    Liberal,
    /// Steers the learner toward the key issues with guiding questions.
    Leading,
    /// Agrees readily; used to test whether learners self-correct.
    Sycophantic,
}

impl PersonaId {
    /// All built-in personas in display order.
    pub const ALL: [PersonaId; 5] = [
        PersonaId::Moderate,
        PersonaId::Strict,
        PersonaId::Liberal,
        PersonaId::Leading,
        PersonaId::Sycophantic,
    ];

    /// Stable identifier used in option records and override rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moderate => "moderate",
            Self::Strict => "strict",
            Self::Liberal => "liberal",
            Self::Leading => "leading",
            Self::Sycophantic => "sycophantic",
        }
    }

    /// Built-in behavioral instructions for this persona.
    pub fn builtin_instructions(&self) -> &'static str {
        match self {
            Self::Moderate => MODERATE,
            Self::Strict => STRICT,
            Self::Liberal => LIBERAL,
            Self::Leading => LEADING,
            Self::Sycophantic => SYCOPHANTIC,
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a persona identifier is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown persona: {0}")]
pub struct UnknownPersona(pub String);

impl FromStr for PersonaId {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PersonaId::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownPersona(s.to_string()))
    }
}

/// A persona override row supplied by the database collaborator.
///
/// `instructions` may contain `{student_name}` and `{case_title}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaOverride {
    pub persona: PersonaId,
    pub instructions: String,
}

/// Values substituted into override templates.
#[derive(Debug, Clone, Copy)]
pub struct PersonaContext<'a> {
    pub student_name: &'a str,
    pub case_title: &'a str,
}

/// A resolved persona: identifier plus concrete instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub instructions: String,
    /// True when the instructions came from a database override.
    pub overridden: bool,
}

/// Resolves the persona for a conversation.
///
/// A requested persona that the options do not allow falls back to the
/// configured default. An override applies only when it targets the persona
/// that was finally selected.
pub fn resolve_persona(
    requested: Option<PersonaId>,
    options: &ChatOptions,
    persona_override: Option<&PersonaOverride>,
    ctx: PersonaContext<'_>,
) -> Persona {
    let id = match requested {
        Some(p) if options.allows_persona(p) => p,
        Some(p) => {
            tracing::warn!(
                requested = %p,
                default = %options.default_persona,
                "Requested persona not allowed, using default"
            );
            options.default_persona
        }
        None => options.default_persona,
    };

    match persona_override.filter(|o| o.persona == id && !o.instructions.trim().is_empty()) {
        Some(o) => Persona {
            id,
            instructions: fill_placeholders(&o.instructions, ctx),
            overridden: true,
        },
        None => Persona {
            id,
            instructions: id.builtin_instructions().to_string(),
            overridden: false,
        },
    }
}

fn fill_placeholders(template: &str, ctx: PersonaContext<'_>) -> String {
    template
        .replace(STUDENT_NAME_PLACEHOLDER, ctx.student_name)
        .replace(CASE_TITLE_PLACEHOLDER, ctx.case_title)
}

const MODERATE: &str = "Be a balanced sparring partner. Acknowledge strong points briefly, \
then press on the weakest part of the student's reasoning. Concede only when the student \
supports a claim with specific facts from the case.";

const STRICT: &str = "Be demanding and skeptical. Question every claim that is not backed by a \
specific number or fact from the case. Do not concede a point until the student has answered \
your strongest counter-argument.";

const LIBERAL: &str = "Be open-minded and collegial. Accept well-reasoned arguments readily, \
but still ask the student to name the facts their view rests on.";

const LEADING: &str = "Guide the student toward the central tensions of the case with pointed \
questions. When they drift, steer them back to the decision at hand without giving away an answer.";

const SYCOPHANTIC: &str = "Agree enthusiastically with whatever position the student takes and \
praise their reasoning. Only push back if the student explicitly asks you to challenge them.";

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PersonaContext<'static> {
        PersonaContext {
            student_name: "Jordan Lee",
            case_title: "Malawi's Pizza",
        }
    }

    mod persona_id {
        use super::*;

        #[test]
        fn parses_case_insensitively() {
            assert_eq!("Strict".parse::<PersonaId>(), Ok(PersonaId::Strict));
            assert_eq!(" leading ".parse::<PersonaId>(), Ok(PersonaId::Leading));
        }

        #[test]
        fn rejects_unknown_names() {
            assert!("grumpy".parse::<PersonaId>().is_err());
        }

        #[test]
        fn serializes_to_snake_case() {
            let json = serde_json::to_string(&PersonaId::Sycophantic).unwrap();
            assert_eq!(json, "\"sycophantic\"");
        }

        #[test]
        fn every_persona_has_instructions() {
            for p in PersonaId::ALL {
                assert!(!p.builtin_instructions().is_empty());
            }
        }
    }

    mod resolution {
        use super::*;

        #[test]
        fn no_request_uses_default() {
            let options = ChatOptions {
                default_persona: PersonaId::Leading,
                ..ChatOptions::default()
            };
            let persona = resolve_persona(None, &options, None, ctx());
            assert_eq!(persona.id, PersonaId::Leading);
            assert!(!persona.overridden);
        }

        #[test]
        fn disallowed_request_falls_back_to_default() {
            let options = ChatOptions {
                allowed_personas: vec![PersonaId::Moderate],
                default_persona: PersonaId::Moderate,
                ..ChatOptions::default()
            };
            let persona = resolve_persona(Some(PersonaId::Strict), &options, None, ctx());
            assert_eq!(persona.id, PersonaId::Moderate);
        }

        #[test]
        fn matching_override_fills_placeholders() {
            let options = ChatOptions::default();
            let row = PersonaOverride {
                persona: PersonaId::Strict,
                instructions: "Grill {student_name} hard about {case_title}.".to_string(),
            };
            let persona = resolve_persona(Some(PersonaId::Strict), &options, Some(&row), ctx());
            assert!(persona.overridden);
            assert_eq!(persona.instructions, "Grill Jordan Lee hard about Malawi's Pizza.");
        }

        #[test]
        fn override_for_other_persona_is_ignored() {
            let options = ChatOptions::default();
            let row = PersonaOverride {
                persona: PersonaId::Liberal,
                instructions: "Be nice.".to_string(),
            };
            let persona = resolve_persona(Some(PersonaId::Strict), &options, Some(&row), ctx());
            assert!(!persona.overridden);
            assert_eq!(persona.instructions, PersonaId::Strict.builtin_instructions());
        }

        #[test]
        fn blank_override_is_ignored() {
            let options = ChatOptions::default();
            let row = PersonaOverride {
                persona: PersonaId::Moderate,
                instructions: "   ".to_string(),
            };
            let persona = resolve_persona(None, &options, Some(&row), ctx());
            assert!(!persona.overridden);
        }
    }
}
