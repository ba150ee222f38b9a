//! Prompt Assembler.
//!
//! Builds the protagonist system prompt and the coach (evaluation) prompt.
//! Both put content that is stable across calls first and per-conversation
//! content last, so providers that cache on a stable prefix can reuse it
//! across turns and across students sharing a case.

mod templates;

use crate::domain::case::CaseData;
use crate::domain::conversation::{ChatOptions, Role, Transcript};
use crate::domain::evaluation::Rubric;
use crate::domain::persona::Persona;

pub use templates::{COACH_OUTPUT_FORMAT, COACH_RULES, PROTAGONIST_RULES};
use templates::*;

/// A prompt split into its cacheable prefix and its dynamic suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemPrompt {
    /// Stable content: rules, case body, teaching note, framework, rubric.
    pub cacheable: String,
    /// Per-conversation content: student, persona, personality.
    pub dynamic: String,
}

impl SystemPrompt {
    pub fn new(cacheable: impl Into<String>, dynamic: impl Into<String>) -> Self {
        Self {
            cacheable: cacheable.into(),
            dynamic: dynamic.into(),
        }
    }

    /// The complete prompt, cacheable part first.
    pub fn full(&self) -> String {
        match (self.cacheable.is_empty(), self.dynamic.is_empty()) {
            (_, true) => self.cacheable.clone(),
            (true, false) => self.dynamic.clone(),
            (false, false) => format!("{}\n\n{}", self.cacheable, self.dynamic),
        }
    }
}

/// Builds the system prompt for the protagonist.
pub fn build_system_prompt(
    case: &CaseData,
    persona: &Persona,
    options: &ChatOptions,
    student_name: &str,
) -> SystemPrompt {
    let mut cacheable = Sections::default();
    cacheable.push(PROTAGONIST_RULES);
    cacheable.push(&format!(
        "You are {}, {}. The case is \"{}\".",
        case.protagonist.name, case.protagonist.role, case.title
    ));
    push_case_material(&mut cacheable, case);

    let mut dynamic = Sections::default();
    let mut session = vec![
        SESSION_HEADER.to_string(),
        format!("Student name: {}", student_name),
        format!(
            "Your opening question to the student was: \"{}\"",
            case.chat_question
        ),
        format!(
            "Give at most {} hints in this conversation.",
            options.hints_allowed
        ),
    ];
    if options.min_exchanges > 0 {
        session.push(format!(
            "The student should exchange at least {} messages with you before ending.",
            options.min_exchanges
        ));
    }
    dynamic.push(&session.join("\n"));
    dynamic.push(&format!("Persona:\n{}", persona.instructions));
    if let Some(extra) = options.personality_text() {
        dynamic.push(&format!("Additional personality:\n{}", extra));
    }

    SystemPrompt::new(cacheable.finish(), dynamic.finish())
}

/// Builds the coach prompt used to score a finished conversation.
///
/// The rendered transcript is per-conversation and lands in the dynamic part.
pub fn build_coach_prompt(
    case: &CaseData,
    rubric: &Rubric,
    transcript: &Transcript,
    student_name: &str,
    options: &ChatOptions,
) -> SystemPrompt {
    let mut cacheable = Sections::default();
    cacheable.push(COACH_RULES);
    cacheable.push(COACH_OUTPUT_FORMAT);
    cacheable.push(&format!("{}\n{}", RUBRIC_HEADER, rubric.render()));
    push_case_material(&mut cacheable, case);

    let mut dynamic = Sections::default();
    dynamic.push(&format!(
        "{}\nName: {}\nFree hints allowed: {}",
        STUDENT_HEADER, student_name, options.free_hints
    ));
    dynamic.push(&format!(
        "{}\n{}",
        TRANSCRIPT_HEADER,
        render_transcript(transcript, student_name, &case.protagonist.name)
    ));

    SystemPrompt::new(cacheable.finish(), dynamic.finish())
}

/// Renders a transcript as `Name: text` lines.
pub fn render_transcript(transcript: &Transcript, student_name: &str, protagonist: &str) -> String {
    transcript
        .messages()
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => student_name,
                Role::Model => protagonist,
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_case_material(sections: &mut Sections, case: &CaseData) {
    sections.push(&format!("{}\n{}", CASE_HEADER, case.case_text.trim()));
    if !case.teaching_note.trim().is_empty() {
        sections.push(&format!(
            "{}\n{}",
            TEACHING_NOTE_HEADER,
            case.teaching_note.trim()
        ));
    }
    if let Some(materials) = case
        .supplementary_materials
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        sections.push(&format!("{}\n{}", SUPPLEMENTARY_HEADER, materials.trim()));
    }
    if let Some(framework) = case.arguments() {
        let mut block = vec![ARGUMENTS_HEADER.to_string(), "Arguments for:".to_string()];
        block.extend(framework.arguments_for.iter().map(|a| format!("- {}", a)));
        block.push("Arguments against:".to_string());
        block.extend(framework.arguments_against.iter().map(|a| format!("- {}", a)));
        sections.push(&block.join("\n"));
    }
}

#[derive(Default)]
struct Sections(Vec<String>);

impl Sections {
    fn push(&mut self, section: &str) {
        self.0.push(section.to_string());
    }

    fn finish(self) -> String {
        self.0.join("\n\n")
    }
}
