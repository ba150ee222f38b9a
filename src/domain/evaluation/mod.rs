//! Rubric-based evaluation results.
//!
//! The coach model returns a JSON document; this module owns its shape, the
//! fixed rubric and the hint penalty arithmetic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One rubric criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub description: String,
}

/// The fixed rubric every conversation is scored against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub criteria: Vec<RubricCriterion>,
}

impl Rubric {
    /// Lowest score a criterion can receive.
    pub const MIN_SCORE: u8 = 1;
    /// Highest score a criterion can receive.
    pub const MAX_SCORE: u8 = 5;

    /// The standard four-criterion rubric.
    pub fn standard() -> Self {
        let criterion = |name: &str, description: &str| RubricCriterion {
            name: name.to_string(),
            description: description.to_string(),
        };
        Self {
            criteria: vec![
                criterion(
                    "Position",
                    "Took a clear position on the decision and kept it consistent or \
                     changed it for stated reasons.",
                ),
                criterion(
                    "Use of case facts",
                    "Supported claims with specific facts and figures from the case.",
                ),
                criterion(
                    "Handling counter-arguments",
                    "Engaged with the protagonist's objections instead of ignoring them.",
                ),
                criterion(
                    "Implementation",
                    "Moved from the decision to concrete next steps once the position was \
                     justified.",
                ),
            ],
        }
    }

    /// Highest possible raw score.
    pub fn max_total(&self) -> u32 {
        self.criteria.len() as u32 * u32::from(Self::MAX_SCORE)
    }

    /// Renders the rubric as a numbered list for prompts.
    pub fn render(&self) -> String {
        self.criteria
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}: {}", i + 1, c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Score and feedback for one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: u8,
    pub feedback: String,
}

/// Structured evaluation of a completed conversation.
///
/// Serialized in camelCase; this is also the shape handed to the storage
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvaluationResult {
    pub criteria: Vec<CriterionScore>,
    pub total_score: u32,
    pub summary: String,
    pub hint_count: u32,
}

impl EvaluationResult {
    /// Sum of criterion scores before any penalty.
    pub fn raw_score(&self) -> u32 {
        self.criteria.iter().map(|c| u32::from(c.score)).sum()
    }

    /// Replaces the hint count and total with values derived from `hint_count`.
    pub fn with_hint_count(mut self, hint_count: u32, free_hints: u32) -> Self {
        self.total_score = penalized_total(self.raw_score(), hint_count, free_hints);
        self.hint_count = hint_count;
        self
    }
}

/// Points deducted for hints beyond the free allowance.
pub fn hint_penalty(hint_count: u32, free_hints: u32) -> u32 {
    hint_count.saturating_sub(free_hints)
}

/// Raw score minus the hint penalty, floored at zero.
pub fn penalized_total(raw_score: u32, hint_count: u32, free_hints: u32) -> u32 {
    raw_score.saturating_sub(hint_penalty(hint_count, free_hints))
}

/// Errors from parsing the coach model's reply.
#[derive(Debug, Error)]
pub enum EvaluationParseError {
    #[error("evaluation is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("evaluation contains no criteria")]
    EmptyCriteria,

    #[error("score {score} for '{criterion}' is outside 1-5")]
    ScoreOutOfRange { criterion: String, score: u8 },
}

/// Parses the coach reply into an [`EvaluationResult`].
///
/// Accepts the object bare or wrapped in a Markdown code fence.
pub fn parse_evaluation(raw: &str) -> Result<EvaluationResult, EvaluationParseError> {
    let result: EvaluationResult = serde_json::from_str(strip_code_fence(raw))?;

    if result.criteria.is_empty() {
        return Err(EvaluationParseError::EmptyCriteria);
    }
    if let Some(bad) = result
        .criteria
        .iter()
        .find(|c| !(Rubric::MIN_SCORE..=Rubric::MAX_SCORE).contains(&c.score))
    {
        return Err(EvaluationParseError::ScoreOutOfRange {
            criterion: bad.criterion.clone(),
            score: bad.score,
        });
    }
    Ok(result)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
