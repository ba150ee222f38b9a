//! Evaluation Invoker.
//!
//! Sends a finished transcript to the coach model once and turns the reply
//! into an [`EvaluationResult`]. There is no retry; a failure is returned to
//! the caller, which decides what the learner sees.

use std::sync::Arc;
use thiserror::Error;

use crate::domain::case::CaseData;
use crate::domain::conversation::{ChatOptions, Transcript};
use crate::domain::evaluation::{parse_evaluation, EvaluationParseError, EvaluationResult, Rubric};
use crate::domain::prompt::build_coach_prompt;
use crate::ports::{AIError, GenerationOptions, SessionFactory, SessionSpec};

/// The single user turn of an evaluation session. The transcript itself is
/// part of the coach system prompt.
pub const EVALUATION_REQUEST: &str =
    "Evaluate the conversation above. Respond with the JSON object only.";

/// Errors from an evaluation attempt.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Nothing to evaluate: the student has not sent any messages")]
    EmptyTranscript,

    #[error("Evaluation call failed: {0}")]
    Session(#[from] AIError),

    #[error("Evaluation reply could not be parsed: {0}")]
    Parse(#[from] EvaluationParseError),
}

impl EvaluationError {
    /// Returns true if trying again later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Session(e) if e.is_retryable())
    }
}

/// Runs rubric evaluations through a [`SessionFactory`].
pub struct EvaluationInvoker {
    factory: Arc<dyn SessionFactory>,
    rubric: Rubric,
    generation: GenerationOptions,
}

impl EvaluationInvoker {
    /// Creates an invoker using the standard rubric and JSON output.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            rubric: Rubric::standard(),
            generation: GenerationOptions {
                max_output_tokens: 2048,
                temperature: None,
                json_output: true,
            },
        }
    }

    pub fn with_rubric(mut self, rubric: Rubric) -> Self {
        self.rubric = rubric;
        self
    }

    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = GenerationOptions {
            json_output: true,
            ..generation
        };
        self
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Evaluates a transcript in a fresh session on `model_id`.
    ///
    /// The hint count and total returned are recomputed from the transcript;
    /// a disagreement with the model's own figures is logged.
    pub async fn evaluate(
        &self,
        transcript: &Transcript,
        student_name: &str,
        model_id: &str,
        case: &CaseData,
        options: &ChatOptions,
    ) -> Result<EvaluationResult, EvaluationError> {
        if transcript.user_message_count() == 0 {
            return Err(EvaluationError::EmptyTranscript);
        }

        let prompt = build_coach_prompt(case, &self.rubric, transcript, student_name, options);
        let spec = SessionSpec::new(model_id, prompt).with_generation(self.generation.clone());
        let mut session = self.factory.open(spec)?;

        tracing::info!(
            model = %model_id,
            case_id = %case.case_id,
            messages = transcript.len(),
            "Requesting evaluation"
        );

        let reply = session.send(EVALUATION_REQUEST).await.map_err(|e| {
            tracing::warn!(model = %model_id, error = %e, "Evaluation call failed");
            e
        })?;

        let reported = parse_evaluation(&reply.text).map_err(|e| {
            tracing::warn!(model = %model_id, error = %e, "Evaluation reply unparseable");
            e
        })?;

        let hint_count = u32::try_from(transcript.hint_request_count()).unwrap_or(u32::MAX);
        let result = reported.clone().with_hint_count(hint_count, options.free_hints);

        if reported.hint_count != result.hint_count || reported.total_score != result.total_score {
            tracing::warn!(
                reported_hints = reported.hint_count,
                counted_hints = result.hint_count,
                reported_total = reported.total_score,
                computed_total = result.total_score,
                "Evaluation figures corrected from transcript"
            );
        }

        tracing::info!(
            total_score = result.total_score,
            max_total = self.rubric.max_total(),
            hint_count = result.hint_count,
            "Evaluation complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockError, MockSessionFactory};
    use crate::domain::case::test_support::sample_case;
    use crate::domain::conversation::Message;

    const MODEL: &str = "claude-3-5-sonnet";

    fn evaluation_json(scores: [u8; 4], hint_count: u32, total: u32) -> String {
        let criteria = Rubric::standard()
            .criteria
            .iter()
            .zip(scores)
            .map(|(c, s)| {
                serde_json::json!({"criterion": c.name, "score": s, "feedback": "Solid."})
            })
            .collect::<Vec<_>>();
        serde_json::json!({
            "criteria": criteria,
            "totalScore": total,
            "summary": "Good discussion.",
            "hintCount": hint_count,
        })
        .to_string()
    }

    fn transcript_with_hints(hints: usize) -> Transcript {
        let mut t = Transcript::new();
        t.push(Message::model("Should we stay in catering?"));
        t.push(Message::user("Yes, margins are 12%."));
        t.push(Message::model("Why does that matter?"));
        for _ in 0..hints {
            t.push(Message::user("Can I get a hint?"));
            t.push(Message::model("Look at exhibit 1."));
        }
        t
    }

    fn invoker(factory: &MockSessionFactory) -> EvaluationInvoker {
        EvaluationInvoker::new(Arc::new(factory.clone()))
    }

    #[tokio::test]
    async fn three_hints_with_one_free_cost_two_points() {
        let factory = MockSessionFactory::new().with_reply(evaluation_json([4, 4, 3, 3], 3, 12));
        let options = ChatOptions {
            free_hints: 1,
            ..ChatOptions::default()
        };

        let result = invoker(&factory)
            .evaluate(&transcript_with_hints(3), "Jordan", MODEL, &sample_case(), &options)
            .await
            .unwrap();

        assert_eq!(result.raw_score(), 14);
        assert_eq!(result.hint_count, 3);
        assert_eq!(result.total_score, 12);
    }

    #[tokio::test]
    async fn model_miscount_is_corrected_from_transcript() {
        let factory = MockSessionFactory::new().with_reply(evaluation_json([5, 5, 5, 5], 0, 20));

        let result = invoker(&factory)
            .evaluate(
                &transcript_with_hints(2),
                "Jordan",
                MODEL,
                &sample_case(),
                &ChatOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.hint_count, 2);
        assert_eq!(result.total_score, 19);
    }

    #[tokio::test]
    async fn evaluation_session_carries_transcript_and_json_mode() {
        let factory = MockSessionFactory::new().with_reply(evaluation_json([3, 3, 3, 3], 0, 12));

        invoker(&factory)
            .evaluate(
                &transcript_with_hints(0),
                "Jordan",
                MODEL,
                &sample_case(),
                &ChatOptions::default(),
            )
            .await
            .unwrap();

        let opened = factory.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].model_id, MODEL);
        assert!(opened[0].generation.json_output);
        assert!(opened[0].system_prompt.dynamic.contains("Jordan: Yes, margins are 12%."));
        assert!(opened[0].system_prompt.cacheable.contains("Use of case facts"));
        assert_eq!(factory.calls()[0].text, EVALUATION_REQUEST);
    }

    #[tokio::test]
    async fn empty_transcript_makes_no_call() {
        let factory = MockSessionFactory::new();
        let mut transcript = Transcript::new();
        transcript.push(Message::model("Should we stay in catering?"));

        let err = invoker(&factory)
            .evaluate(&transcript, "Jordan", MODEL, &sample_case(), &ChatOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EvaluationError::EmptyTranscript));
        assert_eq!(factory.call_count(), 0);
    }

    #[tokio::test]
    async fn prose_reply_is_a_parse_error() {
        let factory = MockSessionFactory::new().with_reply("The student did well overall.");

        let err = invoker(&factory)
            .evaluate(
                &transcript_with_hints(0),
                "Jordan",
                MODEL,
                &sample_case(),
                &ChatOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EvaluationError::Parse(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn provider_failure_is_not_retried() {
        let factory = MockSessionFactory::new().with_error(MockError::Unavailable {
            message: "overloaded".to_string(),
        });

        let err = invoker(&factory)
            .evaluate(
                &transcript_with_hints(0),
                "Jordan",
                MODEL,
                &sample_case(),
                &ChatOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(factory.call_count(), 1);
    }
}
