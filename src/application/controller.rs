//! Conversation controller.
//!
//! Drives one learner conversation: owns the transcript, the current phase,
//! the AI session and the retry timer, and executes the side effects the
//! [`PhaseTransitionEngine`] asks for. Every AI call happens under
//! `&mut self`, so a conversation never has two calls in flight.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::evaluation::{EvaluationError, EvaluationInvoker};
use super::retry::{RetryTimer, DEFAULT_RETRY_DELAY};
use crate::domain::case::CaseData;
use crate::domain::conversation::{
    ChatOptions, ConversationPhase, ConversationSnapshot, Effect, FeedbackRecord, Message,
    PhaseTransitionEngine, PlaceholderSlot, Transcript, TransitionError,
};
use crate::domain::evaluation::EvaluationResult;
use crate::domain::foundation::{ConversationId, StateMachine};
use crate::domain::persona::{resolve_persona, Persona, PersonaContext, PersonaId, PersonaOverride};
use crate::domain::prompt::build_system_prompt;
use crate::ports::{AISession, GenerationOptions, SessionFactory, SessionSpec, Turn};

/// Shown in place of a reply while a failed send waits for its retry.
pub const STAND_BY_MESSAGE: &str =
    "Sorry, I need a moment to gather my thoughts. Please stand by.";

/// Prefixed to the real reply when the retry succeeds.
pub const RETRY_ACKNOWLEDGEMENT: &str = "Thanks for waiting.";

pub const BUSY_ERROR: &str =
    "The AI service did not respond. Your message will be retried automatically.";

pub const STILL_BUSY_ERROR: &str =
    "The AI service is still busy. Please try sending your message again in a minute.";

/// Errors returned by [`ConversationController`] operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Message cannot be empty")]
    EmptyInput,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("AI session error: {0}")]
    Session(#[from] crate::ports::AIError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Evaluation is disabled for this assignment")]
    EvaluationDisabled,

    #[error("Evaluation is not available in phase {0:?}")]
    NotReadyForEvaluation(ConversationPhase),

    #[error("Conversation has not been started")]
    NotStarted,
}

/// Something the presentation layer should surface besides new messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Visible error text. Replaces any earlier error.
    Error(String),
    /// Remove the visible error.
    ClearError,
    /// Audible alert.
    Alert,
    /// A hint request was refused locally.
    HintRefused,
    /// Input was rejected before entering the transcript.
    Rejected(String),
    /// The learner answered the transcript consent question.
    TranscriptConsent(bool),
}

/// What one controller operation changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    pub phase: ConversationPhase,
    /// Messages appended to the transcript, in order.
    pub appended: Vec<Message>,
    /// The stand-by message's replacement after a successful retry.
    pub replaced: Option<Message>,
    pub notices: Vec<Notice>,
}

impl TurnOutcome {
    fn new(phase: ConversationPhase) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }
}

/// Inputs for one conversation.
#[derive(Debug, Clone)]
pub struct ConversationSetup {
    pub case: CaseData,
    pub options: ChatOptions,
    pub student_name: String,
    pub model_id: String,
    /// Model for the coach call; the chat model when unset.
    pub evaluation_model_id: Option<String>,
    pub persona: Option<PersonaId>,
    pub persona_override: Option<PersonaOverride>,
    pub retry_delay: Duration,
    pub generation: GenerationOptions,
}

impl ConversationSetup {
    pub fn new(
        case: CaseData,
        options: ChatOptions,
        student_name: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            case,
            options,
            student_name: student_name.into(),
            model_id: model_id.into(),
            evaluation_model_id: None,
            persona: None,
            persona_override: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            generation: GenerationOptions::default(),
        }
    }

    pub fn with_persona(mut self, persona: PersonaId) -> Self {
        self.persona = Some(persona);
        self
    }

    pub fn with_persona_override(mut self, row: PersonaOverride) -> Self {
        self.persona_override = Some(row);
        self
    }

    pub fn with_evaluation_model(mut self, model_id: impl Into<String>) -> Self {
        self.evaluation_model_id = Some(model_id.into());
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    pub fn evaluation_model(&self) -> &str {
        self.evaluation_model_id.as_deref().unwrap_or(&self.model_id)
    }
}

#[derive(Debug, Clone)]
struct PendingRetry {
    text: String,
    slot: PlaceholderSlot,
}

/// Controller for one learner conversation.
pub struct ConversationController {
    id: ConversationId,
    setup: ConversationSetup,
    engine: PhaseTransitionEngine,
    factory: Arc<dyn SessionFactory>,
    evaluator: EvaluationInvoker,
    phase: ConversationPhase,
    transcript: Transcript,
    session: Option<Box<dyn AISession>>,
    persona: Option<Persona>,
    hints_used: u32,
    feedback: FeedbackRecord,
    evaluation: Option<EvaluationResult>,
    retry: RetryTimer,
    pending: Option<PendingRetry>,
}

impl ConversationController {
    pub fn new(setup: ConversationSetup, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            id: ConversationId::new(),
            engine: PhaseTransitionEngine::new(setup.options.clone()),
            evaluator: EvaluationInvoker::new(Arc::clone(&factory)),
            retry: RetryTimer::new(setup.retry_delay),
            factory,
            setup,
            phase: ConversationPhase::PreChat,
            transcript: Transcript::new(),
            session: None,
            persona: None,
            hints_used: 0,
            feedback: FeedbackRecord::default(),
            evaluation: None,
            pending: None,
        }
    }

    /// Replaces the evaluation invoker, e.g. to score against another rubric.
    pub fn with_evaluator(mut self, evaluator: EvaluationInvoker) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Opens the AI session and moves `PreChat → Chatting`.
    ///
    /// The protagonist's opening question is appended locally when the
    /// transcript is empty. Session creation failures leave the phase alone.
    pub fn start(&mut self) -> Result<TurnOutcome, ControllerError> {
        let next = self
            .phase
            .transition_to(ConversationPhase::Chatting)
            .map_err(TransitionError::from)?;

        let case = &self.setup.case;
        let persona = resolve_persona(
            self.setup.persona,
            &self.setup.options,
            self.setup.persona_override.as_ref(),
            PersonaContext {
                student_name: &self.setup.student_name,
                case_title: &case.title,
            },
        );
        let prompt = build_system_prompt(case, &persona, &self.setup.options, &self.setup.student_name);

        let opening = self
            .transcript
            .is_empty()
            .then(|| Message::model(case.chat_question.clone()));
        let history: Vec<Turn> = self
            .transcript
            .messages()
            .iter()
            .chain(opening.iter())
            .map(Turn::from)
            .collect();

        let spec = SessionSpec::new(self.setup.model_id.clone(), prompt)
            .with_history(history)
            .with_generation(self.setup.generation.clone());
        let session = self.factory.open(spec).map_err(|e| {
            tracing::error!(
                conversation_id = %self.id,
                model = %self.setup.model_id,
                error = %e,
                "Failed to open AI session"
            );
            e
        })?;

        tracing::info!(
            conversation_id = %self.id,
            case_id = %case.case_id,
            provider = %session.provider(),
            model = %session.model(),
            persona = %persona.id,
            persona_overridden = persona.overridden,
            "Conversation started"
        );

        self.session = Some(session);
        self.persona = Some(persona);
        self.phase = next;

        let mut outcome = TurnOutcome::new(next);
        if let Some(opening) = opening {
            self.transcript.push(opening.clone());
            outcome.appended.push(opening);
        }
        Ok(outcome)
    }

    /// Processes one line of learner input.
    ///
    /// A new message cancels any pending retry. A failed AI call does not
    /// return an error; it appends the stand-by message and arms the retry.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome, ControllerError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ControllerError::EmptyInput);
        }

        let snapshot = ConversationSnapshot::new(
            self.phase,
            self.hints_used,
            self.transcript.user_message_count(),
        );
        let transition = self.engine.advance(&snapshot, input)?;

        if !transition.appended.is_empty() && self.cancel_retry() {
            tracing::debug!(conversation_id = %self.id, "Pending retry cancelled by new message");
        }

        for message in &transition.appended {
            self.transcript.push(message.clone());
        }
        let mut outcome = TurnOutcome::new(transition.to);
        outcome.appended = transition.appended;

        if transition.from != transition.to {
            tracing::info!(
                conversation_id = %self.id,
                from = ?transition.from,
                to = ?transition.to,
                "Phase changed"
            );
        }
        self.phase = transition.to;

        for effect in transition.effects {
            match effect {
                Effect::ForwardToModel(text) => self.forward(text, &mut outcome).await?,
                Effect::HintGranted => {
                    self.hints_used += 1;
                    tracing::info!(
                        conversation_id = %self.id,
                        hints_used = self.hints_used,
                        hints_allowed = self.setup.options.hints_allowed,
                        "Hint granted"
                    );
                }
                Effect::HintRefused => {
                    tracing::info!(conversation_id = %self.id, "Hint refused, ceiling reached");
                    outcome.notices.push(Notice::HintRefused);
                }
                Effect::RecordHelpfulScore(score) => self.feedback.helpful_score = score,
                Effect::RecordLiked(text) => self.feedback.liked = Some(text),
                Effect::RecordImprove(text) => self.feedback.improve = Some(text),
                Effect::TranscriptConsent(consent) => {
                    self.feedback.transcript_consent = consent;
                    outcome.notices.push(Notice::TranscriptConsent(consent));
                }
                Effect::Rejected(reason) => outcome.notices.push(Notice::Rejected(reason)),
            }
        }

        outcome.phase = self.phase;
        Ok(outcome)
    }

    async fn forward(&mut self, text: String, outcome: &mut TurnOutcome) -> Result<(), ControllerError> {
        let session = self.session.as_mut().ok_or(ControllerError::NotStarted)?;

        match session.send(&text).await {
            Ok(reply) => {
                let message = Message::model(reply.text);
                self.transcript.push(message.clone());
                outcome.appended.push(message);
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %self.id,
                    error = %e,
                    retry_in_secs = self.retry.delay().as_secs(),
                    "AI send failed, retry scheduled"
                );
                let stand_by = Message::model(STAND_BY_MESSAGE);
                let slot = self.transcript.push_placeholder(stand_by.clone());
                outcome.appended.push(stand_by);
                outcome.notices.push(Notice::Error(BUSY_ERROR.to_string()));
                outcome.notices.push(Notice::Alert);
                self.retry.schedule();
                self.pending = Some(PendingRetry { text, slot });
            }
        }
        Ok(())
    }

    /// Runs the scheduled retry. Returns `None` when nothing is pending.
    ///
    /// Success swaps the stand-by message for an acknowledgement plus the
    /// real reply; failure only changes the error text.
    pub async fn fire_retry(&mut self) -> Option<TurnOutcome> {
        let pending = self.pending.take()?;
        self.retry.cancel();
        let session = self.session.as_mut()?;

        let mut outcome = TurnOutcome::new(self.phase);
        match session.send(&pending.text).await {
            Ok(reply) => {
                let message = Message::model(format!("{} {}", RETRY_ACKNOWLEDGEMENT, reply.text));
                if self.transcript.replace_placeholder(pending.slot, message.clone()) {
                    outcome.replaced = Some(message);
                } else {
                    self.transcript.push(message.clone());
                    outcome.appended.push(message);
                }
                outcome.notices.push(Notice::ClearError);
                tracing::info!(conversation_id = %self.id, "Retry succeeded");
            }
            Err(e) => {
                tracing::warn!(conversation_id = %self.id, error = %e, "Retry failed");
                outcome.notices.push(Notice::Error(STILL_BUSY_ERROR.to_string()));
            }
        }
        Some(outcome)
    }

    fn cancel_retry(&mut self) -> bool {
        self.pending = None;
        self.retry.cancel()
    }

    /// Deadline of the pending retry, if any.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry.deadline()
    }

    /// Runs the evaluation from `FeedbackComplete`.
    ///
    /// On failure the phase reverts to `Chatting` so the conversation can
    /// continue and nothing is lost.
    pub async fn proceed_to_evaluation(&mut self) -> Result<EvaluationResult, ControllerError> {
        if self.phase != ConversationPhase::FeedbackComplete {
            return Err(ControllerError::NotReadyForEvaluation(self.phase));
        }
        if !self.setup.options.run_evaluation {
            return Err(ControllerError::EvaluationDisabled);
        }

        self.phase = self
            .phase
            .transition_to(ConversationPhase::EvaluationLoading)
            .map_err(TransitionError::from)?;

        let model = self.setup.evaluation_model().to_string();
        let result = self
            .evaluator
            .evaluate(
                &self.transcript,
                &self.setup.student_name,
                &model,
                &self.setup.case,
                &self.setup.options,
            )
            .await;

        match result {
            Ok(evaluation) => {
                self.phase = self
                    .phase
                    .transition_to(ConversationPhase::Evaluating)
                    .map_err(TransitionError::from)?;
                self.evaluation = Some(evaluation.clone());
                Ok(evaluation)
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %self.id,
                    error = %e,
                    "Evaluation failed, returning to chat"
                );
                self.phase = self
                    .phase
                    .transition_to(ConversationPhase::Chatting)
                    .map_err(TransitionError::from)?;
                Err(e.into())
            }
        }
    }

    /// Returns to `PreChat` with an empty transcript.
    pub fn restart(&mut self) {
        tracing::info!(conversation_id = %self.id, "Conversation restarted");
        self.cancel_retry();
        self.id = ConversationId::new();
        self.phase = ConversationPhase::PreChat;
        self.transcript = Transcript::new();
        self.session = None;
        self.persona = None;
        self.hints_used = 0;
        self.feedback = FeedbackRecord::default();
        self.evaluation = None;
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    pub fn feedback(&self) -> &FeedbackRecord {
        &self.feedback
    }

    pub fn transcript_consent(&self) -> bool {
        self.feedback.transcript_consent
    }

    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        self.evaluation.as_ref()
    }

    pub fn setup(&self) -> &ConversationSetup {
        &self.setup
    }
}
