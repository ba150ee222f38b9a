//! Phase transition engine.
//!
//! Pure decision logic: given the current phase and one line of learner
//! input, decides the next phase, the messages to append and the side
//! effects the controller must execute. The engine never talks to an AI
//! service itself.

use thiserror::Error;

use super::classifier::{extract_score, is_affirmative, is_hint_request, is_time_up};
use super::message::Message;
use super::options::ChatOptions;
use super::phase::ConversationPhase;
use crate::domain::foundation::{StateMachine, ValidationError};

pub const HINT_REFUSAL: &str = "I'm sorry, you've used all the hints available for this \
conversation. Try working from the facts in the case.";

pub const KEEP_GOING: &str = "We've only just started. Let's keep going a little longer \
before we wrap up.";

pub const HELPFUL_PERMISSION_PROMPT: &str = "Thanks for the conversation! Would you be willing \
to answer a few quick questions about how it went?";

pub const HELPFUL_SCORE_PROMPT: &str = "On a scale of 1 to 5, how helpful was this \
conversation?";

pub const LIKED_PROMPT: &str = "What did you like about it?";

pub const IMPROVE_PROMPT: &str = "What could be improved?";

pub const TRANSCRIPT_PERMISSION_PROMPT: &str = "May we keep an anonymized copy of this \
transcript to improve the exercise? Your name will be removed.";

pub const CLOSING_MESSAGE: &str = "Thank you! When you are ready, proceed to your evaluation.";

/// Errors returned by [`PhaseTransitionEngine::advance`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("phase {0:?} does not accept learner input")]
    InputNotAccepted(ConversationPhase),

    #[error(transparent)]
    InvalidTransition(#[from] ValidationError),
}

/// Side effects the controller executes after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send the text to the AI session and append its reply.
    ForwardToModel(String),
    /// A hint request within the ceiling; increment the counter.
    HintGranted,
    /// A hint request over the ceiling; answered locally.
    HintRefused,
    RecordHelpfulScore(Option<f64>),
    RecordLiked(String),
    RecordImprove(String),
    TranscriptConsent(bool),
    /// Input rejected before it reached the transcript.
    Rejected(String),
}

/// Result of one engine step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: ConversationPhase,
    pub to: ConversationPhase,
    /// Messages to append, in order. The learner message comes first.
    pub appended: Vec<Message>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(phase: ConversationPhase, appended: Vec<Message>, effects: Vec<Effect>) -> Self {
        Self {
            from: phase,
            to: phase,
            appended,
            effects,
        }
    }

    /// Returns true if the step asks for an AI call.
    pub fn forwards_to_model(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, Effect::ForwardToModel(_)))
    }

    pub fn changed_phase(&self) -> bool {
        self.from != self.to
    }
}

/// Snapshot of conversation state for transition decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub phase: ConversationPhase,
    /// Hint requests already granted.
    pub hints_used: u32,
    /// Learner messages already in the transcript, excluding the current input.
    pub user_messages: usize,
}

impl ConversationSnapshot {
    pub fn new(phase: ConversationPhase, hints_used: u32, user_messages: usize) -> Self {
        Self {
            phase,
            hints_used,
            user_messages,
        }
    }
}

/// Engine for determining phase transitions from learner input.
#[derive(Debug, Clone)]
pub struct PhaseTransitionEngine {
    options: ChatOptions,
}

impl PhaseTransitionEngine {
    pub fn new(options: ChatOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Advances the conversation by one learner input.
    pub fn advance(
        &self,
        snapshot: &ConversationSnapshot,
        input: &str,
    ) -> Result<Transition, TransitionError> {
        let phase = snapshot.phase;
        if !phase.accepts_user_input() {
            return Err(TransitionError::InputNotAccepted(phase));
        }

        if let Some(max) = self.options.max_message_length {
            if self.options.exceeds_length(input) {
                return Ok(Transition::stay(
                    phase,
                    Vec::new(),
                    vec![Effect::Rejected(format!(
                        "Your message is too long. Please keep it under {} characters.",
                        max
                    ))],
                ));
            }
        }

        let transition = match phase {
            ConversationPhase::Chatting => self.from_chatting(snapshot, input),
            ConversationPhase::AwaitingHelpfulPermission => {
                if is_affirmative(input) {
                    self.enter(phase, ConversationPhase::AwaitingHelpfulScore, input, vec![])
                } else {
                    self.enter(phase, self.after_questionnaire(), input, vec![])
                }
            }
            ConversationPhase::AwaitingHelpfulScore => self.enter(
                phase,
                ConversationPhase::AwaitingLikedFeedback,
                input,
                vec![Effect::RecordHelpfulScore(extract_score(input))],
            ),
            ConversationPhase::AwaitingLikedFeedback => self.enter(
                phase,
                ConversationPhase::AwaitingImproveFeedback,
                input,
                vec![Effect::RecordLiked(input.to_string())],
            ),
            ConversationPhase::AwaitingImproveFeedback => self.enter(
                phase,
                self.after_questionnaire(),
                input,
                vec![Effect::RecordImprove(input.to_string())],
            ),
            ConversationPhase::AwaitingTranscriptPermission => self.enter(
                phase,
                ConversationPhase::FeedbackComplete,
                input,
                vec![Effect::TranscriptConsent(is_affirmative(input))],
            ),
            ConversationPhase::PreChat
            | ConversationPhase::FeedbackComplete
            | ConversationPhase::EvaluationLoading
            | ConversationPhase::Evaluating => {
                return Err(TransitionError::InputNotAccepted(phase))
            }
        };

        if transition.changed_phase() {
            transition.from.transition_to(transition.to)?;
        }
        Ok(transition)
    }

    fn from_chatting(&self, snapshot: &ConversationSnapshot, input: &str) -> Transition {
        let phase = snapshot.phase;

        if is_time_up(input) {
            if snapshot.user_messages < self.options.min_exchanges as usize {
                return Transition::stay(
                    phase,
                    vec![Message::user(input), Message::model(KEEP_GOING)],
                    vec![],
                );
            }
            return self.enter(phase, self.after_chat(), input, vec![]);
        }

        if is_hint_request(input) {
            if snapshot.hints_used >= self.options.hints_allowed {
                return Transition::stay(
                    phase,
                    vec![Message::user(input), Message::model(HINT_REFUSAL)],
                    vec![Effect::HintRefused],
                );
            }
            return Transition::stay(
                phase,
                vec![Message::user(input)],
                vec![Effect::HintGranted, Effect::ForwardToModel(input.to_string())],
            );
        }

        Transition::stay(
            phase,
            vec![Message::user(input)],
            vec![Effect::ForwardToModel(input.to_string())],
        )
    }

    /// Phase entered when the chat ends: feedback first, else transcript
    /// consent, else completion.
    pub fn after_chat(&self) -> ConversationPhase {
        if self.options.ask_for_feedback {
            ConversationPhase::AwaitingHelpfulPermission
        } else {
            self.after_questionnaire()
        }
    }

    fn after_questionnaire(&self) -> ConversationPhase {
        if self.options.ask_save_transcript {
            ConversationPhase::AwaitingTranscriptPermission
        } else {
            ConversationPhase::FeedbackComplete
        }
    }

    fn enter(
        &self,
        from: ConversationPhase,
        to: ConversationPhase,
        input: &str,
        effects: Vec<Effect>,
    ) -> Transition {
        let mut appended = vec![Message::user(input)];
        if let Some(prompt) = entry_prompt(to) {
            appended.push(Message::model(prompt));
        }
        Transition {
            from,
            to,
            appended,
            effects,
        }
    }
}

/// Canned protagonist line shown on entering a phase through learner input.
pub fn entry_prompt(phase: ConversationPhase) -> Option<&'static str> {
    match phase {
        ConversationPhase::AwaitingHelpfulPermission => Some(HELPFUL_PERMISSION_PROMPT),
        ConversationPhase::AwaitingHelpfulScore => Some(HELPFUL_SCORE_PROMPT),
        ConversationPhase::AwaitingLikedFeedback => Some(LIKED_PROMPT),
        ConversationPhase::AwaitingImproveFeedback => Some(IMPROVE_PROMPT),
        ConversationPhase::AwaitingTranscriptPermission => Some(TRANSCRIPT_PERMISSION_PROMPT),
        ConversationPhase::FeedbackComplete => Some(CLOSING_MESSAGE),
        _ => None,
    }
}
