//! Conversation phases.
//!
//! The phase tracks where the learner is in the dialogue lifecycle: chatting
//! with the protagonist, answering the short feedback questionnaire, or
//! waiting on the evaluation.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// The current phase of a conversation.
///
/// Phases flow in one direction:
/// `PreChat → Chatting → (feedback questions) → FeedbackComplete →
/// EvaluationLoading → Evaluating`. Configuration can skip the feedback
/// questions and the transcript consent question. The only backward edge is
/// `EvaluationLoading → Chatting`, taken when the evaluation call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationPhase {
    /// Session not started yet.
    #[default]
    PreChat,
    /// Free dialogue with the protagonist.
    Chatting,
    /// Asked whether the learner will answer a few feedback questions.
    AwaitingHelpfulPermission,
    /// Asked for a 1-5 helpfulness score.
    AwaitingHelpfulScore,
    /// Asked what the learner liked.
    AwaitingLikedFeedback,
    /// Asked what could be improved.
    AwaitingImproveFeedback,
    /// Asked whether an anonymized transcript may be kept.
    AwaitingTranscriptPermission,
    /// Conversational portion done; waiting for the proceed action.
    FeedbackComplete,
    /// Evaluation call in flight.
    EvaluationLoading,
    /// Evaluation delivered.
    Evaluating,
}

impl ConversationPhase {
    /// Returns true if the phase consumes typed learner input.
    pub fn accepts_user_input(&self) -> bool {
        matches!(
            self,
            Self::Chatting
                | Self::AwaitingHelpfulPermission
                | Self::AwaitingHelpfulScore
                | Self::AwaitingLikedFeedback
                | Self::AwaitingImproveFeedback
                | Self::AwaitingTranscriptPermission
        )
    }

    /// Returns true while the learner is answering the post-chat questionnaire.
    pub fn is_feedback(&self) -> bool {
        matches!(
            self,
            Self::AwaitingHelpfulPermission
                | Self::AwaitingHelpfulScore
                | Self::AwaitingLikedFeedback
                | Self::AwaitingImproveFeedback
                | Self::AwaitingTranscriptPermission
        )
    }

    /// Short label, suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PreChat => "Not started",
            Self::Chatting => "Chatting",
            Self::AwaitingHelpfulPermission => "Feedback: permission",
            Self::AwaitingHelpfulScore => "Feedback: score",
            Self::AwaitingLikedFeedback => "Feedback: liked",
            Self::AwaitingImproveFeedback => "Feedback: improve",
            Self::AwaitingTranscriptPermission => "Transcript consent",
            Self::FeedbackComplete => "Ready for evaluation",
            Self::EvaluationLoading => "Evaluating...",
            Self::Evaluating => "Evaluation",
        }
    }
}

impl StateMachine for ConversationPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationPhase::*;
        match self {
            PreChat => vec![Chatting],
            Chatting => vec![
                AwaitingHelpfulPermission,
                AwaitingTranscriptPermission,
                FeedbackComplete,
            ],
            AwaitingHelpfulPermission => vec![
                AwaitingHelpfulScore,
                AwaitingTranscriptPermission,
                FeedbackComplete,
            ],
            AwaitingHelpfulScore => vec![AwaitingLikedFeedback],
            AwaitingLikedFeedback => vec![AwaitingImproveFeedback],
            AwaitingImproveFeedback => vec![AwaitingTranscriptPermission, FeedbackComplete],
            AwaitingTranscriptPermission => vec![FeedbackComplete],
            FeedbackComplete => vec![EvaluationLoading],
            EvaluationLoading => vec![Evaluating, Chatting],
            Evaluating => vec![],
        }
    }
}
