//! Conversation domain: phases, transcript, input classifiers and the pure
//! phase transition engine.

mod classifier;
mod engine;
mod feedback;
mod message;
mod options;
mod phase;

pub use classifier::{
    extract_score, is_affirmative, is_hint_request, is_time_up, AFFIRMATIVE_VOCABULARY,
    HINT_TOKEN, TIME_UP_MARKER,
};
pub use engine::{
    entry_prompt, ConversationSnapshot, Effect, PhaseTransitionEngine, Transition,
    TransitionError, CLOSING_MESSAGE, HELPFUL_PERMISSION_PROMPT, HELPFUL_SCORE_PROMPT,
    HINT_REFUSAL, IMPROVE_PROMPT, KEEP_GOING, LIKED_PROMPT, TRANSCRIPT_PERMISSION_PROMPT,
};
pub use feedback::FeedbackRecord;
pub use message::{Message, PlaceholderSlot, Role, Transcript};
pub use options::ChatOptions;
pub use phase::ConversationPhase;
