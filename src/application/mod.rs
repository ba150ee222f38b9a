//! Application layer - Conversation orchestration.
//!
//! Coordinates the domain engine with the AI session port:
//! - `controller` - Drives one conversation through its phases
//! - `evaluation` - One-shot rubric evaluation of a finished transcript
//! - `retry` - The cancellable single-retry timer

pub mod controller;
pub mod evaluation;
pub mod retry;

pub use controller::{
    ControllerError, ConversationController, ConversationSetup, Notice, TurnOutcome,
    BUSY_ERROR, RETRY_ACKNOWLEDGEMENT, STAND_BY_MESSAGE, STILL_BUSY_ERROR,
};
pub use evaluation::{EvaluationError, EvaluationInvoker, EVALUATION_REQUEST};
pub use retry::{wait_until, RetryTimer, DEFAULT_RETRY_DELAY};
