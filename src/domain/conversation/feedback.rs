use serde::{Deserialize, Serialize};

/// Answers captured by the post-chat questionnaire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Helpfulness score in `[1, 5]`, unset if the reply held no valid number.
    pub helpful_score: Option<f64>,
    pub liked: Option<String>,
    pub improve: Option<String>,
    /// Whether the learner agreed to keep an anonymized transcript.
    pub transcript_consent: bool,
}
