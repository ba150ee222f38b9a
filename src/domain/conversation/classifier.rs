//! Input classifiers for learner messages.
//!
//! The vocabularies below are part of the external contract: prompts tell
//! the protagonist and the coach to use exactly the same rules, so changing a
//! word here changes what learners are told to type.

use once_cell::sync::Lazy;
use regex::Regex;

/// The token that marks a hint request. Only this word counts; "help",
/// "clue" and plurals such as "hints" do not.
pub const HINT_TOKEN: &str = "hint";

/// Phrase that ends the chat portion of the conversation.
pub const TIME_UP_MARKER: &str = "time is up";

/// Words and phrases treated as an affirmative answer.
pub const AFFIRMATIVE_VOCABULARY: [&str; 9] = [
    "yes",
    "y",
    "sure",
    "ok",
    "yeah",
    "yep",
    "absolutely",
    "i would",
    "of course",
];

static HINT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bhint\b").expect("hint pattern is a valid regex")
});

static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d*\.?\d+").expect("number pattern is a valid regex")
});

/// Returns true if the message contains the literal token `hint`,
/// case-insensitively, as a whole word.
///
/// ```ignore
/// assert!(is_hint_request("Can I get a HINT?"));
/// assert!(!is_hint_request("I need help"));
/// ```
pub fn is_hint_request(text: &str) -> bool {
    HINT_PATTERN.is_match(text)
}

/// Returns true if the message contains the time-up marker phrase.
pub fn is_time_up(text: &str) -> bool {
    text.to_lowercase().contains(TIME_UP_MARKER)
}

/// Returns true if the reply is affirmative.
///
/// Multi-word phrases ("i would", "of course") match anywhere in the text.
/// Single words match at the start of a word, so "okay" and "yess" count
/// while "look" does not. The one-letter "y" must be the whole word.
pub fn is_affirmative(text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    AFFIRMATIVE_VOCABULARY.iter().any(|entry| {
        if entry.contains(' ') {
            lower.contains(entry)
        } else if entry.len() == 1 {
            words.iter().any(|w| w == entry)
        } else {
            words.iter().any(|w| w.starts_with(entry))
        }
    })
}

/// Extracts the first decimal number and accepts it only inside `[1, 5]`.
pub fn extract_score(text: &str) -> Option<f64> {
    NUMBER_PATTERN
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|score| (1.0..=5.0).contains(score))
}
