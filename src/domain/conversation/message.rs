//! Transcript messages.
//!
//! The transcript is append-only. The one sanctioned mutation is
//! [`Transcript::replace_placeholder`], used to swap the "stand by" notice for
//! the real reply once an automatic retry succeeds.

use serde::{Deserialize, Serialize};

use super::classifier::is_hint_request;
use crate::domain::foundation::{MessageId, Timestamp};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner.
    User,
    /// The protagonist (AI or a locally generated line in its voice).
    Model,
}

/// One immutable entry of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub sent_at: Timestamp,
}

impl Message {
    /// Creates a new message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            sent_at: Timestamp::now(),
        }
    }

    /// Creates a learner message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a protagonist message.
    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Handle to a placeholder message that may later be replaced once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSlot {
    index: usize,
    id: MessageId,
}

/// Ordered, append-only message sequence owned by one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns a reference to it.
    pub fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Appends a message that may later be replaced by [`Self::replace_placeholder`].
    pub fn push_placeholder(&mut self, message: Message) -> PlaceholderSlot {
        let slot = PlaceholderSlot {
            index: self.messages.len(),
            id: message.id,
        };
        self.messages.push(message);
        slot
    }

    /// Replaces a placeholder in place. Returns false if the slot is stale.
    pub fn replace_placeholder(&mut self, slot: PlaceholderSlot, replacement: Message) -> bool {
        match self.messages.get_mut(slot.index) {
            Some(existing) if existing.id == slot.id => {
                *existing = replacement;
                true
            }
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of learner messages.
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    /// Number of learner messages that match the strict hint pattern.
    ///
    /// This is the upper bound for any hint counter kept alongside the
    /// transcript.
    pub fn hint_request_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.is_user() && is_hint_request(&m.content))
            .count()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_order() {
        let mut t = Transcript::new();
        t.push(Message::user("one"));
        t.push(Message::model("two"));
        let contents: Vec<_> = t.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn counts_user_messages_and_hints() {
        let mut t = Transcript::new();
        t.push(Message::user("Can I get a hint?"));
        t.push(Message::model("Look at margins."));
        t.push(Message::user("I need help"));
        t.push(Message::user("another HINT please"));
        assert_eq!(t.user_message_count(), 3);
        assert_eq!(t.hint_request_count(), 2);
    }

    #[test]
    fn model_messages_never_count_as_hints() {
        let mut t = Transcript::new();
        t.push(Message::model("Here is a hint: check exhibit 1"));
        assert_eq!(t.hint_request_count(), 0);
    }

    #[test]
    fn placeholder_is_replaced_in_place() {
        let mut t = Transcript::new();
        t.push(Message::user("hello"));
        let slot = t.push_placeholder(Message::model("stand by"));
        assert!(t.replace_placeholder(slot, Message::model("real reply")));
        assert_eq!(t.len(), 2);
        assert_eq!(t.last().unwrap().content, "real reply");
    }

    #[test]
    fn stale_slot_is_not_applied() {
        let mut t = Transcript::new();
        let slot = t.push_placeholder(Message::model("stand by"));
        assert!(t.replace_placeholder(slot, Message::model("first")));
        assert!(!t.replace_placeholder(slot, Message::model("second")));
        assert_eq!(t.last().unwrap().content, "first");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }
}
