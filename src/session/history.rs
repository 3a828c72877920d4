//! Conversation history
//!
//! History is an owned, append-only sequence of immutable messages. Every
//! message carries a provenance tag recording whether it entered history
//! verbatim, was rewritten by the redactor, or is a synthetic rejection
//! notice; the tag is what makes a later audit (or a later turn echoing
//! history) distinguishable from a fresh leak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a committed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// How a message's content reached history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Committed verbatim after guard approval
    Original,
    /// Rewritten by the redactor before commit
    Redacted,
    /// Synthetic notice recording a refused response
    RejectionNotice,
}

/// One committed turn unit. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            provenance,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, Provenance::Original)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Provenance::Original)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Provenance::Original)
    }

    pub fn redacted(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Provenance::Redacted)
    }

    pub fn rejection_notice(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Provenance::RejectionNotice)
    }
}

/// Append-only message sequence owned by one session.
///
/// There is deliberately no API for truncating, reordering, or replacing
/// messages; the only mutation is `append`.
#[derive(Debug, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Seed a history with the assistant's system prompt and the protected
    /// profile document.
    ///
    /// The profile travels as a user-role message: it models data
    /// retrieved from a directory store and handed to the assistant as
    /// context, not as instructions.
    pub fn seeded(system_prompt: &str, profile: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(profile)],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_history_has_system_then_profile() {
        let history = History::seeded("You are a directory assistant.", "# Profile: Amanda");
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role, Role::System);
        assert_eq!(history.messages()[1].role, Role::User);
        assert_eq!(history.messages()[1].provenance, Provenance::Original);
    }

    #[test]
    fn constructors_set_provenance() {
        assert_eq!(Message::user("hi").provenance, Provenance::Original);
        assert_eq!(Message::assistant("hello").provenance, Provenance::Original);
        assert_eq!(
            Message::redacted("the card is [REDACTED]").provenance,
            Provenance::Redacted
        );
        assert_eq!(
            Message::rejection_notice("a disallowed request was attempted").provenance,
            Provenance::RejectionNotice
        );
    }

    #[test]
    fn append_preserves_order() {
        let mut history = History::seeded("sys", "profile");
        history.append(Message::user("first"));
        history.append(Message::assistant("second"));
        let contents: Vec<&str> = history
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["sys", "profile", "first", "second"]);
    }

    #[test]
    fn messages_have_distinct_audit_ids() {
        let a = Message::user("same text");
        let b = Message::user("same text");
        assert_ne!(a.id, b.id);
    }
}
