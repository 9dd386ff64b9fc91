use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifies a message within a session.
///
/// Identifiers are derived from the creation time in milliseconds and are
/// strictly increasing within one generator, so sorting by id reproduces
/// conversation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out creation-time based, strictly increasing message ids.
#[derive(Debug, Default, Clone)]
pub struct MessageIdGenerator {
    last: u64,
}

impl MessageIdGenerator {
    /// Returns the next id.
    pub fn next_id(&mut self) -> MessageId {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let now = u64::try_from(now).unwrap_or(0);
        self.last = now.max(self.last.saturating_add(1));
        MessageId(self.last)
    }

    /// Ensures future ids sort after `id`.
    pub fn observe(&mut self, id: MessageId) {
        self.last = self.last.max(id.0);
    }
}

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text the user sent.
    User,

    /// Text generated by the backend.
    Assistant,

    /// Informational notices from the backend or the client.
    SystemInfo,

    /// A request-level failure reported by the backend.
    Error,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::SystemInfo => write!(f, "system-info"),
            Role::Error => write!(f, "error"),
        }
    }
}

/// One turn in the conversation.
///
/// Content can only grow while the message is not finalized; once finalized
/// the message is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    finalized: bool,
}

impl Message {
    /// Creates a finalized user message.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::finalized(id, Role::User, content)
    }

    /// Creates an assistant message that is still receiving fragments.
    pub fn streaming_assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            finalized: false,
        }
    }

    /// Creates a finalized message with any role.
    pub fn finalized(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            finalized: true,
        }
    }

    /// The message id.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// The message role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether further fragments may still be appended.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Appends a fragment; returns false and leaves the content untouched if
    /// the message is already finalized.
    pub fn append(&mut self, fragment: &str) -> bool {
        if self.finalized {
            return false;
        }
        self.content.push_str(fragment);
        true
    }

    /// Marks the message as complete.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }
}
