use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{RequestId, ResponseMetadata};

/// Event name for streamed response frames.
pub const CHAT_RESPONSE_EVENT: &str = "chat_response";

/// Event name for out-of-band notices.
pub const SYSTEM_MESSAGE_EVENT: &str = "system_message";

/// Event name for outbound queries.
pub const CHAT_QUERY_EVENT: &str = "chat_query";

/// Text the backend uses when a provider has no usable credential.
pub const CREDENTIAL_WARNING_MARKER: &str = "API key missing or invalid";

/// One piece of an assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Text to append to the in-progress message.
    #[serde(default)]
    pub content: String,
}

/// A request-level failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestFailure {
    /// Reason supplied by the server, if any.
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Severity of a system message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Something the user should act on.
    Warning,

    /// Purely informational; unknown severities land here too.
    #[serde(other)]
    Info,
}

/// A notice that is not part of any response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    /// Severity of the notice.
    #[serde(alias = "status")]
    pub severity: Severity,

    /// Human-readable text.
    pub content: String,
}

impl SystemMessage {
    /// Returns true if this notice reports a missing or invalid provider credential.
    pub fn is_credential_warning(&self) -> bool {
        self.severity == Severity::Warning && self.content.contains(CREDENTIAL_WARNING_MARKER)
    }
}

/// Wire shape of a `chat_response` payload, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ChatResponse {
    Streaming(Fragment),
    Complete(ResponseMetadata),
    Error(RequestFailure),
}

/// What an inbound event carries.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// A fragment of the in-progress assistant message.
    Streaming(Fragment),

    /// The response finished.
    Complete(ResponseMetadata),

    /// The response failed.
    Error(RequestFailure),

    /// An informational or warning notice.
    SystemMessage(SystemMessage),
}

impl EventKind {
    /// Returns true for `complete` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete(_) | EventKind::Error(_))
    }
}

/// An event received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Request the event belongs to, when the backend tags it.
    pub request_id: Option<RequestId>,

    /// The event body.
    pub kind: EventKind,
}

impl InboundEvent {
    /// Creates an untagged event.
    pub fn new(kind: EventKind) -> Self {
        Self {
            request_id: None,
            kind,
        }
    }

    /// Creates an event tagged with a request id.
    pub fn tagged(request_id: RequestId, kind: EventKind) -> Self {
        Self {
            request_id: Some(request_id),
            kind,
        }
    }

    /// Decodes the payload of a named transport event.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for unknown event names and a serialization
    /// error for payloads that do not match the event's shape.
    pub fn decode(event: &str, payload: &Value) -> Result<Self> {
        let request_id = payload
            .get("request_id")
            .and_then(Value::as_u64)
            .map(RequestId);
        let kind = match event {
            CHAT_RESPONSE_EVENT => match ChatResponse::deserialize(payload)? {
                ChatResponse::Streaming(fragment) => EventKind::Streaming(fragment),
                ChatResponse::Complete(metadata) => EventKind::Complete(metadata),
                ChatResponse::Error(failure) => EventKind::Error(failure),
            },
            SYSTEM_MESSAGE_EVENT => EventKind::SystemMessage(SystemMessage::deserialize(payload)?),
            other => {
                return Err(Error::protocol(format!("unexpected event '{other}'")));
            }
        };
        Ok(Self { request_id, kind })
    }
}
