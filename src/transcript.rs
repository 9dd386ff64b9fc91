//! Saving, loading and exporting conversations.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_reader, to_writer_pretty};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::error::{Error, Result};
use crate::types::{Message, Provider, Role};

/// Current transcript file version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// A saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// File format version.
    #[serde(default = "default_version")]
    pub version: u8,

    /// When the transcript was written, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Provider selected when the transcript was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,

    /// Model selected when the transcript was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The conversation.
    pub messages: Vec<Message>,
}

fn default_version() -> u8 {
    TRANSCRIPT_VERSION
}

impl Transcript {
    /// Captures a conversation together with the current selection.
    pub fn new(messages: &[Message], provider: &Provider, model: Option<&str>) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            provider: Some(provider.clone()),
            model: model.map(str::to_string),
            messages: messages.to_vec(),
        }
    }

    /// Parses a transcript from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a validation error when there is no `messages` array and a
    /// serialization error when the messages are malformed.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.get("messages").is_some_and(Value::is_array) {
            return Err(Error::validation(
                "invalid chat data format: no messages array",
                Some("messages".to_string()),
            ));
        }
        serde_json::from_value(value).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })
    }

    /// Writes the transcript as pretty-printed JSON.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, self).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Reads a transcript written by [`Transcript::save_to`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let value: Value = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        Self::from_value(value)
    }
}

/// Renders a conversation as plain text.
///
/// System notices are left out; user turns are labelled `User:` and every
/// other turn `AI:`.
pub fn export_text(messages: &[Message], model_label: &str, at: OffsetDateTime) -> String {
    let when = at
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default();
    let body = messages
        .iter()
        .filter(|m| m.role() != Role::SystemInfo)
        .map(|m| {
            let label = if m.role() == Role::User { "User" } else { "AI" };
            format!("{label}: {}", m.content())
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Chat Export - {when}\nModel: {model_label}\n\n{body}")
}

/// Writes [`export_text`] output to `path`.
pub fn export_text_to<P: AsRef<Path>>(
    path: P,
    messages: &[Message],
    model_label: &str,
) -> Result<()> {
    let text = export_text(messages, model_label, OffsetDateTime::now_utc());
    let file = File::create(path.as_ref())
        .map_err(|err| Error::io("failed to create export file", err))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|err| Error::io("failed to write export file", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageId;
    use serde_json::json;
    use time::macros::datetime;

    fn conversation() -> Vec<Message> {
        vec![
            Message::finalized(MessageId(1), Role::SystemInfo, "Connected to server"),
            Message::user(MessageId(2), "hi"),
            Message::finalized(MessageId(3), Role::Assistant, "Hello"),
            Message::finalized(MessageId(4), Role::Error, "rate limited"),
        ]
    }

    #[test]
    fn save_and_load_preserve_conversation() {
        let dir = std::env::temp_dir().join(format!("ragchat-transcript-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chat.json");

        let transcript = Transcript::new(
            &conversation(),
            &Provider::from("groq"),
            Some("llama-3.1-8b-instant"),
        );
        transcript.save_to(&path).unwrap();
        let loaded = Transcript::load_from(&path).unwrap();

        assert_eq!(loaded, transcript);
        assert!(loaded.timestamp.is_some());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_missing_messages_array() {
        let err = Transcript::from_value(json!({"provider": "groq"})).unwrap_err();
        assert!(err.is_validation());
        let err = Transcript::from_value(json!({"messages": "nope"})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn minimal_transcript_parses() {
        let transcript = Transcript::from_value(json!({"messages": []})).unwrap();
        assert_eq!(transcript.version, TRANSCRIPT_VERSION);
        assert!(transcript.provider.is_none());
        assert!(transcript.messages.is_empty());
    }

    #[test]
    fn export_skips_system_info() {
        let text = export_text(
            &conversation(),
            "Groq Llama 3.1 8B Instant",
            datetime!(2025-03-01 12:30:00 UTC),
        );
        assert_eq!(
            text,
            "Chat Export - 2025-03-01 12:30:00\n\
             Model: Groq Llama 3.1 8B Instant\n\n\
             User: hi\n\n\
             AI: Hello\n\n\
             AI: rate limited"
        );
    }
}
