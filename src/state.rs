//! Authoritative conversation state for one session.
//!
//! `SessionState` is readable by anyone holding a reference, but only this
//! crate mutates it: the controller applies user intents and the assembler
//! applies inbound events. History only grows at the tail or is truncated
//! from the tail.

use std::collections::BTreeMap;

use crate::types::{
    ConnectionStatus, Message, MessageId, MessageIdGenerator, Provider, RequestId,
    ResponseMetadata, Role,
};

/// Conversation history plus the flags derived from it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    messages: Vec<Message>,
    ids: MessageIdGenerator,
    connection_status: ConnectionStatus,
    busy: bool,
    active_request: Option<RequestId>,
    provider_warnings: BTreeMap<Provider, String>,
    last_metadata: Option<ResponseMetadata>,
    last_error: Option<String>,
}

impl SessionState {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The assistant message still receiving fragments, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.streaming_index().map(|idx| &self.messages[idx])
    }

    /// Text of the most recent user message.
    pub fn last_user_text(&self) -> Option<&str> {
        self.last_user_index().map(|idx| self.messages[idx].content())
    }

    /// Last observed connection status.
    pub fn connection_status(&self) -> &ConnectionStatus {
        &self.connection_status
    }

    /// True from the moment a request is sent until its terminal event.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Correlation token of the in-flight request.
    pub fn active_request(&self) -> Option<RequestId> {
        self.active_request
    }

    /// Last known configuration warning per provider.
    pub fn provider_warnings(&self) -> &BTreeMap<Provider, String> {
        &self.provider_warnings
    }

    /// Last known configuration warning for `provider`.
    pub fn provider_warning(&self, provider: &Provider) -> Option<&str> {
        self.provider_warnings.get(provider).map(String::as_str)
    }

    /// Out-of-band information from the most recent `complete`.
    pub fn last_metadata(&self) -> Option<&ResponseMetadata> {
        self.last_metadata.as_ref()
    }

    /// Text of the most recent request-level error.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_connection_status(&mut self, status: ConnectionStatus) {
        self.connection_status = status;
    }

    pub(crate) fn push_finalized(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = self.ids.next_id();
        self.messages.push(Message::finalized(id, role, content));
        id
    }

    pub(crate) fn push_streaming_assistant(&mut self, fragment: &str) -> MessageId {
        debug_assert!(self.streaming_index().is_none());
        let id = self.ids.next_id();
        self.messages.push(Message::streaming_assistant(id, fragment));
        id
    }

    pub(crate) fn streaming_message_mut(&mut self) -> Option<&mut Message> {
        self.streaming_index().map(|idx| &mut self.messages[idx])
    }

    pub(crate) fn begin_request(&mut self, request_id: RequestId) {
        self.busy = true;
        self.active_request = Some(request_id);
    }

    pub(crate) fn finish_request(&mut self) {
        self.busy = false;
        self.active_request = None;
    }

    pub(crate) fn set_last_metadata(&mut self, metadata: ResponseMetadata) {
        self.last_metadata = Some(metadata);
    }

    pub(crate) fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub(crate) fn record_provider_warning(&mut self, provider: Provider, warning: String) {
        self.provider_warnings.insert(provider, warning);
    }

    pub(crate) fn clear_provider_warning(&mut self, provider: &Provider) -> bool {
        self.provider_warnings.remove(provider).is_some()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Drops everything after the most recent user message and returns that
    /// message's text.
    pub(crate) fn truncate_after_last_user(&mut self) -> Option<String> {
        let idx = self.last_user_index()?;
        self.messages.truncate(idx + 1);
        Some(self.messages[idx].content().to_string())
    }

    /// Forgets conversation facts; connection and provider facts survive.
    pub(crate) fn clear_conversation(&mut self) {
        self.messages.clear();
        self.last_metadata = None;
        self.last_error = None;
        self.finish_request();
    }

    /// Replaces the history wholesale; every message is finalized.
    pub(crate) fn replace_messages(&mut self, messages: Vec<Message>) {
        self.clear_conversation();
        for mut message in messages {
            message.finalize();
            self.ids.observe(message.id());
            self.messages.push(message);
        }
    }

    fn streaming_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role() == Role::Assistant && !m.is_finalized())
    }

    fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role() == Role::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_empty() {
        let state = SessionState::new();
        assert!(state.messages().is_empty());
        assert!(!state.is_busy());
        assert_eq!(state.active_request(), None);
        assert_eq!(state.connection_status(), &ConnectionStatus::Disconnected);
        assert!(state.last_metadata().is_none());
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut state = SessionState::new();
        let a = state.push_finalized(Role::User, "a");
        let b = state.push_streaming_assistant("x");
        assert!(a < b);
        assert_eq!(state.streaming_message().map(Message::id), Some(b));
    }

    #[test]
    fn truncate_after_last_user_drops_trailing_output() {
        let mut state = SessionState::new();
        state.push_finalized(Role::User, "a");
        state.push_finalized(Role::Assistant, "x");
        state.push_finalized(Role::User, "b");
        state.push_streaming_assistant("y");
        state.push_finalized(Role::Error, "boom");

        assert_eq!(state.truncate_after_last_user().as_deref(), Some("b"));
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.last_message().map(Message::content), Some("b"));
        assert!(state.streaming_message().is_none());
    }

    #[test]
    fn truncate_without_user_is_none() {
        let mut state = SessionState::new();
        state.push_finalized(Role::SystemInfo, "Connected to server");
        assert_eq!(state.truncate_after_last_user(), None);
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn clear_keeps_connection_and_provider_facts() {
        let mut state = SessionState::new();
        state.set_connection_status(ConnectionStatus::Connected);
        state.record_provider_warning(Provider::from("cohere"), "missing key".to_string());
        state.push_finalized(Role::User, "a");
        state.begin_request(RequestId(1));
        state.set_last_metadata(ResponseMetadata::with_elapsed(0.5));
        state.set_last_error(Some("boom".to_string()));

        state.clear_conversation();

        assert!(state.messages().is_empty());
        assert!(state.last_metadata().is_none());
        assert!(state.last_error().is_none());
        assert!(!state.is_busy());
        assert_eq!(state.connection_status(), &ConnectionStatus::Connected);
        assert_eq!(
            state.provider_warning(&Provider::from("cohere")),
            Some("missing key")
        );
    }

    #[test]
    fn replace_messages_finalizes_everything() {
        let mut state = SessionState::new();
        let loaded = vec![
            Message::user(MessageId(10), "hi"),
            Message::streaming_assistant(MessageId(11), "partial"),
        ];
        state.replace_messages(loaded);
        assert!(state.messages().iter().all(Message::is_finalized));
        let next = state.push_finalized(Role::User, "again");
        assert!(next > MessageId(11));
    }
}
