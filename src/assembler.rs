//! Folds inbound response events into the conversation.

use crate::observability::{SESSION_FRAGMENTS, SESSION_REPORTED_ELAPSED, SESSION_REQUEST_ERRORS};
use crate::state::SessionState;
use crate::types::{EventKind, MessageId, Provider, Role};

/// Text recorded when the backend reports a failure without a reason.
pub const FALLBACK_ERROR_TEXT: &str = "An error occurred";

/// Where the current response is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblerPhase {
    /// Nothing received for the current request yet.
    #[default]
    Idle,

    /// Fragments are being appended to this message.
    Streaming(MessageId),

    /// The response completed.
    Finalized,

    /// The response failed.
    Errored,
}

/// What applying one event did to the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// A new assistant message was started with the fragment.
    Started(MessageId),

    /// The fragment was appended to the in-progress message.
    Appended(MessageId),

    /// The response finished; carries the finalized message if one streamed.
    Completed(Option<MessageId>),

    /// The response failed; the partial message, if any, is kept.
    Failed {
        /// The text of the appended error message.
        reason: String,

        /// The assistant message that was cut short.
        partial: Option<MessageId>,
    },

    /// A system message was appended.
    Notice {
        /// True when the notice was recorded as a provider warning.
        credential_warning: bool,
    },
}

/// Turns a sequence of `streaming`/`complete`/`error` events into message
/// list mutations.
#[derive(Debug, Clone, Default)]
pub struct StreamAssembler {
    phase: AssemblerPhase,
}

impl StreamAssembler {
    /// Creates an idle assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current phase.
    pub fn phase(&self) -> AssemblerPhase {
        self.phase
    }

    /// Returns to `Idle` for a new request.
    pub fn reset(&mut self) {
        self.phase = AssemblerPhase::Idle;
    }

    /// Applies one event to `state`.
    ///
    /// `provider` is the provider credential warnings are recorded against.
    pub fn apply(
        &mut self,
        state: &mut SessionState,
        kind: &EventKind,
        provider: &Provider,
    ) -> Assembled {
        match kind {
            EventKind::Streaming(fragment) => {
                SESSION_FRAGMENTS.click();
                if let Some(message) = state.streaming_message_mut() {
                    let id = message.id();
                    message.append(&fragment.content);
                    self.phase = AssemblerPhase::Streaming(id);
                    Assembled::Appended(id)
                } else {
                    let id = state.push_streaming_assistant(&fragment.content);
                    self.phase = AssemblerPhase::Streaming(id);
                    Assembled::Started(id)
                }
            }
            EventKind::Complete(metadata) => {
                let finalized = finalize_streaming(state);
                if let Some(elapsed) = metadata.elapsed {
                    SESSION_REPORTED_ELAPSED.add(elapsed);
                }
                state.set_last_metadata(*metadata);
                state.set_last_error(None);
                state.finish_request();
                self.phase = AssemblerPhase::Finalized;
                Assembled::Completed(finalized)
            }
            EventKind::Error(failure) => {
                SESSION_REQUEST_ERRORS.click();
                let partial = finalize_streaming(state);
                let reason = failure
                    .reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(FALLBACK_ERROR_TEXT)
                    .to_string();
                state.push_finalized(Role::Error, reason.clone());
                state.set_last_error(Some(reason.clone()));
                state.finish_request();
                self.phase = AssemblerPhase::Errored;
                Assembled::Failed { reason, partial }
            }
            EventKind::SystemMessage(notice) => {
                let credential_warning = notice.is_credential_warning();
                if credential_warning {
                    tracing::info!(%provider, "provider credential warning recorded");
                    state.record_provider_warning(provider.clone(), notice.content.clone());
                }
                state.push_finalized(Role::SystemInfo, notice.content.clone());
                Assembled::Notice { credential_warning }
            }
        }
    }
}

fn finalize_streaming(state: &mut SessionState) -> Option<MessageId> {
    let message = state.streaming_message_mut()?;
    message.finalize();
    Some(message.id())
}
