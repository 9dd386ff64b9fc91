//! The session controller.
//!
//! `SessionController` is the only writer of [`SessionState`]. It turns user
//! intents into outbound queries and routes inbound transport events
//! through the [`StreamAssembler`]. Transport handlers run on whatever task
//! the transport uses; they only decode and forward onto a channel, and all
//! state mutation happens on the task that owns the controller.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};

use crate::assembler::{Assembled, StreamAssembler};
use crate::catalog::ModelCatalog;
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_FIRST_FRAGMENT, SESSION_REQUESTS, SESSION_RETRIES, SESSION_STALE_EVENTS,
    TRANSPORT_MALFORMED_FRAMES,
};
use crate::render::Renderer;
use crate::request::build_query;
use crate::state::SessionState;
use crate::transcript::Transcript;
use crate::transport::{Handler, Link, Transport, handler};
use crate::types::{
    CHAT_QUERY_EVENT, CHAT_RESPONSE_EVENT, ConnectionStatus, EventKind, InboundEvent, Provider,
    QueryPayload, RequestId, RetrievalMode, Role, SYSTEM_MESSAGE_EVENT,
};

/// The controller's global state, derived from [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Connected and idle; `send` is accepted.
    Ready,

    /// Not connected yet, or reconnecting.
    AwaitingConnection,

    /// A request is in flight.
    Streaming,

    /// The transport gave up.
    Error,
}

/// Orchestrates one chat session over a [`Transport`].
pub struct SessionController<T: Transport + ?Sized> {
    transport: Arc<T>,
    state: SessionState,
    assembler: StreamAssembler,
    catalog: ModelCatalog,
    provider: Provider,
    model_id: Option<String>,
    mode: RetrievalMode,
    next_request: u64,
    request_provider: Option<Provider>,
    sent_at: Option<Instant>,
    warned_this_request: bool,
    orphaned: bool,
    epoch: u64,
    request_epoch: u64,
    notice: Option<String>,
    announced: ConnectionStatus,
    inbound: mpsc::UnboundedReceiver<InboundEvent>,
    status_rx: watch::Receiver<Link>,
    handlers: Vec<(&'static str, Handler)>,
}

enum Update {
    Event(Option<InboundEvent>),
    Status(bool),
}

impl<T: Transport + ?Sized> SessionController<T> {
    /// Creates a controller and subscribes to the transport's events.
    ///
    /// The controller starts with an empty catalog, the default provider and
    /// the LLM-only mode. It does not connect the transport.
    pub fn new(transport: Arc<T>) -> Self {
        let (tx, inbound) = mpsc::unbounded_channel();
        let mut handlers = Vec::new();
        for event in [CHAT_RESPONSE_EVENT, SYSTEM_MESSAGE_EVENT] {
            let tx = tx.clone();
            let h = handler(move |payload| match InboundEvent::decode(event, payload) {
                Ok(decoded) => {
                    let _ = tx.send(decoded);
                }
                Err(err) => {
                    TRANSPORT_MALFORMED_FRAMES.click();
                    tracing::warn!(event, error = %err, "dropping malformed event");
                }
            });
            transport.on(event, Arc::clone(&h));
            handlers.push((event, h));
        }

        let mut status_rx = transport.watch_status();
        let link = status_rx.borrow_and_update().clone();
        let mut state = SessionState::new();
        state.set_connection_status(link.status.clone());

        Self {
            transport,
            state,
            assembler: StreamAssembler::new(),
            catalog: ModelCatalog::new(),
            provider: Provider::default(),
            model_id: None,
            mode: RetrievalMode::default(),
            next_request: 0,
            request_provider: None,
            sent_at: None,
            warned_this_request: false,
            orphaned: false,
            epoch: link.epoch,
            request_epoch: link.epoch,
            notice: None,
            announced: link.status,
            inbound,
            status_rx,
            handlers,
        }
    }

    /// Installs a catalog; the provider's default model is selected if no
    /// model is selected yet.
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.set_catalog(catalog);
        self
    }

    /// Selects the initial provider and its default model.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.select_provider(provider);
        self
    }

    /// Selects the initial model.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Selects the initial retrieval mode.
    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    /// The conversation and its derived flags.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The controller's global state.
    pub fn phase(&self) -> ControllerPhase {
        if self.state.is_busy() {
            return ControllerPhase::Streaming;
        }
        match self.state.connection_status() {
            ConnectionStatus::Connected => ControllerPhase::Ready,
            ConnectionStatus::Error(_) => ControllerPhase::Error,
            ConnectionStatus::Connecting | ConnectionStatus::Disconnected => {
                ControllerPhase::AwaitingConnection
            }
        }
    }

    /// The selected provider.
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The selected model.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    /// The selected retrieval mode.
    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    /// The model catalog in use.
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// The warning shown for the current provider selection.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// True when the connection dropped while a request was in flight.
    pub fn is_orphaned(&self) -> bool {
        self.orphaned
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Human-readable model label, e.g. `Groq Llama 3.1 8B Instant`.
    pub fn model_label(&self) -> String {
        let model = match self.model_id.as_deref() {
            Some(id) => self
                .catalog
                .find(&self.provider, id)
                .map_or(id, |info| info.name.as_str()),
            None => "(no model)",
        };
        format!("{} {model}", self.provider.display_name())
    }

    /// One-line description of the current selection.
    pub fn status_line(&self) -> String {
        format!("{} {}", self.model_label(), self.mode.describe())
    }

    /// Starts connecting the transport.
    pub fn connect(&self) {
        self.transport.connect();
    }

    /// Disconnects the transport.
    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
        self.sync_status();
    }

    /// Sends `text` as a new query.
    ///
    /// This is a silent no-op unless the controller is `Ready` and the text
    /// and selection produce a valid query. Returns the id of the request
    /// that was sent.
    pub fn send(&mut self, text: &str) -> Option<RequestId> {
        self.sync_status();
        if self.phase() != ControllerPhase::Ready {
            tracing::debug!(phase = ?self.phase(), "send ignored");
            return None;
        }
        let payload = match build_query(text, &self.provider, self.model_id.as_deref(), self.mode)
        {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "send ignored");
                return None;
            }
        };
        let rollback_len = self.state.messages().len();
        self.state.push_finalized(Role::User, payload.query.clone());
        self.dispatch(payload, rollback_len)
    }

    /// Re-sends the most recent user message, replacing whatever followed it.
    ///
    /// Ignored while a request is in flight, unless the connection dropped
    /// during that request. An orphaned request is abandoned even if the
    /// connection is still down; nothing is sent in that case.
    pub fn retry(&mut self) -> Option<RequestId> {
        self.sync_status();
        if self.state.is_busy() && !self.orphaned {
            tracing::debug!("retry ignored while streaming");
            return None;
        }
        self.state.last_user_text()?;
        let connected = self.state.connection_status().is_connected();
        if !connected && !self.orphaned {
            tracing::debug!("retry ignored while disconnected");
            return None;
        }

        SESSION_RETRIES.click();
        let text = self.state.truncate_after_last_user()?;
        if self.orphaned {
            tracing::info!(request = ?self.state.active_request(), "abandoning orphaned request");
            self.abandon_request();
        }
        if !connected {
            return None;
        }
        let payload = match build_query(&text, &self.provider, self.model_id.as_deref(), self.mode)
        {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "retry not sent");
                return None;
            }
        };
        let rollback_len = self.state.messages().len();
        self.dispatch(payload, rollback_len)
    }

    /// Empties the conversation. Connection status and provider warnings
    /// survive.
    pub fn clear(&mut self) {
        tracing::info!(superseded = ?self.state.active_request(), "conversation cleared");
        self.state.clear_conversation();
        self.abandon_request();
    }

    /// Selects a provider and its default model.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error while a request is in flight.
    pub fn switch_provider(&mut self, provider: Provider) -> Result<()> {
        self.ensure_idle("switch provider")?;
        self.select_provider(provider);
        Ok(())
    }

    /// Selects a model of the current provider.
    ///
    /// Models the catalog does not list are accepted.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error while a request is in flight and a
    /// validation error for a blank id.
    pub fn switch_model(&mut self, model_id: &str) -> Result<()> {
        self.ensure_idle("switch model")?;
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(Error::validation(
                "model id must not be empty",
                Some("model_id".to_string()),
            ));
        }
        if !self.catalog.contains(&self.provider, model_id) {
            tracing::debug!(provider = %self.provider, model_id, "model not in catalog");
        }
        self.model_id = Some(model_id.to_string());
        Ok(())
    }

    /// Selects a retrieval mode.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error while a request is in flight.
    pub fn switch_mode(&mut self, mode: RetrievalMode) -> Result<()> {
        self.ensure_idle("switch mode")?;
        self.mode = mode;
        Ok(())
    }

    /// Replaces the catalog. The current selection is kept even if the new
    /// catalog does not list it; a default is picked only when no model is
    /// selected.
    pub fn set_catalog(&mut self, catalog: ModelCatalog) {
        self.catalog = catalog;
        if self.model_id.is_none() {
            self.model_id = self
                .catalog
                .default_model(&self.provider)
                .map(|model| model.id.clone());
        }
    }

    /// Replaces the conversation with a saved transcript.
    ///
    /// The transcript's provider and model are applied when the catalog
    /// knows them.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error while a request is in flight.
    pub fn load_transcript(&mut self, transcript: Transcript) -> Result<()> {
        self.ensure_idle("load a transcript")?;
        if let Some(provider) = transcript.provider
            && !self.catalog.models(&provider).is_empty()
        {
            self.select_provider(provider);
            if let Some(model) = transcript.model
                && self.catalog.contains(&self.provider, &model)
            {
                self.model_id = Some(model);
            }
        }
        tracing::info!(messages = transcript.messages.len(), "transcript loaded");
        self.state.replace_messages(transcript.messages);
        self.abandon_request();
        Ok(())
    }

    /// Captures the conversation and selection for saving.
    pub fn transcript(&self) -> Transcript {
        Transcript::new(self.state.messages(), &self.provider, self.model_id.as_deref())
    }

    /// Applies one inbound event.
    ///
    /// Events tagged with a request other than the active one are dropped,
    /// as are untagged response events while no request is in flight.
    /// Returns true if the event changed the conversation.
    pub fn handle_event(&mut self, event: InboundEvent, renderer: &mut dyn Renderer) -> bool {
        let active = self.state.active_request();
        let stale = match (event.request_id, active) {
            (Some(tag), Some(active)) => tag != active,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => !matches!(event.kind, EventKind::SystemMessage(_)),
        };
        if stale {
            SESSION_STALE_EVENTS.click();
            tracing::debug!(tag = ?event.request_id, ?active, "dropping stale event");
            return false;
        }

        let warning_provider = self
            .request_provider
            .clone()
            .unwrap_or_else(|| self.provider.clone());
        let outcome = self
            .assembler
            .apply(&mut self.state, &event.kind, &warning_provider);
        match (outcome, &event.kind) {
            (Assembled::Started(_), EventKind::Streaming(fragment)) => {
                if let Some(sent_at) = self.sent_at.take() {
                    SESSION_FIRST_FRAGMENT.add(sent_at.elapsed().as_secs_f64());
                }
                renderer.print_fragment(&fragment.content);
            }
            (Assembled::Appended(_), EventKind::Streaming(fragment)) => {
                renderer.print_fragment(&fragment.content);
            }
            (Assembled::Completed(_), _) => {
                if !self.warned_this_request && self.state.clear_provider_warning(&warning_provider)
                {
                    tracing::info!(provider = %warning_provider, "provider warning cleared");
                    if warning_provider == self.provider {
                        self.notice = None;
                    }
                }
                tracing::debug!(request = ?active, "response complete");
                renderer.finish_response(self.state.last_metadata());
                self.end_request();
            }
            (Assembled::Failed { reason, partial }, _) => {
                tracing::warn!(request = ?active, %reason, "request failed");
                if partial.is_some() {
                    renderer.finish_response(None);
                }
                renderer.print_error(&reason);
                self.end_request();
            }
            (
                Assembled::Notice {
                    credential_warning: true,
                },
                EventKind::SystemMessage(notice),
            ) => {
                if self.state.is_busy() {
                    self.warned_this_request = true;
                }
                if warning_provider == self.provider {
                    self.notice = Some(notice.content.clone());
                }
                renderer.print_warning(&notice.content);
            }
            (Assembled::Notice { .. }, EventKind::SystemMessage(notice)) => {
                renderer.print_info(&notice.content);
            }
            (outcome, kind) => {
                tracing::error!(?outcome, ?kind, "assembler outcome does not match event");
            }
        }
        true
    }

    /// Applies every event and status change that is already waiting.
    ///
    /// Returns the number of events that changed the conversation.
    pub fn process_pending(&mut self, renderer: &mut dyn Renderer) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.inbound.try_recv() {
            if self.handle_event(event, renderer) {
                applied += 1;
            }
        }
        self.sync_status();
        self.announce_status(renderer);
        applied
    }

    /// Waits for the next inbound event or status change and applies it.
    ///
    /// Returns false once the transport can deliver nothing more.
    pub async fn next_update(&mut self, renderer: &mut dyn Renderer) -> bool {
        let update = tokio::select! {
            event = self.inbound.recv() => Update::Event(event),
            changed = self.status_rx.changed() => Update::Status(changed.is_ok()),
        };
        match update {
            Update::Event(Some(event)) => {
                self.handle_event(event, renderer);
                true
            }
            Update::Event(None) => false,
            Update::Status(alive) => {
                if !alive {
                    return false;
                }
                let link = self.status_rx.borrow_and_update().clone();
                self.apply_link(link);
                self.announce_status(renderer);
                true
            }
        }
    }

    fn dispatch(&mut self, payload: QueryPayload, rollback_len: usize) -> Option<RequestId> {
        self.next_request += 1;
        let request_id = RequestId(self.next_request);
        let payload = payload.with_request_id(request_id);
        let result = serde_json::to_value(&payload)
            .map_err(Error::from)
            .and_then(|value| self.transport.send(CHAT_QUERY_EVENT, value));
        if let Err(err) = result {
            tracing::warn!(error = %err, "query not sent");
            self.state.truncate(rollback_len);
            return None;
        }

        SESSION_REQUESTS.click();
        tracing::info!(
            request = %request_id,
            provider = %payload.provider,
            model = %payload.model_id,
            mode = %self.mode,
            "query sent"
        );
        self.state.begin_request(request_id);
        self.assembler.reset();
        self.request_provider = Some(payload.provider);
        self.sent_at = Some(Instant::now());
        self.warned_this_request = false;
        self.orphaned = false;
        self.request_epoch = self.epoch;
        Some(request_id)
    }

    fn end_request(&mut self) {
        self.request_provider = None;
        self.sent_at = None;
        self.warned_this_request = false;
        self.orphaned = false;
    }

    fn abandon_request(&mut self) {
        self.state.finish_request();
        self.assembler.reset();
        self.end_request();
    }

    fn select_provider(&mut self, provider: Provider) {
        tracing::debug!(from = %self.provider, to = %provider, "provider selected");
        self.model_id = self
            .catalog
            .default_model(&provider)
            .map(|model| model.id.clone());
        self.notice = self.state.provider_warning(&provider).map(str::to_string);
        self.provider = provider;
    }

    fn ensure_idle(&self, action: &str) -> Result<()> {
        if self.state.is_busy() {
            return Err(Error::invalid_state(format!(
                "cannot {action} while a response is streaming"
            )));
        }
        Ok(())
    }

    fn sync_status(&mut self) {
        if self.status_rx.has_changed().unwrap_or(false) {
            let link = self.status_rx.borrow_and_update().clone();
            self.apply_link(link);
        }
    }

    /// A request is orphaned once its connection is gone, including when the
    /// transport already reconnected before this controller looked.
    fn apply_link(&mut self, link: Link) {
        let lost = !link.status.is_connected() || link.epoch != self.request_epoch;
        if self.state.is_busy() && lost && !self.orphaned {
            tracing::warn!(
                request = ?self.state.active_request(),
                status = %link.status,
                epoch = link.epoch,
                "connection lost during request"
            );
            self.orphaned = true;
        }
        self.epoch = link.epoch;
        if &link.status != self.state.connection_status() {
            self.state.set_connection_status(link.status);
        }
    }

    fn announce_status(&mut self, renderer: &mut dyn Renderer) {
        if &self.announced != self.state.connection_status() {
            self.announced = self.state.connection_status().clone();
            renderer.print_status(&self.announced);
        }
    }
}

impl<T: Transport + ?Sized> Drop for SessionController<T> {
    fn drop(&mut self) {
        for (event, h) in self.handlers.drain(..) {
            self.transport.off(event, &h);
        }
    }
}
