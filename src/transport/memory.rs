use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::transport::{Envelope, Handler, HandlerRegistry, Link, Transport};
use crate::types::ConnectionStatus;

/// An in-process transport.
///
/// Outbound events are recorded instead of sent, and inbound events are
/// injected with [`MemoryTransport::emit`]. Status transitions are driven
/// explicitly, which makes every connection state reachable on demand.
#[derive(Debug)]
pub struct MemoryTransport {
    link_tx: watch::Sender<Link>,
    handlers: HandlerRegistry,
    sent: Mutex<Vec<Envelope>>,
}

impl MemoryTransport {
    /// Creates a disconnected transport.
    pub fn new() -> Self {
        let (link_tx, _) = watch::channel(Link::default());
        Self {
            link_tx,
            handlers: HandlerRegistry::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Creates a transport that is already connected.
    pub fn connected() -> Self {
        let this = Self::new();
        this.set_status(ConnectionStatus::Connected);
        this
    }

    /// Forces a status transition.
    pub fn set_status(&self, status: ConnectionStatus) {
        tracing::debug!(%status, "memory transport status");
        self.link_tx.send_modify(|link| link.transition(status));
    }

    /// Number of connections established so far.
    pub fn epoch(&self) -> u64 {
        self.link_tx.borrow().epoch
    }

    /// Delivers an inbound event to registered handlers.
    ///
    /// Returns the number of handlers that ran.
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        self.handlers.dispatch(event, &payload)
    }

    /// Returns every envelope sent so far.
    pub fn sent(&self) -> Vec<Envelope> {
        self.lock_sent().clone()
    }

    /// Drains the recorded envelopes.
    pub fn take_sent(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.lock_sent())
    }

    /// Number of registrations for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.count(event)
    }

    fn lock_sent(&self) -> std::sync::MutexGuard<'_, Vec<Envelope>> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    fn connect(&self) {
        if !self.link_tx.borrow().status.is_connected() {
            self.set_status(ConnectionStatus::Connected);
        }
    }

    async fn disconnect(&self) {
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn status(&self) -> ConnectionStatus {
        self.link_tx.borrow().status.clone()
    }

    fn watch_status(&self) -> watch::Receiver<Link> {
        self.link_tx.subscribe()
    }

    fn send(&self, event: &str, payload: Value) -> Result<()> {
        if !self.link_tx.borrow().status.is_connected() {
            return Err(Error::not_connected(event));
        }
        self.lock_sent().push(Envelope::new(event, payload));
        Ok(())
    }

    fn on(&self, event: &str, handler: Handler) {
        self.handlers.register(event, handler);
    }

    fn off(&self, event: &str, handler: &Handler) -> bool {
        self.handlers.unregister(event, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::handler;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn send_requires_connection() {
        let transport = MemoryTransport::new();
        let err = transport.send("chat_query", json!({})).unwrap_err();
        assert!(err.is_not_connected());
        assert!(transport.sent().is_empty());

        transport.connect();
        transport.send("chat_query", json!({"query": "hi"})).unwrap();
        assert_eq!(transport.take_sent().len(), 1);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn status_transitions_are_observable() {
        let transport = MemoryTransport::new();
        let mut rx = transport.watch_status();
        transport.set_status(ConnectionStatus::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, ConnectionStatus::Connecting);
        transport.connect();
        assert_eq!(rx.borrow_and_update().status, ConnectionStatus::Connected);
        transport.set_status(ConnectionStatus::Disconnected);
        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
        transport.connect();
        assert_eq!(rx.borrow_and_update().epoch, 2);
        assert_eq!(transport.epoch(), 2);
    }

    #[test]
    fn emit_reaches_handlers() {
        let transport = MemoryTransport::connected();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let h = handler(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        transport.on("chat_response", Arc::clone(&h));
        assert_eq!(transport.emit("chat_response", json!({})), 1);
        assert!(transport.off("chat_response", &h));
        assert_eq!(transport.emit("chat_response", json!({})), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
