//! Persistent bidirectional connection to the backend.
//!
//! A transport owns exactly one logical connection. It publishes its
//! [`ConnectionStatus`] through a `watch` channel, together with an epoch
//! that grows with every new connection, dispatches named inbound events to
//! registered handlers in arrival order, and sends named outbound events only
//! while connected. Nothing is queued while disconnected.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::Result;
use crate::types::ConnectionStatus;

mod memory;
pub mod socketio;
mod websocket;

pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;

/// Default number of connection attempts before giving up.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay between connection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// A callback invoked with the payload of a named inbound event.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wraps a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Connection surface the session controller drives.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Starts connecting in the background.
    ///
    /// Idempotent: calling it while connecting or connected does nothing.
    fn connect(&self);

    /// Closes the connection and stops reconnecting.
    async fn disconnect(&self);

    /// Returns the current connection status.
    fn status(&self) -> ConnectionStatus;

    /// Subscribes to connection status transitions.
    ///
    /// The channel only keeps the latest [`Link`]; a drop and reconnect
    /// between two reads shows up as a changed epoch.
    fn watch_status(&self) -> watch::Receiver<Link>;

    /// Sends a named event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`](crate::Error::NotConnected) unless the
    /// status is `Connected`.
    fn send(&self, event: &str, payload: Value) -> Result<()>;

    /// Registers a handler for a named event.
    ///
    /// Registration is additive: the same handler registered twice fires
    /// twice.
    fn on(&self, event: &str, handler: Handler);

    /// Removes one registration of `handler` for `event`.
    ///
    /// Returns false if no such registration exists.
    fn off(&self, event: &str, handler: &Handler) -> bool;
}

/// Connection status and the connection it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    /// Current status.
    pub status: ConnectionStatus,

    /// Number of times the status has become `Connected`.
    pub epoch: u64,
}

impl Link {
    /// Moves to `status`; a fresh connection starts a new epoch.
    pub fn transition(&mut self, status: ConnectionStatus) {
        if status.is_connected() && !self.status.is_connected() {
            self.epoch += 1;
        }
        self.status = status;
    }
}

/// A named event with its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Event name.
    pub event: String,

    /// Event payload.
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Bounded, fixed-delay reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts per connection cycle before the transport gives up.
    pub max_attempts: u32,

    /// Delay between attempts.
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Creates a policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY)
    }
}

/// Named-event handler table shared by transport implementations.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Mutex<Vec<(String, Handler)>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registration.
    pub fn register(&self, event: &str, handler: Handler) {
        self.lock().push((event.to_string(), handler));
    }

    /// Removes the first registration of `handler` under `event`.
    pub fn unregister(&self, event: &str, handler: &Handler) -> bool {
        let mut entries = self.lock();
        let position = entries
            .iter()
            .position(|(name, h)| name == event && Arc::ptr_eq(h, handler));
        match position {
            Some(idx) => {
                entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of registrations for `event`.
    pub fn count(&self, event: &str) -> usize {
        self.lock().iter().filter(|(name, _)| name == event).count()
    }

    /// Invokes every handler registered for `event`, in registration order.
    ///
    /// The table lock is released before handlers run, so a handler may
    /// register or unregister without deadlocking.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<Handler> = self
            .lock()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for h in &handlers {
            h(payload);
        }
        handlers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Handler)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events: Vec<String> = self.lock().iter().map(|(name, _)| name.clone()).collect();
        f.debug_struct("HandlerRegistry")
            .field("events", &events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn double_registration_fires_twice() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let h = counting_handler(Arc::clone(&counter));
        registry.register("chat_response", Arc::clone(&h));
        registry.register("chat_response", Arc::clone(&h));

        assert_eq!(registry.dispatch("chat_response", &json!({})), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn off_removes_one_registration() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let h = counting_handler(Arc::clone(&counter));
        registry.register("chat_response", Arc::clone(&h));
        registry.register("chat_response", Arc::clone(&h));

        assert!(registry.unregister("chat_response", &h));
        assert_eq!(registry.count("chat_response"), 1);
        assert!(registry.unregister("chat_response", &h));
        assert!(!registry.unregister("chat_response", &h));
    }

    #[test]
    fn off_matches_identity_not_behavior() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let a = counting_handler(Arc::clone(&counter));
        let b = counting_handler(Arc::clone(&counter));
        registry.register("system_message", Arc::clone(&a));

        assert!(!registry.unregister("system_message", &b));
        assert!(!registry.unregister("chat_response", &a));
        assert!(registry.unregister("system_message", &a));
    }

    #[test]
    fn dispatch_only_reaches_matching_event() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register("system_message", counting_handler(Arc::clone(&counter)));

        assert_eq!(registry.dispatch("chat_response", &json!({})), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reconnect_starts_new_epoch() {
        let mut link = Link::default();
        assert_eq!(link.epoch, 0);
        link.transition(ConnectionStatus::Connecting);
        link.transition(ConnectionStatus::Connected);
        assert_eq!(link.epoch, 1);
        link.transition(ConnectionStatus::Connected);
        assert_eq!(link.epoch, 1);
        link.transition(ConnectionStatus::Disconnected);
        link.transition(ConnectionStatus::Connected);
        assert_eq!(link.epoch, 2);
        assert_eq!(link.status, ConnectionStatus::Connected);
    }

    #[test]
    fn policy_needs_at_least_one_attempt() {
        let policy = ReconnectPolicy::new(0, Duration::from_millis(5));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(ReconnectPolicy::default().max_attempts, 5);
    }
}
