use biometrics::{Collector, Counter, Moments};

pub(crate) static TRANSPORT_CONNECT_ATTEMPTS: Counter =
    Counter::new("ragchat.transport.connect_attempts");
pub(crate) static TRANSPORT_CONNECT_FAILURES: Counter =
    Counter::new("ragchat.transport.connect_failures");
pub(crate) static TRANSPORT_DISCONNECTS: Counter = Counter::new("ragchat.transport.disconnects");
pub(crate) static TRANSPORT_FRAMES_SENT: Counter = Counter::new("ragchat.transport.frames_sent");
pub(crate) static TRANSPORT_FRAMES_RECEIVED: Counter =
    Counter::new("ragchat.transport.frames_received");
pub(crate) static TRANSPORT_MALFORMED_FRAMES: Counter =
    Counter::new("ragchat.transport.malformed_frames");
pub(crate) static TRANSPORT_SEND_REJECTED: Counter =
    Counter::new("ragchat.transport.send_rejected");

pub(crate) static SESSION_REQUESTS: Counter = Counter::new("ragchat.session.requests");
pub(crate) static SESSION_RETRIES: Counter = Counter::new("ragchat.session.retries");
pub(crate) static SESSION_REQUEST_ERRORS: Counter = Counter::new("ragchat.session.request_errors");
pub(crate) static SESSION_STALE_EVENTS: Counter = Counter::new("ragchat.session.stale_events");
pub(crate) static SESSION_FRAGMENTS: Counter = Counter::new("ragchat.session.fragments");
pub(crate) static SESSION_FIRST_FRAGMENT: Moments =
    Moments::new("ragchat.session.first_fragment_seconds");
pub(crate) static SESSION_REPORTED_ELAPSED: Moments =
    Moments::new("ragchat.session.reported_elapsed_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TRANSPORT_CONNECT_ATTEMPTS);
    collector.register_counter(&TRANSPORT_CONNECT_FAILURES);
    collector.register_counter(&TRANSPORT_DISCONNECTS);
    collector.register_counter(&TRANSPORT_FRAMES_SENT);
    collector.register_counter(&TRANSPORT_FRAMES_RECEIVED);
    collector.register_counter(&TRANSPORT_MALFORMED_FRAMES);
    collector.register_counter(&TRANSPORT_SEND_REJECTED);

    collector.register_counter(&SESSION_REQUESTS);
    collector.register_counter(&SESSION_RETRIES);
    collector.register_counter(&SESSION_REQUEST_ERRORS);
    collector.register_counter(&SESSION_STALE_EVENTS);
    collector.register_counter(&SESSION_FRAGMENTS);
    collector.register_moments(&SESSION_FIRST_FRAGMENT);
    collector.register_moments(&SESSION_REPORTED_ELAPSED);
}
