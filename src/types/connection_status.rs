use std::fmt;

/// Lifecycle of the backend connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,

    /// A connection attempt (initial or reconnect) is in progress.
    Connecting,

    /// The connection is open; sends are accepted.
    Connected,

    /// Retries were exhausted or the server rejected the handshake.
    Error(String),
}

impl ConnectionStatus {
    /// Returns true if sends are accepted.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Returns true if the transport gave up.
    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionStatus::Error(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}
