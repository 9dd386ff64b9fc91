//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;
use url::Url;

use crate::catalog::catalog_url;
use crate::error::{Error, Result};
use crate::transport::socketio::{SOCKET_IO_PATH, endpoint};
use crate::transport::{DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, ReconnectPolicy};
use crate::types::{Provider, RetrievalMode};

/// Default backend base URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Default path of the Socket.IO endpoint on the backend.
pub const DEFAULT_SOCKET_PATH: &str = SOCKET_IO_PATH;

/// Command-line arguments for the ragchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend base URL.
    #[arrrg(optional, "Backend URL (default: http://localhost:5000)", "URL")]
    pub server: Option<String>,

    /// Path of the Socket.IO endpoint.
    #[arrrg(optional, "Socket.IO path on the backend (default: /socket.io/)", "PATH")]
    pub socket_path: Option<String>,

    /// Provider to start with.
    #[arrrg(optional, "Provider to use (default: groq)", "PROVIDER")]
    pub provider: Option<String>,

    /// Model to start with.
    #[arrrg(optional, "Model to use (default: the provider's first model)", "MODEL")]
    pub model: Option<String>,

    /// Retrieval mode to start with.
    #[arrrg(optional, "Retrieval mode: llm, rag, or web (default: llm)", "MODE")]
    pub mode: Option<String>,

    /// Connection attempts before giving up.
    #[arrrg(optional, "Connection attempts before giving up (default: 5)", "COUNT")]
    pub reconnect_attempts: Option<u32>,

    /// Delay between connection attempts.
    #[arrrg(optional, "Delay between connection attempts in ms (default: 1000)", "MILLIS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Backend base URL, used for the catalog and to derive the socket URL.
    pub server_url: String,

    /// Path of the Socket.IO endpoint.
    pub socket_path: String,

    /// Provider selected at startup.
    pub provider: Provider,

    /// Model selected at startup; `None` means the provider's default.
    pub model: Option<String>,

    /// Retrieval mode selected at startup.
    pub mode: RetrievalMode,

    /// Connection attempts before the transport gives up.
    pub reconnect_attempts: u32,

    /// Delay between connection attempts.
    pub reconnect_delay: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Server: http://localhost:5000
    /// - Socket path: /socket.io/
    /// - Provider: groq, with its first catalog model
    /// - Mode: LLM only
    /// - Reconnect: 5 attempts, 1000 ms apart
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            provider: Provider::default(),
            model: None,
            mode: RetrievalMode::default(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            use_color: true,
        }
    }

    /// Sets the backend base URL.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Sets the Socket.IO path.
    pub fn with_socket_path(mut self, socket_path: impl Into<String>) -> Self {
        self.socket_path = socket_path.into();
        self
    }

    /// Sets the startup provider.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the startup model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Sets the startup retrieval mode.
    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the reconnect policy parameters.
    pub fn with_reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_delay = delay;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The parsed backend base URL.
    pub fn server(&self) -> Result<Url> {
        let url = Url::parse(&self.server_url)?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(url),
            other => Err(Error::url(
                format!("unsupported scheme '{other}' in {}", self.server_url),
                None,
            )),
        }
    }

    /// The Socket.IO WebSocket endpoint, `ws` for `http` servers and `wss`
    /// for `https`.
    pub fn socket_url(&self) -> Result<Url> {
        endpoint(&self.server()?, &self.socket_path)
    }

    /// The model catalog endpoint.
    pub fn catalog_url(&self) -> Result<Url> {
        let mut url = self.server()?;
        match url.scheme() {
            "wss" => url
                .set_scheme("https")
                .map_err(|()| Error::url("cannot use scheme https", None))?,
            "ws" => url
                .set_scheme("http")
                .map_err(|()| Error::url("cannot use scheme http", None))?,
            _ => {}
        }
        catalog_url(&url)
    }

    /// The reconnect policy for the transport.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_attempts, self.reconnect_delay)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mode = match args.mode {
            Some(mode) => mode
                .parse::<RetrievalMode>()
                .map_err(|message| Error::validation(message, Some("mode".to_string())))?,
            None => RetrievalMode::default(),
        };
        let defaults = ChatConfig::new();
        Ok(ChatConfig {
            server_url: args.server.unwrap_or(defaults.server_url),
            socket_path: args.socket_path.unwrap_or(defaults.socket_path),
            provider: args
                .provider
                .map(|p| Provider::from(p.as_str()))
                .unwrap_or(defaults.provider),
            model: args.model,
            mode,
            reconnect_attempts: args
                .reconnect_attempts
                .unwrap_or(defaults.reconnect_attempts),
            reconnect_delay: args
                .reconnect_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_delay),
            use_color: !args.no_color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.server_url, "http://localhost:5000");
        assert_eq!(config.provider, Provider::from("groq"));
        assert!(config.model.is_none());
        assert_eq!(config.mode, RetrievalMode::LlmOnly);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            server: Some("https://chat.example.com".to_string()),
            socket_path: Some("/rt/socket.io/".to_string()),
            provider: Some("Anthropic".to_string()),
            model: Some("claude-3-opus-latest".to_string()),
            mode: Some("web".to_string()),
            reconnect_attempts: Some(3),
            reconnect_delay_ms: Some(250),
            no_color: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.provider, Provider::from("anthropic"));
        assert_eq!(config.model.as_deref(), Some("claude-3-opus-latest"));
        assert_eq!(config.mode, RetrievalMode::RetrievalWithWeb);
        assert_eq!(
            config.reconnect_policy(),
            ReconnectPolicy::new(3, Duration::from_millis(250))
        );
        assert!(!config.use_color);
        assert_eq!(
            config.socket_url().unwrap().as_str(),
            "wss://chat.example.com/rt/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn bad_mode_is_rejected() {
        let args = ChatArgs {
            mode: Some("turbo".to_string()),
            ..ChatArgs::default()
        };
        let err = ChatConfig::try_from(args).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn derived_urls() {
        let config = ChatConfig::new();
        assert_eq!(
            config.socket_url().unwrap().as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            config.catalog_url().unwrap().as_str(),
            "http://localhost:5000/api/chat/models"
        );

        let ws = ChatConfig::new().with_server_url("ws://10.0.0.2:8080");
        assert_eq!(
            ws.catalog_url().unwrap().as_str(),
            "http://10.0.0.2:8080/api/chat/models"
        );
        assert!(ChatConfig::new().with_server_url("ftp://x").server().is_err());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_server_url("http://127.0.0.1:9000")
            .with_socket_path("/chat")
            .with_provider(Provider::from("mistral"))
            .with_model(Some("mistral-small-latest".to_string()))
            .with_mode(RetrievalMode::Retrieval)
            .with_reconnect(2, Duration::from_millis(10))
            .without_color();

        assert_eq!(config.server_url, "http://127.0.0.1:9000");
        assert_eq!(config.socket_path, "/chat");
        assert_eq!(config.provider, Provider::from("mistral"));
        assert_eq!(config.model.as_deref(), Some("mistral-small-latest"));
        assert_eq!(config.mode, RetrievalMode::Retrieval);
        assert_eq!(config.reconnect_attempts, 2);
        assert!(!config.use_color);
    }
}
