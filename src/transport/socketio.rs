//! Socket.IO v5 over Engine.IO v4, text frames only.
//!
//! Each WebSocket text frame carries one Engine.IO packet: a single type
//! digit followed by its payload. Socket.IO packets ride inside Engine.IO
//! `message` packets (`4`), again led by a type digit, an optional
//! namespace and an optional ack id, then a JSON payload. Only the default
//! namespace is used.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::Envelope;

/// Path the backend serves Socket.IO on.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Engine.IO protocol revision spoken by this client.
pub const ENGINE_IO_VERSION: &str = "4";

/// Session parameters the server announces in its `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    /// Engine.IO session id.
    pub sid: String,

    /// How often the server pings, in milliseconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,

    /// How long the server waits for a pong, in milliseconds.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

impl OpenInfo {
    /// Longest silence after which the connection is considered dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake.
    Open(OpenInfo),

    /// Engine.IO close.
    Close,

    /// Engine.IO heartbeat from the server; must be answered with a pong.
    Ping(String),

    /// Engine.IO heartbeat answer.
    Pong(String),

    /// Engine.IO no-op.
    Noop,

    /// The namespace connection was accepted.
    Connect,

    /// The namespace connection was refused.
    ConnectError(String),

    /// The server closed the namespace.
    Disconnect,

    /// A named event with its first argument.
    Event(Envelope),

    /// Acks, binary packets and upgrades; not used by this client.
    Ignored(char),
}

impl Packet {
    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for empty frames and unknown packet types,
    /// and a serialization error for payloads that are not valid JSON.
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Err(Error::protocol("empty engine.io frame"));
        };
        let rest = chars.as_str();
        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping(rest.to_string())),
            '3' => Ok(Packet::Pong(rest.to_string())),
            '4' => decode_message(rest),
            '5' => Ok(Packet::Ignored(kind)),
            '6' => Ok(Packet::Noop),
            other => Err(Error::protocol(format!("unknown engine.io packet '{other}'"))),
        }
    }
}

fn decode_message(text: &str) -> Result<Packet> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(Error::protocol("empty socket.io packet"));
    };
    let payload = strip_ack_id(strip_namespace(chars.as_str()));
    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(payload),
        '4' => {
            let reason = serde_json::from_str::<Value>(payload)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| payload.to_string());
            Ok(Packet::ConnectError(reason))
        }
        '3' | '5' | '6' => Ok(Packet::Ignored(kind)),
        other => Err(Error::protocol(format!("unknown socket.io packet '{other}'"))),
    }
}

fn decode_event(payload: &str) -> Result<Packet> {
    let args: Vec<Value> = serde_json::from_str(payload)?;
    let mut args = args.into_iter();
    let Some(Value::String(event)) = args.next() else {
        return Err(Error::protocol("socket.io event without a name"));
    };
    let data = args.next().unwrap_or(Value::Null);
    Ok(Packet::Event(Envelope::new(event, data)))
}

fn strip_namespace(text: &str) -> &str {
    match text.strip_prefix('/') {
        Some(namespaced) => namespaced.split_once(',').map_or("", |(_, rest)| rest),
        None => text,
    }
}

fn strip_ack_id(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Frame that opens the default namespace.
pub fn connect_frame() -> String {
    "40".to_string()
}

/// Frame that leaves the default namespace.
pub fn disconnect_frame() -> String {
    "41".to_string()
}

/// Answer to a server ping.
pub fn pong_frame(payload: &str) -> String {
    format!("3{payload}")
}

/// Frame carrying a named event.
///
/// # Errors
///
/// Returns a serialization error if the payload cannot be encoded.
pub fn event_frame(event: &str, data: &Value) -> Result<String> {
    let args = serde_json::to_string(&(event, data))?;
    Ok(format!("42{args}"))
}

/// The WebSocket endpoint for a backend base URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; `path` replaces the
/// base URL's path and the Engine.IO query is appended.
///
/// # Errors
///
/// Returns a URL error for schemes other than http(s) and ws(s).
pub fn endpoint(server: &Url, path: &str) -> Result<Url> {
    let scheme = match server.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::url(
                format!("unsupported scheme '{other}' for socket endpoint"),
                None,
            ));
        }
    };
    let mut url = server.join(path)?;
    url.set_scheme(scheme)
        .map_err(|()| Error::url(format!("cannot use scheme '{scheme}'"), None))?;
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_open() {
        let frame = concat!(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"#,
            r#""pingInterval":25000,"pingTimeout":5000,"maxPayload":1000000}"#,
        );
        let packet = Packet::decode(frame).unwrap();
        let Packet::Open(info) = packet else {
            panic!("Expected Open, got {packet:?}");
        };
        assert_eq!(info.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(info.liveness_window(), Duration::from_millis(30_000));
    }

    #[test]
    fn decode_heartbeats_and_control() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping(String::new()));
        assert_eq!(Packet::decode("3beat").unwrap(), Packet::Pong("beat".to_string()));
        assert_eq!(Packet::decode("1").unwrap(), Packet::Close);
        assert_eq!(Packet::decode("6").unwrap(), Packet::Noop);
        assert_eq!(Packet::decode(r#"40{"sid":"abc"}"#).unwrap(), Packet::Connect);
        assert_eq!(Packet::decode("41").unwrap(), Packet::Disconnect);
    }

    #[test]
    fn decode_event_with_namespace_and_ack() {
        let frame = r#"42/chat,17["chat_response",{"status":"streaming"}]"#;
        let packet = Packet::decode(frame).unwrap();
        assert_eq!(
            packet,
            Packet::Event(Envelope::new(
                "chat_response",
                json!({"status": "streaming"})
            ))
        );

        let packet = Packet::decode(r#"42["system_message"]"#).unwrap();
        assert_eq!(packet, Packet::Event(Envelope::new("system_message", Value::Null)));
    }

    #[test]
    fn decode_connect_error_reason() {
        assert_eq!(
            Packet::decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::ConnectError("Not authorized".to_string())
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Packet::decode("").unwrap_err().is_protocol());
        assert!(Packet::decode("9").unwrap_err().is_protocol());
        assert!(Packet::decode("42[17]").unwrap_err().is_protocol());
        assert!(Packet::decode("42{not json").is_err());
    }

    #[test]
    fn event_frame_encodes_name_and_payload() {
        let frame = event_frame("chat_query", &json!({"query": "hi"})).unwrap();
        assert_eq!(frame, r#"42["chat_query",{"query":"hi"}]"#);
        assert_eq!(
            Packet::decode(&frame).unwrap(),
            Packet::Event(Envelope::new("chat_query", json!({"query": "hi"})))
        );
        assert_eq!(pong_frame(""), "3");
        assert_eq!(connect_frame(), "40");
        assert_eq!(disconnect_frame(), "41");
    }

    #[test]
    fn endpoint_maps_scheme_and_query() {
        let url = endpoint(&Url::parse("http://localhost:5000").unwrap(), SOCKET_IO_PATH).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        let url = endpoint(
            &Url::parse("https://chat.example.com/app/").unwrap(),
            SOCKET_IO_PATH,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://chat.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert!(endpoint(&Url::parse("ftp://example.com").unwrap(), SOCKET_IO_PATH).is_err());
    }
}
