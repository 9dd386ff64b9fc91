use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    TRANSPORT_CONNECT_ATTEMPTS, TRANSPORT_CONNECT_FAILURES, TRANSPORT_DISCONNECTS,
    TRANSPORT_FRAMES_RECEIVED, TRANSPORT_FRAMES_SENT, TRANSPORT_MALFORMED_FRAMES,
    TRANSPORT_SEND_REJECTED,
};
use crate::transport::socketio::{
    OpenInfo, Packet, connect_frame, disconnect_frame, event_frame, pong_frame,
};
use crate::transport::{Handler, HandlerRegistry, Link, ReconnectPolicy, Transport};
use crate::types::ConnectionStatus;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time allowed between opening the socket and joining the namespace.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket.IO client over a single WebSocket.
///
/// A background supervisor owns the socket. It performs the Engine.IO
/// handshake, joins the default namespace, answers server pings and treats
/// a silent server as a dropped connection. Failed attempts are retried
/// under the [`ReconnectPolicy`], a dropped live connection is reconnected,
/// and the status becomes `Error` once attempts are exhausted, the server
/// rejects the upgrade with a 4xx response, or the namespace is refused.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    url: Url,
    policy: ReconnectPolicy,
    link_tx: watch::Sender<Link>,
    handlers: HandlerRegistry,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
}

impl WebSocketTransport {
    /// Creates a transport for `url` with the default reconnect policy.
    pub fn new(url: Url) -> Self {
        Self::with_policy(url, ReconnectPolicy::default())
    }

    /// Creates a transport with a custom reconnect policy.
    pub fn with_policy(url: Url, policy: ReconnectPolicy) -> Self {
        let (link_tx, _) = watch::channel(Link::default());
        Self {
            shared: Arc::new(Shared {
                url,
                policy,
                link_tx,
                handlers: HandlerRegistry::new(),
                outbound: Mutex::new(None),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// The endpoint this transport connects to.
    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    fn lock_supervisor(&self) -> MutexGuard<'_, Option<Supervisor>> {
        self.supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(supervisor) = self.lock_supervisor().take() {
            supervisor.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.shared.url.as_str())
            .field("policy", &self.shared.policy)
            .field("link", &*self.shared.link_tx.borrow())
            .finish()
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    fn connect(&self) {
        let mut supervisor = self.lock_supervisor();
        if let Some(running) = supervisor.as_ref()
            && !running.handle.is_finished()
        {
            return;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!(error = %err, "connect called outside an async runtime");
                self.shared
                    .set_status(ConnectionStatus::Error(format!("no async runtime: {err}")));
                return;
            }
        };
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(supervise(Arc::clone(&self.shared), cancel.clone()));
        *supervisor = Some(Supervisor { cancel, handle });
    }

    async fn disconnect(&self) {
        let supervisor = self.lock_supervisor().take();
        if let Some(supervisor) = supervisor {
            supervisor.cancel.cancel();
            if let Err(err) = supervisor.handle.await {
                tracing::warn!(error = %err, "transport supervisor ended abnormally");
            }
        }
        self.shared.set_status(ConnectionStatus::Disconnected);
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.link_tx.borrow().status.clone()
    }

    fn watch_status(&self) -> watch::Receiver<Link> {
        self.shared.link_tx.subscribe()
    }

    fn send(&self, event: &str, payload: Value) -> Result<()> {
        if !self.shared.link_tx.borrow().status.is_connected() {
            TRANSPORT_SEND_REJECTED.click();
            return Err(Error::not_connected(event));
        }
        let text = event_frame(event, &payload)?;
        let outbound = self.shared.lock_outbound();
        let Some(tx) = outbound.as_ref() else {
            TRANSPORT_SEND_REJECTED.click();
            return Err(Error::not_connected(event));
        };
        tx.send(WsMessage::Text(text))
            .map_err(|_| Error::not_connected(event))?;
        TRANSPORT_FRAMES_SENT.click();
        tracing::debug!(event, "frame queued");
        Ok(())
    }

    fn on(&self, event: &str, handler: Handler) {
        self.shared.handlers.register(event, handler);
    }

    fn off(&self, event: &str, handler: &Handler) -> bool {
        self.shared.handlers.unregister(event, handler)
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        tracing::debug!(%status, url = %self.url, "transport status");
        self.link_tx.send_modify(|link| link.transition(status));
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<WsMessage>>> {
        self.outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pumps one live connection until it ends; returns why it ended.
    async fn run_connection(
        &self,
        socket: Socket,
        info: OpenInfo,
        cancel: &CancellationToken,
    ) -> String {
        let (mut write, mut read) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.lock_outbound() = Some(tx);
        self.set_status(ConnectionStatus::Connected);

        let liveness = info.liveness_window();
        let silence = tokio::time::sleep(liveness);
        tokio::pin!(silence);

        let reason = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(err) = write.send(WsMessage::Text(disconnect_frame())).await {
                        tracing::debug!(error = %err, "disconnect packet not delivered");
                    }
                    if let Err(err) = write.send(WsMessage::Close(None)).await {
                        tracing::debug!(error = %err, "close frame not delivered");
                    }
                    break "closed by client".to_string();
                }
                Some(message) = rx.recv() => {
                    if let Err(err) = write.send(message).await {
                        break format!("write failed: {err}");
                    }
                }
                _ = &mut silence => {
                    break format!("no ping from server within {}ms", liveness.as_millis());
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(_))) | None => {
                            break "closed by server".to_string();
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => break format!("read failed: {err}"),
                    };
                    silence.as_mut().reset(tokio::time::Instant::now() + liveness);
                    match self.receive(&text) {
                        Some(Packet::Ping(payload)) => {
                            let pong = WsMessage::Text(pong_frame(&payload));
                            if let Err(err) = write.send(pong).await {
                                break format!("write failed: {err}");
                            }
                        }
                        Some(Packet::Close) => break "closed by server".to_string(),
                        Some(Packet::Disconnect) => break "namespace closed by server".to_string(),
                        Some(Packet::ConnectError(reason)) => {
                            break format!("namespace error: {reason}");
                        }
                        _ => {}
                    }
                }
            }
        };

        *self.lock_outbound() = None;
        reason
    }

    /// Decodes one frame and delivers events; other packets are returned.
    fn receive(&self, text: &str) -> Option<Packet> {
        TRANSPORT_FRAMES_RECEIVED.click();
        match Packet::decode(text) {
            Ok(Packet::Event(envelope)) => {
                let delivered = self.handlers.dispatch(&envelope.event, &envelope.data);
                if delivered == 0 {
                    tracing::trace!(event = %envelope.event, "no handler registered");
                }
                None
            }
            Ok(packet) => {
                tracing::trace!(?packet, "control packet");
                Some(packet)
            }
            Err(err) => {
                TRANSPORT_MALFORMED_FRAMES.click();
                tracing::warn!(error = %err, "dropping malformed frame");
                None
            }
        }
    }
}

async fn supervise(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut failures = 0u32;
    loop {
        shared.set_status(ConnectionStatus::Connecting);
        TRANSPORT_CONNECT_ATTEMPTS.click();
        let attempt = tokio::select! {
            _ = cancel.cancelled() => break,
            attempt = open(&shared.url) => attempt,
        };
        match attempt {
            Ok((socket, info)) => {
                failures = 0;
                tracing::info!(url = %shared.url, sid = %info.sid, "connected");
                let reason = shared.run_connection(socket, info, &cancel).await;
                if cancel.is_cancelled() {
                    break;
                }
                TRANSPORT_DISCONNECTS.click();
                tracing::warn!(%reason, "connection lost; reconnecting");
                shared.set_status(ConnectionStatus::Disconnected);
            }
            Err(err) => {
                TRANSPORT_CONNECT_FAILURES.click();
                if !err.is_retryable() {
                    tracing::error!(error = %err, "handshake rejected");
                    shared.set_status(ConnectionStatus::Error(err.to_string()));
                    return;
                }
                failures += 1;
                if failures >= shared.policy.max_attempts {
                    tracing::error!(attempts = failures, error = %err, "giving up on connection");
                    shared.set_status(ConnectionStatus::Error(format!(
                        "gave up after {failures} attempts: {err}"
                    )));
                    return;
                }
                tracing::debug!(attempt = failures, error = %err, "connect failed; retrying");
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(shared.policy.delay) => {}
        }
    }
    shared.set_status(ConnectionStatus::Disconnected);
}

/// Opens the WebSocket and joins the default namespace.
async fn open(url: &Url) -> Result<(Socket, OpenInfo)> {
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(classify_connect_error)?;
    let info = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut socket))
        .await
        .map_err(|_| Error::connection("socket.io handshake timed out", None))??;
    Ok((socket, info))
}

async fn handshake(socket: &mut Socket) -> Result<OpenInfo> {
    let info = loop {
        match next_packet(socket).await? {
            Packet::Open(info) => break info,
            other => tracing::trace!(?other, "packet before open"),
        }
    };
    socket
        .send(WsMessage::Text(connect_frame()))
        .await
        .map_err(|err| Error::connection(format!("connect packet not sent: {err}"), None))?;
    loop {
        match next_packet(socket).await? {
            Packet::Connect => return Ok(info),
            Packet::ConnectError(reason) => {
                return Err(Error::protocol(format!("namespace refused: {reason}")));
            }
            Packet::Ping(payload) => socket
                .send(WsMessage::Text(pong_frame(&payload)))
                .await
                .map_err(|err| Error::connection(format!("pong not sent: {err}"), None))?,
            other => tracing::trace!(?other, "packet before namespace connect"),
        }
    }
}

async fn next_packet(socket: &mut Socket) -> Result<Packet> {
    loop {
        match socket.next().await {
            Some(Ok(WsMessage::Text(text))) => return Packet::decode(&text),
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(Error::connection("closed during handshake", None));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                return Err(Error::connection(
                    format!("handshake read failed: {err}"),
                    Some(Box::new(err)),
                ));
            }
        }
    }
}

fn classify_connect_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(response) if response.status().is_client_error() => {
            let status = response.status();
            Error::handshake_rejected(
                status.as_u16(),
                status.canonical_reason().unwrap_or("handshake rejected"),
            )
        }
        other => Error::connection(other.to_string(), Some(Box::new(other))),
    }
}
