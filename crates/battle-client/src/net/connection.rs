use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use battle_core::protocol::{ClientMessage, ServerMessage};

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Match service WebSocket URL, e.g. `wss://match.codebattle.dev`.
    pub server_url: String,
    pub token: String,
    pub max_reconnect_attempts: u32,
    pub base_backoff: Duration,
}

impl ConnectionConfig {
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: token.into(),
            max_reconnect_attempts: 5,
            base_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Reconnecting,
    /// Reconnection attempts are exhausted; the manager has stopped retrying.
    Offline,
}

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    Message(ServerMessage),
}

/// Handle to the single persistent duplex connection to the match service.
///
/// A supervisor task owns the socket. On unexpected disconnect it reconnects
/// with exponential backoff and re-authenticates; it never replays in-flight
/// requests, so callers must re-query authoritative state after a reconnect.
pub struct Connection {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: broadcast::Sender<ConnectionEvent>,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: Arc<Notify>,
}

impl Connection {
    /// Establish the connection and authenticate. Fails if the initial
    /// connect fails; reconnection only covers later drops.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let initial = connect_ws(&config).await?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Online);
        let shutdown = Arc::new(Notify::new());

        let supervisor = Supervisor {
            config,
            outbound: outbound_rx,
            events: events_tx.clone(),
            status: status_tx,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(supervisor.run(initial));

        Ok(Self {
            outbound: outbound_tx,
            events: events_tx,
            status: status_rx,
            shutdown,
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.status.borrow() == ConnectionStatus::Online
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Subscribe to connection status changes and inbound server messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Send a message to the match service. Dropped (and logged) when the
    /// connection is not online.
    pub fn emit(&self, msg: ClientMessage) {
        if !self.is_connected() {
            warn!(message = ?msg, "dropping outbound message: connection not online");
            return;
        }
        if self.outbound.send(msg).is_err() {
            warn!("dropping outbound message: connection task has exited");
        }
    }

    /// Close the connection deliberately. No reconnection afterwards.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

struct Supervisor {
    config: ConnectionConfig,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    events: broadcast::Sender<ConnectionEvent>,
    status: watch::Sender<ConnectionStatus>,
    shutdown: Arc<Notify>,
}

enum PumpExit {
    Closed,
    Dropped,
}

impl Supervisor {
    fn set_status(&self, status: ConnectionStatus) {
        let _ = self.status.send(status);
        let _ = self.events.send(ConnectionEvent::Status(status));
    }

    async fn run(mut self, initial: WsStream) {
        let mut stream = Some(initial);
        let mut attempts = 0u32;

        loop {
            let ws = match stream.take() {
                Some(ws) => ws,
                None => {
                    attempts += 1;
                    if attempts > self.config.max_reconnect_attempts {
                        warn!(
                            attempts = attempts - 1,
                            "reconnect attempts exhausted, staying offline"
                        );
                        self.set_status(ConnectionStatus::Offline);
                        return;
                    }
                    let backoff = self.config.base_backoff * 2u32.saturating_pow(attempts - 1);
                    info!(attempt = attempts, ?backoff, "reconnecting to match service");
                    tokio::select! {
                        _ = self.shutdown.notified() => {
                            self.set_status(ConnectionStatus::Offline);
                            return;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    match connect_ws(&self.config).await {
                        Ok(ws) => ws,
                        Err(e) => {
                            warn!(error = %e, "reconnect failed");
                            continue;
                        }
                    }
                }
            };

            let (mut sink, mut source) = ws.split();

            // Re-authenticate on every (re)connect. In-flight requests are
            // not replayed.
            let auth = ClientMessage::Auth {
                token: self.config.token.clone(),
            };
            let json = match serde_json::to_string(&auth) {
                Ok(j) => j,
                Err(e) => {
                    warn!(error = %e, "auth message failed to serialize");
                    self.set_status(ConnectionStatus::Offline);
                    return;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                self.set_status(ConnectionStatus::Reconnecting);
                continue;
            }

            attempts = 0;
            self.set_status(ConnectionStatus::Online);

            match self.pump(&mut sink, &mut source).await {
                PumpExit::Closed => {
                    info!("connection closed");
                    self.set_status(ConnectionStatus::Offline);
                    return;
                }
                PumpExit::Dropped => {
                    self.set_status(ConnectionStatus::Reconnecting);
                }
            }
        }
    }

    /// Forward outbound messages and publish inbound ones until the socket
    /// drops or a deliberate close is requested.
    async fn pump(
        &mut self,
        sink: &mut SplitSink<WsStream, Message>,
        source: &mut SplitStream<WsStream>,
    ) -> PumpExit {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Closed;
                }
                maybe = self.outbound.recv() => {
                    match maybe {
                        Some(msg) => {
                            let json = match serde_json::to_string(&msg) {
                                Ok(j) => j,
                                Err(e) => {
                                    warn!(error = %e, "unserializable outbound message dropped");
                                    continue;
                                }
                            };
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                return PumpExit::Dropped;
                            }
                        }
                        // Every Connection handle is gone.
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            return PumpExit::Closed;
                        }
                    }
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(msg) => {
                                    let _ = self.events.send(ConnectionEvent::Message(msg));
                                }
                                Err(e) => {
                                    warn!(error = %e, "unparseable server message dropped");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return PumpExit::Dropped,
                        Some(Err(e)) => {
                            warn!(error = %e, "websocket error");
                            return PumpExit::Dropped;
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

async fn connect_ws(config: &ConnectionConfig) -> Result<WsStream, ClientError> {
    let url = format!("{}/ws?token={}", config.server_url, config.token);

    // Empty ALPN = HTTP/1.1 only; proxies that negotiate HTTP/2 break the
    // WebSocket upgrade.
    let connector = if url.starts_with("wss://") {
        let roots =
            rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Some(tokio_tungstenite::Connector::Rustls(Arc::new(tls)))
    } else {
        None
    };

    let (stream, _) =
        tokio_tungstenite::connect_async_tls_with_config(&url, None, false, connector).await?;
    Ok(stream)
}
