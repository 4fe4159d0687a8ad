//! Host-side WebSocket endpoint.
//!
//! Architecture:
//! ```text
//! remote ──ws──► connection task ──HostEvent──► runtime (single writer)
//!   ▲                 │  ▲                             │
//!   │            ping │  │ outbound text               │ Outbound
//!   │            pong ▼  │                             ▼
//!   └────────────── ws sink ◄──────── PeerSlot ◄───────┘
//! ```
//!
//! Connection tasks never touch the document. They decode frames, answer
//! heartbeats themselves and hand everything else to the runtime as
//! [`HostEvent`]s. At most one peer is current: a newly accepted connection
//! takes over the [`PeerSlot`], which drops the previous connection's
//! outbound channel and makes that task close its socket.
//!
//! The runtime never waits on a peer. Outbound frames are queued with
//! `try_send`; a peer whose queue is full is dropped from the slot, and a
//! socket write that stalls past `send_timeout` ends the connection.
//!
//! Reference: Kleppmann, Designing Data-Intensive Applications, Chapter 8

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

use crate::protocol::{self, Frame, Message, ProtocolError};

/// Identifies one accepted connection.
pub type ConnectionId = Uuid;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Name sent to the remote in `welcome`
    pub device_name: String,
    /// Outbound frame buffer per connection
    pub outbound_capacity: usize,
    /// Capacity of the host event channel
    pub event_capacity: usize,
    /// Longest a single socket write may take before the peer is dropped
    pub send_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            device_name: "NoteBridge Host".to_string(),
            outbound_capacity: 256,
            event_capacity: 1024,
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub frames_sent: u64,
}

/// What the transport hands to the serialized processing path.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PeerConnected {
        connection_id: ConnectionId,
        peer_name: String,
    },
    Remote {
        connection_id: ConnectionId,
        message: Message,
    },
    PeerDisconnected {
        connection_id: ConnectionId,
    },
}

struct PeerLink {
    connection_id: ConnectionId,
    tx: mpsc::Sender<String>,
}

/// The single "send to current peer" channel.
#[derive(Clone, Default)]
pub struct PeerSlot {
    inner: Arc<Mutex<Option<PeerLink>>>,
}

impl PeerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connection_id` the current peer. Returns the id it replaced.
    async fn install(&self, connection_id: ConnectionId, tx: mpsc::Sender<String>) -> Option<ConnectionId> {
        let mut slot = self.inner.lock().await;
        slot.replace(PeerLink { connection_id, tx })
            .map(|old| old.connection_id)
    }

    /// Clear the slot if it still belongs to `connection_id`.
    async fn release(&self, connection_id: ConnectionId) -> bool {
        let mut slot = self.inner.lock().await;
        if slot.as_ref().is_some_and(|link| link.connection_id == connection_id) {
            *slot = None;
            return true;
        }
        false
    }

    /// Current peer, if any.
    pub async fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.lock().await.as_ref().map(|link| link.connection_id)
    }

    /// Queue `message` for `connection_id` if it is still the current peer.
    ///
    /// Never waits for the peer. If its queue is full the peer is lagging:
    /// it is removed from the slot, which closes its connection.
    ///
    /// Returns `Ok(false)` when the frame was not queued.
    pub async fn send_to(&self, connection_id: ConnectionId, message: &Message) -> Result<bool, ProtocolError> {
        let text = message.encode()?;
        let mut slot = self.inner.lock().await;
        let link = match slot.as_ref() {
            Some(link) if link.connection_id == connection_id => link,
            _ => {
                log::trace!("Dropping {} for stale connection {connection_id}", message.kind());
                return Ok(false);
            }
        };
        match link.tx.try_send(text) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                log::warn!(
                    "Peer {connection_id} is not keeping up, dropping {} and disconnecting",
                    message.kind()
                );
                *slot = None;
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Ok(false),
        }
    }
}

/// The host's WebSocket server.
pub struct SyncServer {
    config: ServerConfig,
    events: mpsc::Sender<HostEvent>,
    peer: PeerSlot,
    stats: Arc<RwLock<ServerStats>>,
}

impl SyncServer {
    /// Create a server that reports into `events`.
    pub fn new(config: ServerConfig, events: mpsc::Sender<HostEvent>) -> Self {
        Self {
            config,
            events,
            peer: PeerSlot::new(),
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    /// Handle used by the runtime to reach the current peer.
    pub fn peer_slot(&self) -> PeerSlot {
        self.peer.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    /// Bind and accept connections until the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Sync server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let config = self.config.clone();
            let events = self.events.clone();
            let peer = self.peer.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, config, events, peer, stats).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        config: ServerConfig,
        events: mpsc::Sender<HostEvent>,
        peer: PeerSlot,
        stats: Arc<RwLock<ServerStats>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // Welcome goes out before the peer is visible to the runtime, so it
        // always precedes the first page_state.
        let welcome = Message::welcome(&config.device_name).encode()?;
        tokio::time::timeout(config.send_timeout, ws_sender.send(WsMessage::Text(welcome.into()))).await??;

        let connection_id = Uuid::new_v4();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(config.outbound_capacity);
        if let Some(previous) = peer.install(connection_id, out_tx).await {
            log::info!("Connection {connection_id} from {addr} supersedes {previous}");
        } else {
            log::info!("Remote connected from {addr} ({connection_id})");
        }

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let connected = HostEvent::PeerConnected {
            connection_id,
            peer_name: addr.to_string(),
        };
        if events.send(connected).await.is_err() {
            log::warn!("Host runtime is gone, closing {addr}");
            peer.release(connection_id).await;
            return Ok(());
        }

        loop {
            tokio::select! {
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            stats.write().await.frames_received += 1;
                            match protocol::decode(text.as_str()) {
                                Ok(Frame::Message(Message::Ping { timestamp })) => {
                                    let pong = match (Message::Pong { timestamp }).encode() {
                                        Ok(pong) => pong,
                                        Err(e) => {
                                            log::error!("Failed to encode pong: {e}");
                                            continue;
                                        }
                                    };
                                    let sent = tokio::time::timeout(
                                        config.send_timeout,
                                        ws_sender.send(WsMessage::Text(pong.into())),
                                    )
                                    .await;
                                    if !matches!(sent, Ok(Ok(()))) {
                                        log::warn!("Pong to {addr} failed or stalled");
                                        break;
                                    }
                                    stats.write().await.frames_sent += 1;
                                }
                                Ok(Frame::Message(message)) => {
                                    log::trace!("{} from {addr}", message.kind());
                                    let event = HostEvent::Remote { connection_id, message };
                                    if events.send(event).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(Frame::Unknown(kind)) => {
                                    log::debug!("Ignoring unknown message type {kind:?} from {addr}");
                                }
                                Err(e) => {
                                    stats.write().await.frames_dropped += 1;
                                    log::warn!("Dropping malformed frame from {addr}: {e}");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Binary(data))) => {
                            stats.write().await.frames_dropped += 1;
                            log::warn!("Dropping {}-byte binary frame from {addr}", data.len());
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::warn!("WebSocket error from {addr}: {e}");
                            break;
                        }
                    }
                }

                outgoing = out_rx.recv() => {
                    match outgoing {
                        Some(text) => {
                            let sent = tokio::time::timeout(
                                config.send_timeout,
                                ws_sender.send(WsMessage::Text(text.into())),
                            )
                            .await;
                            match sent {
                                Ok(Ok(())) => stats.write().await.frames_sent += 1,
                                Ok(Err(e)) => {
                                    log::warn!("Send to {addr} failed: {e}");
                                    break;
                                }
                                Err(_) => {
                                    log::warn!("Send to {addr} stalled, closing");
                                    break;
                                }
                            }
                        }
                        None => {
                            // Slot taken by a newer connection, or the peer lagged
                            let close = ws_sender.send(WsMessage::Close(None));
                            let _ = tokio::time::timeout(config.send_timeout, close).await;
                            break;
                        }
                    }
                }
            }
        }

        peer.release(connection_id).await;
        stats.write().await.active_connections -= 1;
        let _ = events.send(HostEvent::PeerDisconnected { connection_id }).await;
        log::info!("Remote {addr} disconnected ({connection_id})");
        Ok(())
    }
}
