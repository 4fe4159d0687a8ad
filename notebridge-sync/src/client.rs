//! Remote-side WebSocket client: the input device's end of the link.
//!
//! Provides:
//! - Connect with a bounded handshake timeout and one fallback attempt
//! - Heartbeat pings and latency tracking
//! - Point batching for strokes (`stroke_update` every N points)
//! - A transient preview of the strokes drawn on the current page
//!
//! All connection state sits behind one lock together with an epoch
//! counter. Every background task captures the epoch it was spawned for and
//! re-checks it under the lock before acting, so once `disconnect` bumps the
//! epoch nothing from the old link is processed.
//!
//! Reference: Kleppmann, Chapter 8, The Trouble with Distributed Systems

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use notebridge_core::{Point, Stroke, StrokeId, StrokeStyle};

use crate::discovery::ConnectTarget;
use crate::protocol::{self, now_ms, Frame, Message, ProtocolError, PROTOCOL_VERSION};
use crate::session::{Session, SessionError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on connect + welcome, per attempt
    pub connect_timeout: Duration,
    /// Time between pings while connected
    pub heartbeat_interval: Duration,
    /// Points per `stroke_update`
    pub batch_size: usize,
    pub event_capacity: usize,
    pub outbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(5),
            batch_size: 4,
            event_capacity: 256,
            outbound_capacity: 256,
        }
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Handshake completed
    Connected { peer_name: String },
    /// Link closed, by either side
    Disconnected,
    /// New round-trip sample in milliseconds
    Latency(f64),
    /// Host reported its page cursor
    PageState { current_page: usize, page_count: usize },
    /// The host moved to another page; the preview was emptied
    PreviewCleared,
}

/// Client errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    NotConnected,
    Session(SessionError),
    Timeout,
    ConnectionFailed(String),
    Handshake(String),
    /// `disconnect` was called while connecting
    Cancelled,
    Protocol(ProtocolError),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected"),
            Self::Session(e) => write!(f, "{e}"),
            Self::Timeout => write!(f, "Connection timeout"),
            Self::ConnectionFailed(e) => write!(f, "Connection failed: {e}"),
            Self::Handshake(e) => write!(f, "Handshake failed: {e}"),
            Self::Cancelled => write!(f, "Connection attempt cancelled"),
            Self::Protocol(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<SessionError> for ClientError {
    fn from(e: SessionError) -> Self {
        ClientError::Session(e)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        ClientError::Protocol(e)
    }
}

struct Link {
    tx: mpsc::Sender<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    fn abort(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[derive(Default)]
struct LinkState {
    session: Session,
    link: Option<Link>,
    /// Bumped on every connect attempt and every disconnect
    epoch: u64,
}

impl LinkState {
    /// Tear down if `epoch` is still current. Returns whether anything changed.
    fn teardown(&mut self, epoch: u64) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.epoch += 1;
        if let Some(link) = self.link.take() {
            link.abort();
        }
        self.session.disconnect()
    }
}

struct OpenStroke {
    stroke_id: StrokeId,
    style: StrokeStyle,
    pending: Vec<Point>,
}

/// Shared by the client and its reader task.
#[derive(Clone)]
struct Shared {
    state: Arc<RwLock<LinkState>>,
    preview: Arc<Mutex<Vec<Stroke>>>,
    event_tx: mpsc::Sender<ClientEvent>,
}

impl Shared {
    fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::warn!("Client event dropped: {e}");
        }
    }
}

/// The remote device's connection to the host.
pub struct RemoteClient {
    config: ClientConfig,
    shared: Shared,
    stroke: Mutex<Option<OpenStroke>>,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
}

impl RemoteClient {
    pub fn new(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        Self {
            config,
            shared: Shared {
                state: Arc::new(RwLock::new(LinkState::default())),
                preview: Arc::new(Mutex::new(Vec::new())),
                event_tx,
            },
            stroke: Mutex::new(None),
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    pub async fn session(&self) -> Session {
        self.shared.state.read().await.session.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.state.read().await.session.is_connected()
    }

    /// Strokes drawn on the current page since the last page change.
    pub async fn preview(&self) -> Vec<Stroke> {
        self.shared.preview.lock().await.clone()
    }

    // ───────────────────────────────────────────────────────────────
    // Connection lifecycle
    // ───────────────────────────────────────────────────────────────

    /// Connect to `target.primary`, then once to the fallback if that fails.
    pub async fn connect(&self, target: &ConnectTarget) -> Result<(), ClientError> {
        let epoch = {
            let mut state = self.shared.state.write().await;
            state.session.begin_connect()?;
            state.epoch += 1;
            state.epoch
        };

        let mut result = self.attempt(&target.primary, epoch).await;
        if result.is_err() && !self.is_current(epoch).await {
            // disconnect() ran while the primary was pending
            log::info!("Connect to {} cancelled", target.primary);
            return Err(ClientError::Cancelled);
        }
        if let Some(fallback) = target.fallback() {
            let retry = match &result {
                Ok(()) | Err(ClientError::Cancelled) => false,
                Err(e) => {
                    log::warn!("Connect to {} failed ({e}), trying {fallback}", target.primary);
                    true
                }
            };
            if retry {
                result = self.attempt(fallback, epoch).await;
            }
        }

        if let Err(e) = &result {
            log::warn!("Giving up connecting: {e}");
            let mut state = self.shared.state.write().await;
            if state.epoch == epoch {
                state.session.disconnect();
            }
        }
        result
    }

    async fn is_current(&self, epoch: u64) -> bool {
        self.shared.state.read().await.epoch == epoch
    }

    /// Connect to a single URL with no fallback.
    pub async fn connect_url(&self, url: &str) -> Result<(), ClientError> {
        self.connect(&ConnectTarget::direct(url)).await
    }

    async fn attempt(&self, url: &str, epoch: u64) -> Result<(), ClientError> {
        log::info!("Connecting to {url}");
        let (writer, reader, peer_name) =
            tokio::time::timeout(self.config.connect_timeout, Self::handshake(url))
                .await
                .map_err(|_| ClientError::Timeout)??;

        let mut state = self.shared.state.write().await;
        if state.epoch != epoch || !state.session.is_connecting() {
            log::info!("Connect to {url} finished after disconnect, dropping it");
            return Err(ClientError::Cancelled);
        }
        state.session.handshake(peer_name.clone())?;

        // Spawned under the lock so a failing reader can't tear down before
        // the link is recorded.
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        let tasks = vec![
            tokio::spawn(write_loop(writer, rx)),
            tokio::spawn(heartbeat_loop(
                self.shared.clone(),
                tx.clone(),
                epoch,
                self.config.heartbeat_interval,
            )),
            tokio::spawn(read_loop(self.shared.clone(), reader, epoch)),
        ];
        state.link = Some(Link { tx, tasks });

        log::info!("Connected to {peer_name} at {url}");
        // Emitted before the reader can take the lock and report page_state
        self.shared.emit(ClientEvent::Connected { peer_name });
        Ok(())
    }

    /// Open the socket and wait for `welcome`.
    async fn handshake(
        url: &str,
    ) -> Result<(SplitSink<WsStream, WsMessage>, SplitStream<WsStream>, String), ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        let (writer, mut reader) = ws.split();

        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => match protocol::decode(text.as_str()) {
                    Ok(Frame::Message(Message::Welcome {
                        device_name,
                        protocol_version,
                        ..
                    })) => {
                        if protocol_version != PROTOCOL_VERSION {
                            log::warn!(
                                "Host speaks protocol {protocol_version}, we speak {PROTOCOL_VERSION}"
                            );
                        }
                        return Ok((writer, reader, device_name));
                    }
                    Ok(other) => log::debug!("Ignoring {other:?} before welcome"),
                    Err(e) => log::warn!("Dropping malformed frame before welcome: {e}"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(ClientError::Handshake("closed before welcome".into()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ClientError::ConnectionFailed(e.to_string())),
            }
        }
    }

    /// Close the link. Also cancels a connect in progress.
    pub async fn disconnect(&self) {
        let changed = {
            let mut state = self.shared.state.write().await;
            let epoch = state.epoch;
            state.teardown(epoch)
        };
        *self.stroke.lock().await = None;
        if changed {
            log::info!("Disconnected");
            self.shared.emit(ClientEvent::Disconnected);
        }
    }

    async fn send(&self, message: Message) -> Result<(), ClientError> {
        let tx = {
            let state = self.shared.state.read().await;
            match (&state.link, state.session.is_connected()) {
                (Some(link), true) => link.tx.clone(),
                _ => return Err(ClientError::NotConnected),
            }
        };
        tx.send(message.encode()?)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    // ───────────────────────────────────────────────────────────────
    // Ink
    // ───────────────────────────────────────────────────────────────

    /// Pen down. Closes any stroke left open and returns the new stroke's id.
    pub async fn begin_stroke(&self, style: StrokeStyle, point: Point) -> Result<StrokeId, ClientError> {
        if !self.is_connected().await {
            return Err(ClientError::NotConnected);
        }
        if self.stroke.lock().await.is_some() {
            self.end_stroke().await?;
        }

        let stroke_id = StrokeId::generate();
        let mut stroke = Stroke::new(stroke_id.clone(), style.clone());
        stroke.points.push(point);
        self.shared.preview.lock().await.push(stroke);

        *self.stroke.lock().await = Some(OpenStroke {
            stroke_id: stroke_id.clone(),
            style,
            pending: vec![point],
        });
        self.flush_if_full().await?;
        Ok(stroke_id)
    }

    /// Pen move.
    pub async fn add_point(&self, point: Point) -> Result<(), ClientError> {
        {
            let mut open = self.stroke.lock().await;
            let stroke = open.as_mut().ok_or(ClientError::NotConnected)?;
            stroke.pending.push(point);

            let mut preview = self.shared.preview.lock().await;
            if let Some(p) = preview.iter_mut().rev().find(|s| s.id == stroke.stroke_id) {
                p.points.push(point);
            }
        }
        self.flush_if_full().await
    }

    /// Pen up. Sends the remaining points, then `stroke_complete`.
    pub async fn end_stroke(&self) -> Result<Option<StrokeId>, ClientError> {
        let Some(stroke) = self.stroke.lock().await.take() else {
            return Ok(None);
        };
        if !stroke.pending.is_empty() {
            self.send(update_message(&stroke, stroke.pending.clone())).await?;
        }
        self.send(Message::StrokeComplete {
            stroke_id: stroke.stroke_id.clone(),
        })
        .await?;
        Ok(Some(stroke.stroke_id))
    }

    async fn flush_if_full(&self) -> Result<(), ClientError> {
        let message = {
            let mut open = self.stroke.lock().await;
            match open.as_mut() {
                Some(stroke) if stroke.pending.len() >= self.config.batch_size => {
                    let batch = std::mem::take(&mut stroke.pending);
                    update_message(stroke, batch)
                }
                _ => return Ok(()),
            }
        };
        self.send(message).await
    }

    // ───────────────────────────────────────────────────────────────
    // Commands
    // ───────────────────────────────────────────────────────────────

    pub async fn undo(&self) -> Result<(), ClientError> {
        self.send(Message::Undo).await
    }

    pub async fn redo(&self) -> Result<(), ClientError> {
        self.send(Message::Redo).await
    }

    pub async fn erase_at(&self, x: f64, y: f64) -> Result<(), ClientError> {
        self.send(Message::EraseAt { x, y }).await
    }

    pub async fn switch_page(&self, page: usize) -> Result<(), ClientError> {
        self.send(Message::PageSwitch { page }).await
    }

    pub async fn add_page(&self) -> Result<(), ClientError> {
        self.send(Message::PageAdd).await
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.send(Message::ping()).await
    }
}

impl Drop for RemoteClient {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.try_write() {
            if let Some(link) = state.link.take() {
                link.abort();
            }
        }
    }
}

fn update_message(stroke: &OpenStroke, points: Vec<Point>) -> Message {
    Message::StrokeUpdate {
        stroke_id: stroke.stroke_id.clone(),
        points,
        color: stroke.style.color.clone(),
        width: stroke.style.width,
        tool: stroke.style.tool,
    }
}

// ───────────────────────────────────────────────────────────────────
// Background tasks
// ───────────────────────────────────────────────────────────────────

async fn write_loop(mut writer: SplitSink<WsStream, WsMessage>, mut rx: mpsc::Receiver<String>) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = writer.send(WsMessage::Text(text.into())).await {
            log::warn!("Write failed: {e}");
            break;
        }
    }
    let _ = writer.close().await;
}

async fn heartbeat_loop(shared: Shared, tx: mpsc::Sender<String>, epoch: u64, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if shared.state.read().await.epoch != epoch {
            return;
        }
        let ping = match Message::ping().encode() {
            Ok(ping) => ping,
            Err(e) => {
                log::error!("Failed to encode ping: {e}");
                return;
            }
        };
        if tx.send(ping).await.is_err() {
            return;
        }
        log::trace!("Heartbeat sent");
    }
}

async fn read_loop(shared: Shared, mut reader: SplitStream<WsStream>, epoch: u64) {
    while let Some(frame) = reader.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Read failed: {e}");
                break;
            }
        };

        let message = match protocol::decode(text.as_str()) {
            Ok(Frame::Message(message)) => message,
            Ok(Frame::Unknown(kind)) => {
                log::debug!("Ignoring unknown message type {kind:?}");
                continue;
            }
            Err(e) => {
                log::warn!("Dropping malformed frame: {e}");
                continue;
            }
        };

        let mut state = shared.state.write().await;
        if state.epoch != epoch {
            // Disconnected while this frame was in flight
            return;
        }
        match message {
            Message::Pong { timestamp } => {
                let latency = now_ms() - timestamp;
                state.session.record_latency(latency);
                drop(state);
                shared.emit(ClientEvent::Latency(latency.max(0.0)));
            }
            Message::PageState {
                current_page,
                page_count,
            } => {
                let page_moved = state.session.current_page_index() != current_page;
                state.session.update_page_state(current_page, page_count);
                drop(state);
                if page_moved {
                    shared.preview.lock().await.clear();
                    shared.emit(ClientEvent::PreviewCleared);
                }
                shared.emit(ClientEvent::PageState {
                    current_page,
                    page_count,
                });
            }
            other => log::debug!("Ignoring {} from host", other.kind()),
        }
    }

    let changed = shared.state.write().await.teardown(epoch);
    if changed {
        log::info!("Connection to host lost");
        shared.emit(ClientEvent::Disconnected);
    }
}
