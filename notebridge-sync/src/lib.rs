//! # notebridge-sync: Host/remote link for NoteBridge
//!
//! Carries ink and control events from the input device to the host that
//! owns the notebook, and applies them there through a single writer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   WebSocket / JSON   ┌──────────────┐
//! │ RemoteClient │ ◄──────────────────► │  SyncServer  │
//! │ (device)     │   stroke_update …    │  (host)      │
//! └──────────────┘   page_state …       └──────┬───────┘
//!                                              │ HostEvent
//!                                              ▼
//!                                       ┌──────────────┐
//!                                       │ HostRuntime  │──► NotebookStore
//!                                       │ Coordinator  │
//!                                       └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON wire messages and two-stage decoding
//! - [`session`]: Connection state machine
//! - [`server`]: Host WebSocket endpoint and current-peer slot
//! - [`client`]: Remote client with heartbeat and point batching
//! - [`coordinator`]: Routes events into the document
//! - [`runtime`]: Single-writer task around the coordinator
//! - [`discovery`]: Discovered service → connect URLs
//! - [`storage`]: JSON notebook files

pub mod protocol;
pub mod session;
pub mod server;
pub mod client;
pub mod coordinator;
pub mod runtime;
pub mod discovery;
pub mod storage;

// Re-exports for convenience
pub use protocol::{decode, now_ms, Frame, Message, ProtocolError, PROTOCOL_VERSION};
pub use session::{ConnectionState, Session, SessionError};
pub use server::{ConnectionId, HostEvent, PeerSlot, ServerConfig, ServerStats, SyncServer};
pub use client::{ClientConfig, ClientError, ClientEvent, RemoteClient};
pub use coordinator::{LocalCommand, NullSink, Outbound, RenderSink, SyncCoordinator};
pub use runtime::{HostHandle, HostRequest, HostRuntime, RuntimeError};
pub use discovery::{ws_url, ConnectTarget, DiscoveredService, DEFAULT_PORT, SERVICE_TYPE};
pub use storage::{NotebookStore, StoreError};
