//! Connection state machine shared by both ends of the link.
//!
//! ```text
//!            begin_connect            handshake(welcome)
//! Disconnected ──────────► Connecting ──────────────► Connected
//!      ▲                        │                         │
//!      └──────── disconnect ────┴─────────────────────────┘
//! ```
//!
//! Leaving `Connected` forgets everything learned from the peer: its name,
//! the last latency sample and the page cursor it reported.

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Illegal state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "Invalid session transition {from:?} -> {to:?}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// What one side knows about the other.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: ConnectionState,
    peer_name: Option<String>,
    last_latency_ms: Option<f64>,
    current_page_index: usize,
    page_count: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            peer_name: None,
            last_latency_ms: None,
            current_page_index: 0,
            page_count: 1,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    pub fn last_latency_ms(&self) -> Option<f64> {
        self.last_latency_ms
    }

    pub fn current_page_index(&self) -> usize {
        self.current_page_index
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// `Disconnected → Connecting`.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        self.transition(ConnectionState::Disconnected, ConnectionState::Connecting)
    }

    /// `Connecting → Connected`, on receipt of the peer's handshake.
    pub fn handshake(&mut self, peer_name: impl Into<String>) -> Result<(), SessionError> {
        self.transition(ConnectionState::Connecting, ConnectionState::Connected)?;
        self.peer_name = Some(peer_name.into());
        Ok(())
    }

    /// Go to `Disconnected` from any state. Returns `false` if already there.
    pub fn disconnect(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        *self = Self::default();
        true
    }

    pub fn record_latency(&mut self, latency_ms: f64) {
        if self.is_connected() {
            self.last_latency_ms = Some(latency_ms.max(0.0));
        }
    }

    pub fn update_page_state(&mut self, current_page: usize, page_count: usize) {
        self.current_page_index = current_page;
        self.page_count = page_count.max(1);
    }

    fn transition(
        &mut self,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), SessionError> {
        if self.state != from {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        log::debug!("Session {from:?} -> {to:?}");
        self.state = to;
        Ok(())
    }
}
