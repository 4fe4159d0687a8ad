//! Single-writer task that owns the [`SyncCoordinator`].
//!
//! Transport events and shell requests arrive on two channels; the task
//! handles them one at a time, then forwards whatever the coordinator queued
//! for the peer. Nothing else holds a reference to the document.

use tokio::sync::{mpsc, oneshot};

use notebridge_core::{DocumentError, Notebook, PageCopy};

use crate::coordinator::{LocalCommand, SyncCoordinator};
use crate::server::{HostEvent, PeerSlot};

/// Requests from the host shell.
#[derive(Debug)]
pub enum HostRequest {
    Command(LocalCommand),
    CopyPage {
        index: usize,
        reply: oneshot::Sender<Result<PageCopy, DocumentError>>,
    },
    /// Flushed copy of the notebook, for save and export.
    Snapshot(oneshot::Sender<Notebook>),
    Open(Notebook),
    Shutdown,
}

/// Runtime errors seen by [`HostHandle`] callers.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// The runtime task has stopped.
    Stopped,
    Document(DocumentError),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Host runtime stopped"),
            Self::Document(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<DocumentError> for RuntimeError {
    fn from(e: DocumentError) -> Self {
        RuntimeError::Document(e)
    }
}

/// Cloneable front door to the runtime task.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostRequest>,
}

impl HostHandle {
    async fn request(&self, request: HostRequest) -> Result<(), RuntimeError> {
        self.tx.send(request).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Queue a local edit.
    pub async fn submit(&self, command: LocalCommand) -> Result<(), RuntimeError> {
        self.request(HostRequest::Command(command)).await
    }

    pub async fn copy_page(&self, index: usize) -> Result<PageCopy, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.request(HostRequest::CopyPage { index, reply }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::Stopped)??)
    }

    pub async fn snapshot(&self) -> Result<Notebook, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.request(HostRequest::Snapshot(reply)).await?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    pub async fn open(&self, notebook: Notebook) -> Result<(), RuntimeError> {
        self.request(HostRequest::Open(notebook)).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(HostRequest::Shutdown).await
    }
}

/// The task body.
pub struct HostRuntime {
    coordinator: SyncCoordinator,
    events: mpsc::Receiver<HostEvent>,
    requests: mpsc::Receiver<HostRequest>,
    peer: PeerSlot,
}

impl HostRuntime {
    pub fn new(
        coordinator: SyncCoordinator,
        events: mpsc::Receiver<HostEvent>,
        peer: PeerSlot,
        request_capacity: usize,
    ) -> (Self, HostHandle) {
        let (tx, requests) = mpsc::channel(request_capacity);
        let runtime = Self {
            coordinator,
            events,
            requests,
            peer,
        };
        (runtime, HostHandle { tx })
    }

    /// Process until shutdown or until every [`HostHandle`] is dropped.
    ///
    /// Returns the coordinator so the caller can persist the final state.
    pub async fn run(mut self) -> SyncCoordinator {
        log::info!("Host runtime started");
        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.coordinator.handle_event(event);
                }
                request = self.requests.recv() => {
                    match request {
                        Some(HostRequest::Shutdown) | None => break,
                        Some(request) => self.handle_request(request),
                    }
                }
            }
            self.flush_outbound().await;
        }
        self.coordinator.flush_local_stroke();
        log::info!("Host runtime stopped");
        self.coordinator
    }

    fn handle_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::Command(command) => {
                if let Err(e) = self.coordinator.apply(command) {
                    log::warn!("Rejected local command: {e}");
                }
            }
            HostRequest::CopyPage { index, reply } => {
                let _ = reply.send(self.coordinator.copy_page(index));
            }
            HostRequest::Snapshot(reply) => {
                let _ = reply.send(self.coordinator.snapshot());
            }
            HostRequest::Open(notebook) => self.coordinator.replace_notebook(notebook),
            HostRequest::Shutdown => {}
        }
    }

    async fn flush_outbound(&mut self) {
        for out in self.coordinator.drain_outbound() {
            match self.peer.send_to(out.connection_id, &out.message).await {
                Ok(true) => {}
                Ok(false) => log::debug!("Peer gone, dropped {}", out.message.kind()),
                Err(e) => log::error!("Failed to send {}: {e}", out.message.kind()),
            }
        }
    }
}
