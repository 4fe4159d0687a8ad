//! Host-side glue between the transport and the document.
//!
//! ```text
//! HostEvent::Remote ─┐                       ┌─► RenderSink (external renderer)
//!                    ├─► SyncCoordinator ────┤
//! LocalCommand ──────┘    │         │        └─► outbox ─► current peer
//!                         ▼         ▼
//!                  StrokeAssembler  Notebook ── Page ── ActionHistory
//! ```
//!
//! The coordinator is plain synchronous state: it is only ever driven from
//! one task (see [`crate::runtime`]), which is what serializes remote edits
//! against local ones. Everything it wants to say to the peer is queued and
//! collected with [`SyncCoordinator::drain_outbound`].

use std::collections::VecDeque;
use std::ops::Range;

use notebridge_core::{
    DocumentError, EraseHit, Notebook, NotebookExporter, Page, PageCopy, PageSize, Point, Stroke,
    StrokeAssembler, StrokeId, StrokeStyle, Template,
};

use crate::protocol::Message;
use crate::server::{ConnectionId, HostEvent};
use crate::session::Session;

/// Receives drawing notifications. All methods default to no-ops.
pub trait RenderSink: Send {
    /// Points `range` were appended to the open `stroke`.
    fn segment_added(&mut self, _stroke: &Stroke, _range: Range<usize>) {}
    /// The page's visible strokes changed; redraw from `active_strokes()`.
    fn page_invalidated(&mut self, _page: &Page) {}
    /// Current page or page count changed.
    fn page_changed(&mut self, _current: usize, _count: usize) {}
    fn session_changed(&mut self, _session: &Session) {}
}

/// Sink that ignores everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {}

/// A message addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub connection_id: ConnectionId,
    pub message: Message,
}

/// Host-local input, queued alongside remote events.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalCommand {
    BeginStroke {
        stroke_id: StrokeId,
        style: StrokeStyle,
        point: Point,
    },
    ExtendStroke {
        point: Point,
    },
    EndStroke,
    Undo,
    Redo,
    EraseAt {
        x: f64,
        y: f64,
    },
    ClearPage,
    SwitchPage {
        index: usize,
    },
    AddPage {
        page_size: Option<PageSize>,
        template: Option<Template>,
    },
    DeletePage {
        index: usize,
    },
    InsertPage {
        after_index: usize,
        copy: PageCopy,
    },
    Rename {
        name: String,
    },
}

/// Owns the authoritative notebook and applies every edit to it.
pub struct SyncCoordinator {
    notebook: Notebook,
    /// Strokes streaming in from the peer
    remote: StrokeAssembler,
    /// The host's own pointer stroke
    local: StrokeAssembler,
    local_stroke: Option<StrokeId>,
    session: Session,
    active_connection: Option<ConnectionId>,
    outbox: VecDeque<Outbound>,
    sink: Box<dyn RenderSink>,
}

impl SyncCoordinator {
    pub fn new(notebook: Notebook) -> Self {
        let mut session = Session::new();
        session.update_page_state(notebook.current_page_index(), notebook.page_count());
        Self {
            notebook,
            remote: StrokeAssembler::new(),
            local: StrokeAssembler::new(),
            local_stroke: None,
            session,
            active_connection: None,
            outbox: VecDeque::new(),
            sink: Box::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn RenderSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn active_connection(&self) -> Option<ConnectionId> {
        self.active_connection
    }

    /// Strokes currently being drawn, local first.
    pub fn open_strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.local.open_strokes().chain(self.remote.open_strokes())
    }

    /// Take everything queued for the peer.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        self.outbox.drain(..).collect()
    }

    // ───────────────────────────────────────────────────────────────
    // Transport events
    // ───────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::PeerConnected {
                connection_id,
                peer_name,
            } => self.peer_connected(connection_id, peer_name),
            HostEvent::PeerDisconnected { connection_id } => {
                if self.active_connection == Some(connection_id) {
                    self.peer_lost();
                } else {
                    log::debug!("Ignoring disconnect of superseded connection {connection_id}");
                }
            }
            HostEvent::Remote {
                connection_id,
                message,
            } => {
                if self.active_connection != Some(connection_id) {
                    log::debug!(
                        "Discarding {} from inactive connection {connection_id}",
                        message.kind()
                    );
                    return;
                }
                self.handle_remote(message);
            }
        }
    }

    fn peer_connected(&mut self, connection_id: ConnectionId, peer_name: String) {
        if self.active_connection.is_some() {
            self.peer_lost();
        }
        self.active_connection = Some(connection_id);

        // The transport only reports a peer once its socket is up, so both
        // steps happen together on the host.
        let result = self
            .session
            .begin_connect()
            .and_then(|()| self.session.handshake(peer_name));
        if let Err(e) = result {
            log::error!("Session out of sync on connect: {e}");
        }
        self.session
            .update_page_state(self.notebook.current_page_index(), self.notebook.page_count());
        self.sink.session_changed(&self.session);
        self.emit_page_state();
    }

    fn peer_lost(&mut self) {
        self.active_connection = None;
        let dropped = self.remote.len();
        self.remote.reset();
        if dropped > 0 {
            log::info!("Peer left with {dropped} unfinished strokes, discarding");
            self.invalidate();
        }
        self.session.disconnect();
        self.sink.session_changed(&self.session);
    }

    fn handle_remote(&mut self, message: Message) {
        match message {
            Message::StrokeUpdate {
                stroke_id,
                points,
                color,
                width,
                tool,
            } => {
                let style = StrokeStyle { color, width, tool };
                if self.remote.begin_or_get(&stroke_id, style).is_none() {
                    return;
                }
                if let Some(range) = self.remote.append_points(&stroke_id, points) {
                    if let Some(stroke) = self.remote.get(&stroke_id) {
                        self.sink.segment_added(stroke, range);
                    }
                }
            }
            Message::StrokeComplete { stroke_id } => {
                if let Some(stroke) = self.remote.complete(&stroke_id) {
                    self.commit(stroke);
                } else {
                    log::debug!("stroke_complete for unknown or empty stroke {stroke_id}");
                }
            }
            Message::Undo => {
                self.undo();
            }
            Message::Redo => {
                self.redo();
            }
            Message::EraseAt { x, y } => {
                self.erase_at(x, y);
            }
            Message::PageSwitch { page } => {
                match self.navigate(page) {
                    Ok(_) => {}
                    Err(e) => log::warn!("Rejected remote page switch: {e}"),
                }
                // Always answer so the remote can correct its cursor
                self.emit_page_state();
            }
            Message::PageAdd => {
                self.add_page(None, None);
            }
            Message::Ping { timestamp } => {
                self.send(Message::Pong { timestamp });
            }
            other @ (Message::Welcome { .. } | Message::Pong { .. } | Message::PageState { .. }) => {
                log::debug!("Ignoring host-bound {} from remote", other.kind());
            }
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Local input
    // ───────────────────────────────────────────────────────────────

    /// Apply one queued local command.
    pub fn apply(&mut self, command: LocalCommand) -> Result<(), DocumentError> {
        match command {
            LocalCommand::BeginStroke {
                stroke_id,
                style,
                point,
            } => self.begin_stroke(stroke_id, style, point),
            LocalCommand::ExtendStroke { point } => {
                self.extend_stroke(point);
            }
            LocalCommand::EndStroke => {
                self.end_stroke();
            }
            LocalCommand::Undo => {
                self.undo();
            }
            LocalCommand::Redo => {
                self.redo();
            }
            LocalCommand::EraseAt { x, y } => {
                self.erase_at(x, y);
            }
            LocalCommand::ClearPage => {
                self.clear_page();
            }
            LocalCommand::SwitchPage { index } => {
                self.switch_page(index)?;
            }
            LocalCommand::AddPage {
                page_size,
                template,
            } => {
                self.add_page(page_size, template);
            }
            LocalCommand::DeletePage { index } => self.delete_page(index)?,
            LocalCommand::InsertPage { after_index, copy } => {
                self.insert_page(after_index, &copy)?;
            }
            LocalCommand::Rename { name } => self.rename(name),
        }
        Ok(())
    }

    /// Pointer down. Any stroke still open locally is committed first.
    pub fn begin_stroke(&mut self, stroke_id: StrokeId, style: StrokeStyle, point: Point) {
        self.flush_local_stroke();
        if self.local.begin_or_get(&stroke_id, style).is_none() {
            log::warn!("Local stroke id {stroke_id} was already used");
            return;
        }
        self.local_stroke = Some(stroke_id);
        self.extend_stroke(point);
    }

    /// Pointer move. Returns `false` when no local stroke is open.
    pub fn extend_stroke(&mut self, point: Point) -> bool {
        let Some(id) = self.local_stroke.clone() else {
            return false;
        };
        if !point.is_finite() {
            log::warn!("Dropping non-finite local point");
            return true;
        }
        if let Some(range) = self.local.append_points(&id, [point]) {
            if let Some(stroke) = self.local.get(&id) {
                self.sink.segment_added(stroke, range);
            }
        }
        true
    }

    /// Pointer up.
    pub fn end_stroke(&mut self) -> Option<StrokeId> {
        self.flush_local_stroke()
    }

    /// Commit the in-progress local stroke, if any, to the current page.
    pub fn flush_local_stroke(&mut self) -> Option<StrokeId> {
        let id = self.local_stroke.take()?;
        let stroke = self.local.complete(&id)?;
        self.commit(stroke);
        Some(id)
    }

    pub fn undo(&mut self) -> bool {
        let changed = self.notebook.current_page_mut().undo();
        if changed {
            self.invalidate();
        } else {
            log::debug!("Nothing to undo");
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.notebook.current_page_mut().redo();
        if changed {
            self.invalidate();
        } else {
            log::debug!("Nothing to redo");
        }
        changed
    }

    /// Erase the nearest stroke on the current page, if one is in range.
    pub fn erase_at(&mut self, x: f64, y: f64) -> Option<EraseHit> {
        let hit = self.notebook.current_page_mut().erase_at(x, y)?;
        log::debug!("Erased {} at ({x:.3}, {y:.3})", hit.stroke_id);
        self.invalidate();
        Some(hit)
    }

    /// Clear the current page, dropping strokes still being drawn.
    ///
    /// Returns `false` (and records nothing) if there was no ink at all.
    pub fn clear_page(&mut self) -> bool {
        self.local_stroke = None;
        let discarded = self.local.discard_all() + self.remote.discard_all();

        let page = self.notebook.current_page_mut();
        if !page.has_ink() && discarded == 0 {
            return false;
        }
        page.clear();
        self.invalidate();
        true
    }

    // ───────────────────────────────────────────────────────────────
    // Pages
    // ───────────────────────────────────────────────────────────────

    /// Switch pages and tell the peer.
    pub fn switch_page(&mut self, index: usize) -> Result<bool, DocumentError> {
        let switched = self.navigate(index)?;
        if switched {
            self.emit_page_state();
        }
        Ok(switched)
    }

    /// Append a page, switch to it and tell the peer.
    pub fn add_page(&mut self, page_size: Option<PageSize>, template: Option<Template>) -> usize {
        self.leave_page();
        let index = self.notebook.add_page(page_size, template);
        log::info!("Added page {} of {}", index + 1, self.notebook.page_count());
        self.page_changed();
        self.emit_page_state();
        index
    }

    pub fn delete_page(&mut self, index: usize) -> Result<(), DocumentError> {
        let deleting_current =
            index == self.notebook.current_page_index() && self.notebook.page_count() > 1;
        if deleting_current {
            self.leave_page();
        }
        self.notebook.delete_page(index)?;
        log::info!("Deleted page {index}");
        self.page_changed();
        self.emit_page_state();
        Ok(())
    }

    pub fn copy_page(&mut self, index: usize) -> Result<PageCopy, DocumentError> {
        if index == self.notebook.current_page_index() {
            self.flush_local_stroke();
        }
        self.notebook.copy_page(index)
    }

    pub fn insert_page(&mut self, after_index: usize, copy: &PageCopy) -> Result<usize, DocumentError> {
        let index = self.notebook.insert_page(after_index, copy)?;
        self.page_changed();
        self.emit_page_state();
        Ok(index)
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.notebook.rename(name);
    }

    fn navigate(&mut self, index: usize) -> Result<bool, DocumentError> {
        if index != self.notebook.current_page_index() && self.notebook.page(index).is_some() {
            self.leave_page();
        }
        let switched = self.notebook.switch_to_page(index)?;
        if switched {
            self.page_changed();
        }
        Ok(switched)
    }

    /// Settle in-flight ink before the current page changes.
    fn leave_page(&mut self) {
        self.flush_local_stroke();
        let dropped = self.remote.discard_all();
        if dropped > 0 {
            log::debug!("Discarded {dropped} remote strokes on page change");
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Snapshots
    // ───────────────────────────────────────────────────────────────

    /// Copy of the notebook with any local in-progress stroke committed.
    pub fn snapshot(&mut self) -> Notebook {
        self.flush_local_stroke();
        self.notebook.clone()
    }

    /// Hand the flushed notebook to an exporter.
    pub fn export<E: NotebookExporter>(&mut self, exporter: &mut E) -> Result<(), E::Error> {
        self.flush_local_stroke();
        exporter.export(&self.notebook)
    }

    /// Swap in another notebook (open / new). In-flight strokes are dropped.
    pub fn replace_notebook(&mut self, notebook: Notebook) {
        log::info!("Opening notebook {} ({})", notebook.name, notebook.id);
        self.local_stroke = None;
        self.local.reset();
        self.remote.reset();
        self.notebook = notebook;
        self.page_changed();
        self.emit_page_state();
    }

    // ───────────────────────────────────────────────────────────────
    // Helpers
    // ───────────────────────────────────────────────────────────────

    fn commit(&mut self, stroke: Stroke) {
        log::trace!("Committing stroke {} ({} points)", stroke.id, stroke.points.len());
        self.notebook.current_page_mut().add_stroke(stroke);
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.sink.page_invalidated(self.notebook.current_page());
    }

    fn page_changed(&mut self) {
        let current = self.notebook.current_page_index();
        let count = self.notebook.page_count();
        self.session.update_page_state(current, count);
        self.sink.page_changed(current, count);
        self.invalidate();
    }

    fn emit_page_state(&mut self) {
        let message = Message::page_state(
            self.notebook.current_page_index(),
            self.notebook.page_count(),
        );
        self.send(message);
    }

    fn send(&mut self, message: Message) {
        if let Some(connection_id) = self.active_connection {
            self.outbox.push_back(Outbound {
                connection_id,
                message,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Default)]
    struct Recorded {
        segments: Vec<(String, Range<usize>)>,
        invalidations: usize,
        page_changes: Vec<(usize, usize)>,
    }

    struct RecordingSink(Arc<Mutex<Recorded>>);

    impl RenderSink for RecordingSink {
        fn segment_added(&mut self, stroke: &Stroke, range: Range<usize>) {
            self.0.lock().unwrap().segments.push((stroke.id.to_string(), range));
        }
        fn page_invalidated(&mut self, _page: &Page) {
            self.0.lock().unwrap().invalidations += 1;
        }
        fn page_changed(&mut self, current: usize, count: usize) {
            self.0.lock().unwrap().page_changes.push((current, count));
        }
    }

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y, 0.5, 0.0)
    }

    fn connected() -> (SyncCoordinator, ConnectionId) {
        let notebook = Notebook::new("Test", PageSize::default(), Template::default());
        let mut c = SyncCoordinator::new(notebook);
        let id = Uuid::new_v4();
        c.handle_event(HostEvent::PeerConnected {
            connection_id: id,
            peer_name: "iPad".into(),
        });
        c.drain_outbound();
        (c, id)
    }

    fn remote(c: &mut SyncCoordinator, id: ConnectionId, message: Message) {
        c.handle_event(HostEvent::Remote {
            connection_id: id,
            message,
        });
    }

    fn update(stroke_id: &str, points: Vec<Point>) -> Message {
        Message::StrokeUpdate {
            stroke_id: StrokeId::from(stroke_id),
            points,
            color: "#000000".into(),
            width: 2.0,
            tool: Default::default(),
        }
    }

    fn complete(stroke_id: &str) -> Message {
        Message::StrokeComplete {
            stroke_id: StrokeId::from(stroke_id),
        }
    }

    fn visible(c: &SyncCoordinator) -> Vec<String> {
        c.notebook()
            .current_page()
            .active_strokes()
            .keys()
            .map(|id| id.to_string())
            .collect()
    }

    #[test]
    fn test_connect_sends_page_state() {
        let notebook = Notebook::new("Test", PageSize::default(), Template::default());
        let mut c = SyncCoordinator::new(notebook);
        let id = Uuid::new_v4();
        c.handle_event(HostEvent::PeerConnected {
            connection_id: id,
            peer_name: "iPad".into(),
        });

        assert!(c.session().is_connected());
        assert_eq!(c.session().peer_name(), Some("iPad"));
        assert_eq!(
            c.drain_outbound(),
            vec![Outbound {
                connection_id: id,
                message: Message::page_state(0, 1),
            }]
        );
    }

    #[test]
    fn test_batches_assemble_into_one_stroke() {
        let log = Arc::new(Mutex::new(Recorded::default()));
        let (c, id) = connected();
        let mut c = c.with_sink(Box::new(RecordingSink(log.clone())));

        remote(&mut c, id, update("s1", vec![pt(0.1, 0.1), pt(0.2, 0.2)]));
        remote(&mut c, id, update("s1", vec![pt(0.3, 0.3), pt(0.4, 0.4)]));
        assert!(visible(&c).is_empty());
        remote(&mut c, id, complete("s1"));

        let active = c.notebook().current_page().active_strokes();
        assert_eq!(active.len(), 1);
        let xs: Vec<f64> = active[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.1, 0.2, 0.3, 0.4]);

        let log = log.lock().unwrap();
        assert_eq!(
            log.segments,
            vec![("s1".to_string(), 0..2), ("s1".to_string(), 2..4)]
        );
        assert_eq!(log.invalidations, 1);
    }

    #[test]
    fn test_remote_erase_undo_redo() {
        let (mut c, id) = connected();
        remote(
            &mut c,
            id,
            update("A", vec![pt(0.1, 0.1), pt(0.2, 0.1), pt(0.3, 0.1)]),
        );
        remote(&mut c, id, complete("A"));
        remote(&mut c, id, update("B", vec![pt(0.7, 0.7)]));
        remote(&mut c, id, complete("B"));

        remote(&mut c, id, Message::EraseAt { x: 0.705, y: 0.7 });
        assert_eq!(visible(&c), vec!["A"]);

        remote(&mut c, id, Message::Undo);
        assert_eq!(visible(&c), vec!["A", "B"]);

        remote(&mut c, id, Message::Redo);
        assert_eq!(visible(&c), vec!["A"]);
    }

    #[test]
    fn test_erase_miss_is_silent() {
        let (mut c, id) = connected();
        remote(&mut c, id, update("A", vec![pt(0.1, 0.1)]));
        remote(&mut c, id, complete("A"));
        remote(&mut c, id, Message::EraseAt { x: 0.9, y: 0.9 });
        assert_eq!(visible(&c), vec!["A"]);
        assert_eq!(c.notebook().current_page().history().len(), 1);
    }

    #[test]
    fn test_late_update_after_complete_ignored() {
        let (mut c, id) = connected();
        remote(&mut c, id, update("A", vec![pt(0.1, 0.1)]));
        remote(&mut c, id, complete("A"));
        remote(&mut c, id, update("A", vec![pt(0.9, 0.9)]));
        remote(&mut c, id, complete("A"));

        let active = c.notebook().current_page().active_strokes();
        assert_eq!(active[0].points.len(), 1);
        assert_eq!(c.notebook().current_page().history().len(), 1);
    }

    #[test]
    fn test_stale_connection_ignored() {
        let (mut c, _id) = connected();
        let stranger = Uuid::new_v4();
        remote(&mut c, stranger, update("A", vec![pt(0.1, 0.1)]));
        remote(&mut c, stranger, complete("A"));
        assert!(visible(&c).is_empty());

        c.handle_event(HostEvent::PeerDisconnected {
            connection_id: stranger,
        });
        assert!(c.session().is_connected());
    }

    #[test]
    fn test_page_add_and_switch_reply_with_page_state() {
        let (mut c, id) = connected();
        remote(&mut c, id, Message::PageAdd);
        remote(&mut c, id, Message::PageSwitch { page: 0 });

        let sent: Vec<Message> = c.drain_outbound().into_iter().map(|o| o.message).collect();
        assert_eq!(
            sent,
            vec![Message::page_state(1, 2), Message::page_state(0, 2)]
        );
        assert_eq!(c.session().page_count(), 2);
    }

    #[test]
    fn test_out_of_range_switch_reports_current_state() {
        let (mut c, id) = connected();
        remote(&mut c, id, Message::PageSwitch { page: 9 });
        assert_eq!(c.notebook().current_page_index(), 0);
        let sent: Vec<Message> = c.drain_outbound().into_iter().map(|o| o.message).collect();
        assert_eq!(sent, vec![Message::page_state(0, 1)]);
    }

    #[test]
    fn test_page_switch_discards_remote_in_flight() {
        let (mut c, id) = connected();
        c.add_page(None, None);
        remote(&mut c, id, update("half", vec![pt(0.5, 0.5)]));

        remote(&mut c, id, Message::PageSwitch { page: 0 });
        remote(&mut c, id, update("half", vec![pt(0.6, 0.6)]));
        remote(&mut c, id, complete("half"));

        assert!(visible(&c).is_empty());
        assert!(!c.notebook().page(1).unwrap().has_ink());
    }

    #[test]
    fn test_page_switch_flushes_local_stroke_to_old_page() {
        let (mut c, _) = connected();
        c.add_page(None, None);
        c.begin_stroke(StrokeId::from("mine"), StrokeStyle::default(), pt(0.2, 0.2));
        c.extend_stroke(pt(0.3, 0.3));

        c.switch_page(0).unwrap();
        assert!(visible(&c).is_empty());
        let page1 = c.notebook().page(1).unwrap().active_strokes();
        assert_eq!(page1[0].points.len(), 2);
    }

    #[test]
    fn test_undo_survives_page_switch() {
        let (mut c, _) = connected();
        c.begin_stroke(StrokeId::from("a"), StrokeStyle::default(), pt(0.2, 0.2));
        c.end_stroke();
        c.add_page(None, None);
        c.switch_page(0).unwrap();

        assert!(c.undo());
        assert!(visible(&c).is_empty());
    }

    #[test]
    fn test_clear_only_with_ink() {
        let (mut c, _) = connected();
        assert!(!c.clear_page());
        assert!(c.notebook().current_page().history().is_empty());

        c.begin_stroke(StrokeId::from("a"), StrokeStyle::default(), pt(0.2, 0.2));
        // In-progress ink alone is enough to record a clear
        assert!(c.clear_page());
        assert!(visible(&c).is_empty());
        assert_eq!(c.notebook().current_page().history().len(), 1);
        assert!(c.end_stroke().is_none());
    }

    #[test]
    fn test_snapshot_flushes_local_stroke() {
        let (mut c, _) = connected();
        c.begin_stroke(StrokeId::from("wip"), StrokeStyle::default(), pt(0.2, 0.2));
        c.extend_stroke(pt(0.25, 0.25));

        let snap = c.snapshot();
        assert_eq!(snap.current_page().active_strokes().len(), 1);
        assert_eq!(c.open_strokes().count(), 0);
    }

    #[test]
    fn test_disconnect_resets_session_and_drops_in_flight() {
        let (mut c, id) = connected();
        remote(&mut c, id, update("half", vec![pt(0.5, 0.5)]));
        c.handle_event(HostEvent::PeerDisconnected { connection_id: id });

        assert!(!c.session().is_connected());
        assert_eq!(c.open_strokes().count(), 0);

        // Page changes while offline queue nothing
        c.add_page(None, None);
        assert!(c.drain_outbound().is_empty());
    }

    #[test]
    fn test_new_peer_supersedes_old() {
        let (mut c, old) = connected();
        remote(&mut c, old, update("half", vec![pt(0.5, 0.5)]));

        let new = Uuid::new_v4();
        c.handle_event(HostEvent::PeerConnected {
            connection_id: new,
            peer_name: "iPad 2".into(),
        });
        assert_eq!(c.active_connection(), Some(new));
        assert_eq!(c.session().peer_name(), Some("iPad 2"));
        assert_eq!(c.open_strokes().count(), 0);

        c.handle_event(HostEvent::PeerDisconnected { connection_id: old });
        assert!(c.session().is_connected());
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let (mut c, id) = connected();
        remote(&mut c, id, Message::Ping { timestamp: 42.0 });
        let sent = c.drain_outbound();
        assert_eq!(sent[0].message, Message::Pong { timestamp: 42.0 });
    }

    #[test]
    fn test_local_commands() {
        let (mut c, _) = connected();
        c.apply(LocalCommand::BeginStroke {
            stroke_id: StrokeId::from("x"),
            style: StrokeStyle::default(),
            point: pt(0.4, 0.4),
        })
        .unwrap();
        c.apply(LocalCommand::EndStroke).unwrap();
        assert_eq!(visible(&c), vec!["x"]);

        assert_eq!(
            c.apply(LocalCommand::DeletePage { index: 0 }),
            Err(DocumentError::LastPage)
        );
        assert_eq!(
            c.apply(LocalCommand::SwitchPage { index: 3 }),
            Err(DocumentError::PageOutOfRange {
                index: 3,
                page_count: 1
            })
        );

        let copy = c.copy_page(0).unwrap();
        c.apply(LocalCommand::InsertPage {
            after_index: 0,
            copy,
        })
        .unwrap();
        assert_eq!(c.notebook().page_count(), 2);
        assert_eq!(c.notebook().current_page_index(), 0);

        c.apply(LocalCommand::Rename {
            name: "Renamed".into(),
        })
        .unwrap();
        assert_eq!(c.notebook().name, "Renamed");
    }

    #[test]
    fn test_export_sees_flushed_stroke() {
        let (mut c, _) = connected();
        c.begin_stroke(StrokeId::from("wip"), StrokeStyle::default(), pt(0.2, 0.2));

        let mut exporter = notebridge_core::JsonExporter::new(Vec::new());
        c.export(&mut exporter).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&exporter.into_inner()).unwrap();
        assert_eq!(value["pages"][0]["strokes"][0]["id"], "wip");
    }
}
