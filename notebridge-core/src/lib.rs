//! # notebridge-core: Ink document engine for NoteBridge
//!
//! Holds the authoritative notebook on the host: strokes, per-page
//! undo/redo logs, erase hit-testing and in-flight stroke assembly.
//!
//! ## Architecture
//!
//! ```text
//!  point batches ──► StrokeAssembler ──► Stroke ──► Page.ActionHistory
//!                                                        │ replay
//!  erase_at(x, y) ──► nearest_stroke ◄── ActiveStrokes ◄─┘
//! ```
//!
//! ## Modules
//!
//! - [`geometry`]: Point/segment/polyline distances
//! - [`stroke`]: Points, strokes, ids and styles
//! - [`history`]: Append/undo/redo log with derived visible state
//! - [`assembly`]: Per-id accumulation of streamed points
//! - [`erase`]: Nearest-stroke hit testing
//! - [`document`]: Notebook and page model
//! - [`export`]: Exporter trait and physical-unit helpers

pub mod geometry;
pub mod stroke;
pub mod history;
pub mod assembly;
pub mod erase;
pub mod document;
pub mod export;

// Re-exports for convenience
pub use geometry::Vec2;
pub use stroke::{Point, Stroke, StrokeId, StrokeStyle, Tool, DEFAULT_COLOR, DEFAULT_WIDTH};
pub use history::{Action, ActionHistory, ActiveStrokes};
pub use assembly::StrokeAssembler;
pub use erase::{nearest_stroke, EraseHit, ERASE_THRESHOLD};
pub use document::{
    now_millis, DocumentError, Notebook, NotebookSummary, Page, PageCopy, PageSize, Template,
    MM_TO_PT,
};
pub use export::{JsonExporter, NotebookExporter};
