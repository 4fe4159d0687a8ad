//! Export hooks for external renderers.
//!
//! The host never rasterizes ink itself. An exporter receives a flushed
//! notebook snapshot and turns it into whatever the renderer needs (PDF,
//! SVG, a JSON dump). Coordinates stay normalized; the helpers here map them
//! to physical units.

use std::io::Write;

use crate::document::{Notebook, PageSize};
use crate::stroke::Stroke;

/// Thinnest line a renderer should emit, in points.
pub const MIN_LINE_WIDTH: f64 = 0.5;

/// Consumer of a complete notebook snapshot.
pub trait NotebookExporter {
    type Error;

    fn export(&mut self, notebook: &Notebook) -> Result<(), Self::Error>;
}

/// Writes the notebook as pretty-printed JSON.
pub struct JsonExporter<W: Write> {
    writer: W,
}

impl<W: Write> JsonExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> NotebookExporter for JsonExporter<W> {
    type Error = serde_json::Error;

    fn export(&mut self, notebook: &Notebook) -> Result<(), Self::Error> {
        serde_json::to_writer_pretty(&mut self.writer, notebook)
    }
}

/// Fixed line width for renderers without per-point pressure.
pub fn line_width(stroke: &Stroke) -> f64 {
    let pressure = stroke.average_pressure().unwrap_or(1.0);
    (pressure * stroke.width).max(MIN_LINE_WIDTH)
}

/// Map a normalized point to page coordinates in PDF points.
pub fn to_page_points(page_size: PageSize, x: f64, y: f64) -> (f64, f64) {
    let (w, h) = page_size.dimensions_pt();
    (x * w, y * h)
}
