//! Notebook / page document model.
//!
//! ```text
//! Notebook ──┬── Page 0 ── ActionHistory ── (baseline + actions)
//!            ├── Page 1 ── ActionHistory
//!            └── Page n …
//!       ▲
//!   current page cursor
//! ```
//!
//! The notebook always holds at least one page and every page's `index`
//! equals its position in `pages`. All mutations go through methods here so
//! both invariants hold after every call; rejected operations leave the
//! notebook untouched.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::erase::{nearest_stroke, EraseHit, ERASE_THRESHOLD};
use crate::geometry::Vec2;
use crate::history::{Action, ActionHistory, ActiveStrokes};
use crate::stroke::Stroke;

/// PDF points per millimetre.
pub const MM_TO_PT: f64 = 72.0 / 25.4;

/// Physical page format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSize {
    A4Portrait,
    LetterLandscape,
    LetterPortrait,
    Square,
    /// Also used for unrecognised values in stored files.
    #[default]
    #[serde(other)]
    A4Landscape,
}

impl PageSize {
    /// Width and height in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PageSize::A4Landscape => (297.0, 210.0),
            PageSize::A4Portrait => (210.0, 297.0),
            PageSize::LetterLandscape => (279.4, 215.9),
            PageSize::LetterPortrait => (215.9, 279.4),
            PageSize::Square => (210.0, 210.0),
        }
    }

    /// Width and height in PDF points.
    pub fn dimensions_pt(self) -> (f64, f64) {
        let (w, h) = self.dimensions_mm();
        (w * MM_TO_PT, h * MM_TO_PT)
    }

    /// Width divided by height.
    pub fn aspect_ratio(self) -> f64 {
        let (w, h) = self.dimensions_mm();
        w / h
    }

    pub fn label(self) -> &'static str {
        match self {
            PageSize::A4Landscape => "A4 Landscape",
            PageSize::A4Portrait => "A4 Portrait",
            PageSize::LetterLandscape => "Letter Landscape",
            PageSize::LetterPortrait => "Letter Portrait",
            PageSize::Square => "Square",
        }
    }
}

/// Background ruling drawn under the ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    Dotted,
    Squared,
    RuledNarrow,
    Cornell,
    ThreeColumn,
    #[default]
    #[serde(other)]
    Blank,
}

/// Rejected document operations.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentError {
    /// Page index outside `0..page_count`.
    PageOutOfRange { index: usize, page_count: usize },
    /// Attempt to delete the only remaining page.
    LastPage,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::PageOutOfRange { index, page_count } => {
                write!(f, "Page {index} out of range (notebook has {page_count} pages)")
            }
            DocumentError::LastPage => write!(f, "Cannot delete the last remaining page"),
        }
    }
}

impl std::error::Error for DocumentError {}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ───────────────────────────────────────────────────────────────────
// Page
// ───────────────────────────────────────────────────────────────────

/// One page of a notebook, owning its undo/redo log.
///
/// On disk a page is stored as its visible strokes only; loading installs
/// them as the log's baseline, so undo history does not survive a save.
#[derive(Debug, Clone)]
pub struct Page {
    id: String,
    index: usize,
    pub page_size: PageSize,
    pub template: Template,
    history: ActionHistory,
}

impl Page {
    pub fn new(index: usize, page_size: PageSize, template: Template) -> Self {
        Self {
            id: new_id(),
            index,
            page_size,
            template,
            history: ActionHistory::new(),
        }
    }

    fn from_copy(index: usize, copy: &PageCopy) -> Self {
        Self {
            id: new_id(),
            index,
            page_size: copy.page_size,
            template: copy.template,
            history: ActionHistory::with_baseline(copy.strokes.iter().cloned()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position within the owning notebook.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    /// Strokes currently visible on this page.
    pub fn active_strokes(&self) -> ActiveStrokes {
        self.history.active_strokes()
    }

    /// Whether anything is visible.
    pub fn has_ink(&self) -> bool {
        !self.history.active_strokes().is_empty()
    }

    /// Commit a closed stroke.
    pub fn add_stroke(&mut self, stroke: Stroke) {
        self.history.push(Action::add_stroke(stroke));
    }

    /// Push a `Clear`. Always recorded, even on an empty page.
    pub fn clear(&mut self) {
        self.history.push(Action::Clear);
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo().is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Erase the stroke nearest to `(x, y)` if one is within the hit radius.
    pub fn erase_at(&mut self, x: f64, y: f64) -> Option<EraseHit> {
        let active = self.history.active_strokes();
        let hit = nearest_stroke(active.values(), Vec2::new(x, y), ERASE_THRESHOLD)?;
        self.history.push(Action::EraseStroke(hit.stroke_id.clone()));
        Some(hit)
    }

    /// Snapshot for copy/paste.
    pub fn copy(&self) -> PageCopy {
        PageCopy {
            strokes: self.visible_strokes(),
            page_size: self.page_size,
            template: self.template,
        }
    }

    /// Visible strokes as owned values, bottom first.
    pub fn visible_strokes(&self) -> Vec<Stroke> {
        self.history
            .active_strokes()
            .values()
            .map(|s| Stroke::clone(s))
            .collect()
    }
}

/// Clipboard contents for "copy page" / "paste after".
#[derive(Debug, Clone, PartialEq)]
pub struct PageCopy {
    pub strokes: Vec<Stroke>,
    pub page_size: PageSize,
    pub template: Template,
}

/// Stored shape of a page.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageRecord {
    id: String,
    #[serde(default)]
    index: usize,
    #[serde(default)]
    strokes: Vec<Stroke>,
    #[serde(default)]
    page_size: PageSize,
    #[serde(default)]
    template: Template,
}

impl Serialize for Page {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PageRecord {
            id: self.id.clone(),
            index: self.index,
            strokes: self.visible_strokes(),
            page_size: self.page_size,
            template: self.template,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = PageRecord::deserialize(deserializer)?;
        Ok(Page {
            id: record.id,
            index: record.index,
            page_size: record.page_size,
            template: record.template,
            history: ActionHistory::with_baseline(record.strokes),
        })
    }
}

// ───────────────────────────────────────────────────────────────────
// Notebook
// ───────────────────────────────────────────────────────────────────

/// A named, ordered collection of pages with a current-page cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NotebookRecord")]
pub struct Notebook {
    pub id: String,
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Milliseconds since the Unix epoch; stamped on save.
    pub updated_at: u64,
    pages: Vec<Page>,
    #[serde(skip)]
    current: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotebookRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created_at: u64,
    #[serde(default)]
    updated_at: u64,
    #[serde(default)]
    pages: Vec<Page>,
}

impl From<NotebookRecord> for Notebook {
    fn from(record: NotebookRecord) -> Self {
        let mut notebook = Notebook {
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            updated_at: record.updated_at,
            pages: record.pages,
            current: 0,
        };
        if notebook.pages.is_empty() {
            log::warn!("Notebook {} had no pages, adding a blank one", notebook.id);
            notebook
                .pages
                .push(Page::new(0, PageSize::default(), Template::default()));
        }
        notebook.reindex();
        notebook
    }
}

impl Notebook {
    /// Create a notebook with one empty page.
    pub fn new(name: impl Into<String>, page_size: PageSize, template: Template) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            pages: vec![Page::new(0, page_size, template)],
            current: 0,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &Page {
        &self.pages[self.current]
    }

    pub fn current_page_mut(&mut self) -> &mut Page {
        &mut self.pages[self.current]
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Stamp `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    fn check_index(&self, index: usize) -> Result<(), DocumentError> {
        if index >= self.pages.len() {
            return Err(DocumentError::PageOutOfRange {
                index,
                page_count: self.pages.len(),
            });
        }
        Ok(())
    }

    fn reindex(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.index = i;
        }
    }

    /// Move the cursor. Returns `Ok(false)` if `index` is already current.
    pub fn switch_to_page(&mut self, index: usize) -> Result<bool, DocumentError> {
        self.check_index(index)?;
        if index == self.current {
            return Ok(false);
        }
        self.current = index;
        Ok(true)
    }

    /// Append a page and make it current.
    ///
    /// Size and template default to the current page's, so pages added from
    /// the remote device match what the user is already writing on.
    pub fn add_page(&mut self, page_size: Option<PageSize>, template: Option<Template>) -> usize {
        let current = self.current_page();
        let page_size = page_size.unwrap_or(current.page_size);
        let template = template.unwrap_or(current.template);

        let index = self.pages.len();
        self.pages.push(Page::new(index, page_size, template));
        self.current = index;
        index
    }

    /// Remove a page. The last remaining page can't be deleted.
    pub fn delete_page(&mut self, index: usize) -> Result<(), DocumentError> {
        self.check_index(index)?;
        if self.pages.len() <= 1 {
            return Err(DocumentError::LastPage);
        }

        self.pages.remove(index);
        self.reindex();

        if index < self.current {
            self.current -= 1;
        } else if self.current >= self.pages.len() {
            self.current = self.pages.len() - 1;
        }
        Ok(())
    }

    pub fn copy_page(&self, index: usize) -> Result<PageCopy, DocumentError> {
        self.check_index(index)?;
        Ok(self.pages[index].copy())
    }

    /// Insert a copy right after `after_index` without switching to it.
    ///
    /// Returns the new page's index.
    pub fn insert_page(&mut self, after_index: usize, copy: &PageCopy) -> Result<usize, DocumentError> {
        self.check_index(after_index)?;
        let at = after_index + 1;
        self.pages.insert(at, Page::from_copy(at, copy));
        self.reindex();

        if at <= self.current {
            self.current += 1;
        }
        Ok(at)
    }

    pub fn summary(&self) -> NotebookSummary {
        NotebookSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            page_count: self.pages.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for the notebook browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSummary {
    pub id: String,
    pub name: String,
    pub page_count: usize,
    pub created_at: u64,
    pub updated_at: u64,
}
