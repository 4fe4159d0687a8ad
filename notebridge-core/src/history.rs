//! Per-page undo/redo log.
//!
//! ```text
//!  baseline ─► actions[0] ─► actions[1] ─► … ─► actions[applied-1] │ redo stack …
//!                                                                  ▲
//!                                                               cursor
//! ```
//!
//! The visible page is never stored: it is derived by replaying the applied
//! prefix of the log over the baseline (strokes loaded from disk). Undo and
//! redo only move the cursor, so no inverse operations are kept.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::stroke::{Stroke, StrokeId};

/// Insertion-ordered map of visible strokes (first = bottom of the z-order).
pub type ActiveStrokes = IndexMap<StrokeId, Arc<Stroke>>;

/// One undoable page mutation.
///
/// Strokes are shared behind `Arc` so that replay never copies point data
/// and a committed stroke can't be mutated through the log.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddStroke(Arc<Stroke>),
    EraseStroke(StrokeId),
    Clear,
}

impl Action {
    pub fn add_stroke(stroke: Stroke) -> Self {
        Action::AddStroke(Arc::new(stroke))
    }

    fn apply(&self, strokes: &mut ActiveStrokes) {
        match self {
            Action::AddStroke(stroke) => {
                strokes.insert(stroke.id.clone(), Arc::clone(stroke));
            }
            Action::EraseStroke(id) => {
                strokes.shift_remove(id);
            }
            Action::Clear => strokes.clear(),
        }
    }
}

/// Append/undo/redo log for a single page.
#[derive(Debug, Clone, Default)]
pub struct ActionHistory {
    /// Synthetic initial state; not undoable.
    baseline: ActiveStrokes,
    actions: Vec<Action>,
    /// Number of applied actions. Invariant: `applied <= actions.len()`.
    applied: usize,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log whose initial state is `strokes`, with nothing to undo.
    pub fn with_baseline(strokes: impl IntoIterator<Item = Stroke>) -> Self {
        let mut history = Self::new();
        history.reset_with(strokes);
        history
    }

    /// Append an action, discarding everything after the cursor.
    pub fn push(&mut self, action: Action) {
        self.actions.truncate(self.applied);
        self.actions.push(action);
        self.applied = self.actions.len();
    }

    /// Step back one action. Returns the action that was un-applied.
    pub fn undo(&mut self) -> Option<&Action> {
        if !self.can_undo() {
            return None;
        }
        self.applied -= 1;
        self.actions.get(self.applied)
    }

    /// Re-apply the next action on the redo stack.
    pub fn redo(&mut self) -> Option<&Action> {
        if !self.can_redo() {
            return None;
        }
        self.applied += 1;
        self.actions.get(self.applied - 1)
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.actions.len()
    }

    /// Index of the last applied action; `None` when nothing is applied.
    pub fn pointer(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    /// Replay the baseline and the applied prefix.
    pub fn active_strokes(&self) -> ActiveStrokes {
        let mut strokes = self.baseline.clone();
        for action in &self.actions[..self.applied] {
            action.apply(&mut strokes);
        }
        strokes
    }

    /// Forget every action and the baseline.
    pub fn reset(&mut self) {
        self.baseline.clear();
        self.actions.clear();
        self.applied = 0;
    }

    /// Forget every action and install `strokes` as the new baseline.
    pub fn reset_with(&mut self, strokes: impl IntoIterator<Item = Stroke>) {
        self.reset();
        for stroke in strokes {
            self.baseline.insert(stroke.id.clone(), Arc::new(stroke));
        }
    }

    /// All recorded actions, including the redo stack.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{Point, StrokeStyle};

    fn stroke(id: &str) -> Stroke {
        let mut s = Stroke::new(StrokeId::from(id), StrokeStyle::default());
        s.points.push(Point::new(0.1, 0.1, 0.5, 0.0));
        s
    }

    fn ids(strokes: &ActiveStrokes) -> Vec<&str> {
        strokes.keys().map(StrokeId::as_str).collect()
    }

    #[test]
    fn test_empty_history() {
        let mut h = ActionHistory::new();
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.pointer(), None);
        assert!(h.undo().is_none());
        assert!(h.redo().is_none());
        assert!(h.active_strokes().is_empty());
    }

    #[test]
    fn test_push_undo_redo() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.push(Action::add_stroke(stroke("b")));
        assert_eq!(h.pointer(), Some(1));
        assert_eq!(ids(&h.active_strokes()), vec!["a", "b"]);

        let undone = h.undo().cloned();
        assert!(matches!(undone, Some(Action::AddStroke(s)) if s.id.as_str() == "b"));
        assert_eq!(ids(&h.active_strokes()), vec!["a"]);
        assert!(h.can_redo());

        let redone = h.redo().cloned();
        assert!(matches!(redone, Some(Action::AddStroke(s)) if s.id.as_str() == "b"));
        assert_eq!(ids(&h.active_strokes()), vec!["a", "b"]);
        assert!(!h.can_redo());
    }

    #[test]
    fn test_push_after_undo_discards_redo() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.undo();
        h.push(Action::add_stroke(stroke("b")));

        // "a" was discarded: only the single new action remains after the truncate
        assert_eq!(h.len(), 1);
        assert!(!h.can_redo());
        assert_eq!(ids(&h.active_strokes()), vec!["b"]);
    }

    #[test]
    fn test_push_undo_push_leaves_two_actions() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.push(Action::add_stroke(stroke("b")));
        h.undo();
        h.push(Action::add_stroke(stroke("c")));

        assert_eq!(h.len(), 2);
        assert!(!h.can_redo());
        assert_eq!(ids(&h.active_strokes()), vec!["a", "c"]);
    }

    #[test]
    fn test_undo_redo_idempotent_at_ends() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));

        h.undo();
        assert!(h.undo().is_none());
        assert_eq!(h.pointer(), None);

        h.redo();
        assert!(h.redo().is_none());
        assert_eq!(h.pointer(), Some(0));
    }

    #[test]
    fn test_erase_and_clear_replay() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.push(Action::add_stroke(stroke("b")));
        h.push(Action::add_stroke(stroke("c")));
        h.push(Action::EraseStroke(StrokeId::from("b")));
        assert_eq!(ids(&h.active_strokes()), vec!["a", "c"]);

        h.push(Action::Clear);
        assert!(h.active_strokes().is_empty());

        h.undo();
        assert_eq!(ids(&h.active_strokes()), vec!["a", "c"]);
    }

    #[test]
    fn test_erase_unknown_id_is_noop() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.push(Action::EraseStroke(StrokeId::from("missing")));
        assert_eq!(ids(&h.active_strokes()), vec!["a"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.push(Action::add_stroke(stroke("b")));

        let mut replacement = stroke("a");
        replacement.width = 9.0;
        h.push(Action::add_stroke(replacement));

        let active = h.active_strokes();
        assert_eq!(ids(&active), vec!["a", "b"]);
        assert_eq!(active[0].width, 9.0);
    }

    #[test]
    fn test_replay_independent_of_path() {
        // Same pointer reached through different undo/redo sequences
        let mut h = ActionHistory::new();
        for id in ["a", "b", "c"] {
            h.push(Action::add_stroke(stroke(id)));
        }
        h.push(Action::EraseStroke(StrokeId::from("a")));

        h.undo();
        h.undo();
        let direct = h.active_strokes();

        h.undo();
        h.undo();
        h.redo();
        h.redo();
        h.undo();
        h.redo();
        assert_eq!(h.pointer(), Some(1));
        assert_eq!(h.active_strokes(), direct);
        assert_eq!(ids(&direct), vec!["a", "b"]);
    }

    #[test]
    fn test_baseline_not_undoable() {
        let mut h = ActionHistory::with_baseline(vec![stroke("saved1"), stroke("saved2")]);
        assert!(!h.can_undo());
        assert_eq!(ids(&h.active_strokes()), vec!["saved1", "saved2"]);

        h.push(Action::EraseStroke(StrokeId::from("saved1")));
        assert_eq!(ids(&h.active_strokes()), vec!["saved2"]);

        h.undo();
        assert_eq!(ids(&h.active_strokes()), vec!["saved1", "saved2"]);
        assert!(h.undo().is_none());
    }

    #[test]
    fn test_reset() {
        let mut h = ActionHistory::with_baseline(vec![stroke("x")]);
        h.push(Action::add_stroke(stroke("a")));
        h.reset();
        assert!(h.is_empty());
        assert_eq!(h.pointer(), None);
        assert!(h.active_strokes().is_empty());
    }

    #[test]
    fn test_erased_id_readded_goes_to_top() {
        let mut h = ActionHistory::new();
        h.push(Action::add_stroke(stroke("a")));
        h.push(Action::add_stroke(stroke("b")));
        h.push(Action::EraseStroke(StrokeId::from("a")));
        h.push(Action::add_stroke(stroke("a")));
        assert_eq!(ids(&h.active_strokes()), vec!["b", "a"]);
    }
}
