//! In-flight stroke assembly.
//!
//! Points arrive in small batches (remote `stroke_update` frames or local
//! pointer moves). The assembler accumulates them per stroke id until the
//! stroke is completed, at which point ownership moves to the page's
//! [`ActionHistory`](crate::history::ActionHistory).
//!
//! ```text
//! batch [p1,p2] ──► append_points ──► 0..2   (render segment 0..2)
//! batch [p3,p4] ──► append_points ──► 2..4   (render segment 2..4)
//! complete      ──► Stroke{p1..p4} ──► Action::AddStroke
//! ```

use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexSet;

use crate::stroke::{Point, Stroke, StrokeId, StrokeStyle};

/// How many completed ids are remembered for rejecting late batches.
pub const FINISHED_CAPACITY: usize = 1024;

/// Accumulates open strokes keyed by id.
#[derive(Debug)]
pub struct StrokeAssembler {
    open: HashMap<StrokeId, Stroke>,
    /// Recently completed ids, oldest first; late batches for these are
    /// rejected.
    finished: IndexSet<StrokeId>,
    finished_capacity: usize,
}

impl Default for StrokeAssembler {
    fn default() -> Self {
        Self::with_finished_capacity(FINISHED_CAPACITY)
    }
}

impl StrokeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember at most `capacity` completed ids (at least one).
    pub fn with_finished_capacity(capacity: usize) -> Self {
        Self {
            open: HashMap::new(),
            finished: IndexSet::new(),
            finished_capacity: capacity.max(1),
        }
    }

    fn mark_finished(&mut self, id: StrokeId) {
        self.finished.shift_remove(&id);
        self.finished.insert(id);
        if self.finished.len() > self.finished_capacity {
            self.finished.shift_remove_index(0);
        }
    }

    /// Return the open stroke for `id`, creating it with `defaults` if unseen.
    ///
    /// Returns `None` if `id` was already completed.
    pub fn begin_or_get(&mut self, id: &StrokeId, defaults: StrokeStyle) -> Option<&mut Stroke> {
        if self.finished.contains(id) {
            log::debug!("Ignoring batch for completed stroke {id}");
            return None;
        }
        Some(
            self.open
                .entry(id.clone())
                .or_insert_with(|| Stroke::new(id.clone(), defaults)),
        )
    }

    /// Append points to an open stroke, returning the index range added.
    ///
    /// Points already in the stroke are never touched, so a renderer can draw
    /// only the new segment (plus the joint to the previous point).
    pub fn append_points(
        &mut self,
        id: &StrokeId,
        points: impl IntoIterator<Item = Point>,
    ) -> Option<Range<usize>> {
        let stroke = self.open.get_mut(id)?;
        let start = stroke.points.len();
        stroke.points.extend(points);
        Some(start..stroke.points.len())
    }

    /// Close a stroke and hand it over for committing.
    ///
    /// Unknown ids and strokes with no points produce nothing.
    pub fn complete(&mut self, id: &StrokeId) -> Option<Stroke> {
        let stroke = self.open.remove(id)?;
        self.mark_finished(id.clone());
        if stroke.points.is_empty() {
            log::debug!("Dropping empty stroke {id}");
            return None;
        }
        Some(stroke)
    }

    /// Drop a single open stroke without committing it.
    ///
    /// Late batches for a discarded id are rejected like those of a
    /// completed one.
    pub fn discard(&mut self, id: &StrokeId) -> Option<Stroke> {
        let stroke = self.open.remove(id)?;
        self.mark_finished(id.clone());
        Some(stroke)
    }

    /// Drop every open stroke. Returns how many were discarded.
    pub fn discard_all(&mut self) -> usize {
        let ids: Vec<StrokeId> = self.open.drain().map(|(id, _)| id).collect();
        let n = ids.len();
        for id in ids {
            self.mark_finished(id);
        }
        n
    }

    /// Forget open strokes and the completed-id set.
    pub fn reset(&mut self) {
        self.open.clear();
        self.finished.clear();
    }

    pub fn get(&self, id: &StrokeId) -> Option<&Stroke> {
        self.open.get(id)
    }

    pub fn is_open(&self, id: &StrokeId) -> bool {
        self.open.contains_key(id)
    }

    /// Open strokes, for full redraws.
    pub fn open_strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.open.values()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(i: u32) -> Point {
        let v = f64::from(i) / 10.0;
        Point::new(v, v, 0.5, f64::from(i))
    }

    #[test]
    fn test_batches_reassemble_in_order() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("s1");

        asm.begin_or_get(&id, StrokeStyle::default()).unwrap();
        assert_eq!(asm.append_points(&id, [p(1), p(2)]), Some(0..2));
        assert_eq!(asm.append_points(&id, [p(3), p(4)]), Some(2..4));

        let stroke = asm.complete(&id).unwrap();
        assert_eq!(stroke.points, vec![p(1), p(2), p(3), p(4)]);
        assert!(asm.is_empty());
    }

    #[test]
    fn test_begin_or_get_returns_existing() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("s1");
        let style = StrokeStyle {
            color: "#e53935".into(),
            width: 4.0,
            ..StrokeStyle::default()
        };

        asm.begin_or_get(&id, style).unwrap();
        asm.append_points(&id, [p(1)]);

        // Second call keeps the first style and the points
        let stroke = asm.begin_or_get(&id, StrokeStyle::default()).unwrap();
        assert_eq!(stroke.color, "#e53935");
        assert_eq!(stroke.points.len(), 1);
        assert_eq!(asm.len(), 1);
    }

    #[test]
    fn test_complete_unknown_is_noop() {
        let mut asm = StrokeAssembler::new();
        assert!(asm.complete(&StrokeId::from("never")).is_none());
    }

    #[test]
    fn test_duplicate_complete_is_noop() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("s1");
        asm.begin_or_get(&id, StrokeStyle::default());
        asm.append_points(&id, [p(1)]);

        assert!(asm.complete(&id).is_some());
        assert!(asm.complete(&id).is_none());
    }

    #[test]
    fn test_empty_stroke_produces_nothing() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("empty");
        asm.begin_or_get(&id, StrokeStyle::default());
        assert!(asm.complete(&id).is_none());
        assert!(!asm.is_open(&id));
    }

    #[test]
    fn test_late_batch_after_complete_rejected() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("s1");
        asm.begin_or_get(&id, StrokeStyle::default());
        asm.append_points(&id, [p(1)]);
        asm.complete(&id);

        assert!(asm.begin_or_get(&id, StrokeStyle::default()).is_none());
        assert!(asm.append_points(&id, [p(2)]).is_none());
        assert!(asm.is_empty());
    }

    #[test]
    fn test_append_to_unknown_stroke() {
        let mut asm = StrokeAssembler::new();
        assert!(asm.append_points(&StrokeId::from("x"), [p(1)]).is_none());
    }

    #[test]
    fn test_discard_all() {
        let mut asm = StrokeAssembler::new();
        for id in ["a", "b"] {
            asm.begin_or_get(&StrokeId::from(id), StrokeStyle::default());
        }
        assert_eq!(asm.discard_all(), 2);
        assert!(asm.is_empty());

        // Stragglers for a discarded stroke don't resurrect it
        assert!(asm.begin_or_get(&StrokeId::from("a"), StrokeStyle::default()).is_none());
    }

    #[test]
    fn test_discard_single() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("a");
        asm.begin_or_get(&id, StrokeStyle::default());
        asm.append_points(&id, [p(1)]);

        assert_eq!(asm.discard(&id).map(|s| s.points.len()), Some(1));
        assert!(asm.discard(&id).is_none());
        assert!(asm.complete(&id).is_none());
    }

    #[test]
    fn test_finished_ids_are_bounded() {
        let mut asm = StrokeAssembler::with_finished_capacity(2);
        for name in ["a", "b", "c"] {
            let id = StrokeId::from(name);
            asm.begin_or_get(&id, StrokeStyle::default());
            asm.append_points(&id, [p(1)]);
            asm.complete(&id).unwrap();
        }

        // "a" aged out, the two most recent are still rejected
        assert!(asm.begin_or_get(&StrokeId::from("a"), StrokeStyle::default()).is_some());
        assert!(asm.begin_or_get(&StrokeId::from("b"), StrokeStyle::default()).is_none());
        assert!(asm.begin_or_get(&StrokeId::from("c"), StrokeStyle::default()).is_none());
    }

    #[test]
    fn test_many_completed_strokes_keep_memory_flat() {
        let mut asm = StrokeAssembler::new();
        for i in 0..(FINISHED_CAPACITY * 3) {
            let id = StrokeId::from(format!("s{i}"));
            asm.begin_or_get(&id, StrokeStyle::default());
            asm.append_points(&id, [p(1)]);
            asm.complete(&id);
        }
        assert_eq!(asm.finished.len(), FINISHED_CAPACITY);
        assert!(asm.is_empty());
    }

    #[test]
    fn test_reset_allows_id_reuse() {
        let mut asm = StrokeAssembler::new();
        let id = StrokeId::from("s1");
        asm.begin_or_get(&id, StrokeStyle::default());
        asm.append_points(&id, [p(1)]);
        asm.complete(&id);

        asm.reset();
        assert!(asm.begin_or_get(&id, StrokeStyle::default()).is_some());
    }
}
