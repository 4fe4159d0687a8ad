//! Nearest-stroke hit-testing for the eraser.
//!
//! One call erases at most one stroke: the one whose polyline passes closest
//! to the touch point, provided it lies strictly within [`ERASE_THRESHOLD`].
//! A drag gesture issues one call per pointer sample.

use std::sync::Arc;

use crate::geometry::Vec2;
use crate::stroke::{Stroke, StrokeId};

/// Hit radius in normalized units (≈1.5% of the page).
pub const ERASE_THRESHOLD: f64 = 0.015;

/// Result of a successful hit test.
#[derive(Debug, Clone, PartialEq)]
pub struct EraseHit {
    pub stroke_id: StrokeId,
    pub distance: f64,
}

/// Find the stroke nearest to `at`, if any is closer than `threshold`.
///
/// Ties keep the earliest stroke in iteration order.
pub fn nearest_stroke<'a, I>(strokes: I, at: Vec2, threshold: f64) -> Option<EraseHit>
where
    I: IntoIterator<Item = &'a Arc<Stroke>>,
{
    let mut best: Option<EraseHit> = None;
    for stroke in strokes {
        let distance = stroke.distance_to(at);
        if distance >= threshold {
            continue;
        }
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(EraseHit {
                stroke_id: stroke.id.clone(),
                distance,
            });
        }
    }
    best
}
