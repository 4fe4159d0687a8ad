//! Distance primitives for erase hit-testing.
//!
//! All coordinates are normalized page coordinates (`[0, 1]` on both axes,
//! origin top-left), so distances are fractions of the page's logical size.
//!
//! Reference: Ericson, Real-Time Collision Detection, Section 5.1.2

use serde::{Deserialize, Serialize};

/// 2D position in normalized page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation toward `target` by factor `t` ∈ [0, 1].
    pub fn lerp(&self, target: &Vec2, t: f64) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }
}

impl Default for Vec2 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Distance from `p` to the closed segment `a → b`.
///
/// Projects `p` onto the segment's supporting line, clamps the projection
/// parameter to `[0, 1]` and measures to the clamped point. A degenerate
/// segment (`a == b`) falls back to point distance.
pub fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(&a);
    }

    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(&a.lerp(&b, t))
}

/// Minimum distance from `p` to the polyline through `points`.
///
/// One point → point distance; two or more → minimum over consecutive
/// segments. An empty polyline is infinitely far away.
pub fn polyline_distance(p: Vec2, points: impl IntoIterator<Item = Vec2>) -> f64 {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return f64::INFINITY;
    };

    let mut prev = first;
    let mut min = f64::INFINITY;
    let mut segments = 0usize;
    for next in iter {
        min = min.min(segment_distance(p, prev, next));
        prev = next;
        segments += 1;
    }

    if segments == 0 {
        p.distance(&first)
    } else {
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_point_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(0.3, 0.4);
        assert!((a.distance(&b) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_segment_distance_perpendicular() {
        let d = segment_distance(
            Vec2::new(0.5, 0.005),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
        );
        assert!((d - 0.005).abs() < EPS);
    }

    #[test]
    fn test_segment_distance_clamps_to_endpoints() {
        let a = Vec2::new(0.2, 0.2);
        let b = Vec2::new(0.4, 0.2);

        // Beyond b: distance measured to b, not to the infinite line
        let d = segment_distance(Vec2::new(0.7, 0.6), a, b);
        assert!((d - 0.5).abs() < EPS);

        // Before a
        let d = segment_distance(Vec2::new(0.2, 0.0), a, b);
        assert!((d - 0.2).abs() < EPS);
    }

    #[test]
    fn test_segment_distance_degenerate() {
        let a = Vec2::new(0.5, 0.5);
        let d = segment_distance(Vec2::new(0.5, 0.6), a, a);
        assert!((d - 0.1).abs() < EPS);
    }

    #[test]
    fn test_polyline_single_point() {
        let d = polyline_distance(Vec2::new(0.0, 0.1), [Vec2::new(0.0, 0.0)]);
        assert!((d - 0.1).abs() < EPS);
    }

    #[test]
    fn test_polyline_takes_minimum_segment() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        // Closer to the vertical segment than to the horizontal one
        let d = polyline_distance(Vec2::new(0.95, 0.5), pts);
        assert!((d - 0.05).abs() < EPS);
    }

    #[test]
    fn test_polyline_empty_is_infinite() {
        let d = polyline_distance(Vec2::ZERO, std::iter::empty());
        assert!(d.is_infinite());
    }

    #[test]
    fn test_lerp() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.5);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid, Vec2::new(0.5, 0.25));
    }
}
