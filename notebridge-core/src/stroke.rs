//! Ink primitives: pressure-tagged points and strokes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{polyline_distance, Vec2};

/// Default ink color (hex RGB).
pub const DEFAULT_COLOR: &str = "#000000";
/// Default stroke width in logical units.
pub const DEFAULT_WIDTH: f64 = 2.0;

/// Opaque stroke identifier.
///
/// Remote devices mint their own ids (usually UUID strings), so this is a
/// string newtype rather than a `Uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(String);

impl StrokeId {
    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StrokeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StrokeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single captured sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Normalized horizontal position, 0.0 = left edge.
    pub x: f64,
    /// Normalized vertical position, 0.0 = top edge.
    pub y: f64,
    /// Pen pressure in `[0, 1]`.
    pub pressure: f64,
    /// Capture time in milliseconds.
    pub timestamp: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp: f64) -> Self {
        Self {
            x,
            y,
            pressure,
            timestamp,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// All components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.pressure.is_finite()
            && self.timestamp.is_finite()
    }
}

/// Drawing tool that produced a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
}

/// Visual attributes shared by every point of a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
    pub tool: Tool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            width: DEFAULT_WIDTH,
            tool: Tool::Pen,
        }
    }
}

/// One continuous ink mark from pointer-down to pointer-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
    #[serde(default)]
    pub tool: Tool,
}

impl Stroke {
    /// Create an empty stroke with the given style.
    pub fn new(id: StrokeId, style: StrokeStyle) -> Self {
        Self {
            id,
            points: Vec::new(),
            color: style.color,
            width: style.width,
            tool: style.tool,
        }
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.color.clone(),
            width: self.width,
            tool: self.tool,
        }
    }

    /// A tap: exactly one point.
    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }

    /// Radius of the dot drawn for a one-point stroke (`width × pressure / 2`).
    pub fn dot_radius(&self) -> Option<f64> {
        match self.points.as_slice() {
            [p] => Some(self.width * p.pressure / 2.0),
            _ => None,
        }
    }

    /// Mean pressure over all points, used for fixed-width renderers.
    pub fn average_pressure(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        let sum: f64 = self.points.iter().map(|p| p.pressure).sum();
        Some(sum / self.points.len() as f64)
    }

    /// Distance from `p` to this stroke's polyline.
    pub fn distance_to(&self, p: Vec2) -> f64 {
        polyline_distance(p, self.points.iter().map(Point::position))
    }
}
