//! Page-space rectangles and planned redaction regions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Axis-aligned rectangle in normalized page coordinates.
///
/// The origin is the top-left corner of the page and all values lie in
/// `[0, 1]`, so rectangles are independent of the page's point size and of
/// any render scale. Invariant: `x0 < x1` and `y0 < y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Builds a rectangle, clamping it to page bounds. Returns `None` for
    /// degenerate input (zero or negative extent after clamping).
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Self> {
        let rect = Rect {
            x0: x0.clamp(0.0, 1.0),
            y0: y0.clamp(0.0, 1.0),
            x1: x1.clamp(0.0, 1.0),
            y1: y1.clamp(0.0, 1.0),
        };
        if rect.x0 < rect.x1 && rect.y0 < rect.y1 {
            Some(rect)
        } else {
            None
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    /// Quantized position key. Two hits on the same spot produced by
    /// different rules collapse to one rectangle.
    pub(crate) fn position_key(&self) -> String {
        format!(
            "{:.3},{:.3},{:.3},{:.3}",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

/// Drops rectangles whose quantized position was already seen, preserving
/// first-seen order.
pub(crate) fn dedup_rects(rects: Vec<Rect>) -> Vec<Rect> {
    let mut seen: HashSet<String> = HashSet::new();
    rects
        .into_iter()
        .filter(|r| seen.insert(r.position_key()))
        .collect()
}

/// Fill painted over a committed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Strip the text and paint a solid black rectangle.
    SolidBlack,
    /// Strip the text, paint nothing.
    NoFill,
}

/// A planned redaction: where to obliterate and what to paint there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionRegion {
    pub rect: Rect,
    pub fill: FillPolicy,
}
