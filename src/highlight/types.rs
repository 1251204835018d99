//! Core types for highlight geometry
//!
//! Two coordinate spaces are in play. Viewport rects are pixels relative to
//! the current rendering of one page and go stale on every zoom. Scaled rects
//! carry the size of the viewport they were measured against, so they can be
//! re-projected through whatever viewport is live at render time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned box, `{top, left, width, height}`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Build from two arbitrary corners, normalising so width/height are non-negative
    #[must_use]
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            top: y1.min(y2),
            left: x1.min(x2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// True if `other` lies inside `self`, edges included
    #[must_use]
    pub fn contains(&self, other: &Rect, tolerance: f64) -> bool {
        other.left >= self.left - tolerance
            && other.top >= self.top - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }

    /// Smallest rect covering both
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        Rect {
            top,
            left,
            width: self.right().max(other.right()) - left,
            height: self.bottom().max(other.bottom()) - top,
        }
    }

    /// Clip to `[0, width] x [0, height]`
    #[must_use]
    pub fn clamp_to(&self, width: f64, height: f64) -> Rect {
        let left = self.left.clamp(0.0, width);
        let top = self.top.clamp(0.0, height);
        let right = self.right().clamp(0.0, width);
        let bottom = self.bottom().clamp(0.0, height);
        Rect {
            top,
            left,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }
}

/// Persisted rect: two corners plus the viewport size they were measured in.
///
/// When the owning position has `use_pdf_coordinates` set, the corners are
/// PDF user-space points instead and `width`/`height` are informational.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaled {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub height: f64,
}

impl Scaled {
    /// Scaled rect from an LTWH box measured against a `width` x `height` viewport
    #[must_use]
    pub fn from_rect(rect: &Rect, width: f64, height: f64) -> Self {
        Self {
            x1: rect.left,
            y1: rect.top,
            x2: rect.right(),
            y2: rect.bottom(),
            width,
            height,
        }
    }

    /// The stored corners as an LTWH box in the reference space
    #[must_use]
    pub fn as_rect(&self) -> Rect {
        Rect::from_corners(self.x1, self.y1, self.x2, self.y2)
    }
}

/// Persisted, resolution-independent highlight geometry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaledPosition {
    /// 1-based page number
    pub page_number: u32,
    pub bounding_rect: Scaled,
    #[serde(default)]
    pub rects: Vec<Scaled>,
    #[serde(default)]
    pub use_pdf_coordinates: bool,
}

/// Geometry relative to the current rendering of a page. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportPosition {
    pub page_number: u32,
    pub bounding_rect: Rect,
    pub rects: Vec<Rect>,
}

/// What a highlight covers: extracted text, a captured image, or both
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `data:image/png;base64,...`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        Self {
            text: None,
            image: Some(data_uri.into()),
        }
    }
}

/// Caller-assigned highlight identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(pub String);

impl HighlightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HighlightId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A persisted annotation. The core only reads these; `data` is the caller's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Highlight<H> {
    pub id: HighlightId,
    pub position: ScaledPosition,
    #[serde(default)]
    pub content: Content,
    pub data: H,
}

/// In-progress highlight held only in transient state
#[derive(Clone, Debug, PartialEq)]
pub struct GhostHighlight {
    pub position: ScaledPosition,
    pub content: Content,
}

/// A highlight projected through the live viewport for one render pass
#[derive(Debug)]
pub struct ViewportHighlight<'a, H> {
    /// `None` for the ghost highlight
    pub id: Option<&'a HighlightId>,
    pub position: ViewportPosition,
    pub content: &'a Content,
    pub data: Option<&'a H>,
}

impl<H> ViewportHighlight<'_, H> {
    #[must_use]
    pub fn is_ghost(&self) -> bool {
        self.id.is_none()
    }
}
