//! Interface to the document renderer the overlay sits on top of
//!
//! Rasterization, text layers and scrolling belong to the renderer; the
//! overlay only reads page geometry from it and asks it to scroll.

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::coordinates::PageViewport;

/// Opaque handle to a page's text-layer container.
///
/// Renderers hand out a new handle when they rebuild a page's text layer,
/// e.g. after a zoom change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerContainer(pub u64);

/// Lifecycle notifications emitted by the renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererEvent {
    DocumentReady,
    TextLayerRendered(u32),
}

/// How the renderer should size pages.
///
/// Serialized the way PDF viewers take it: a preset name such as
/// `page-width`, or a bare zoom factor such as `1.5`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScaleValueRepr", into = "ScaleValueRepr")]
pub enum ScaleValue {
    #[default]
    Auto,
    PageWidth,
    PageFit,
    PageActual,
    Custom(f64),
}

impl fmt::Display for ScaleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleValue::Auto => f.write_str("auto"),
            ScaleValue::PageWidth => f.write_str("page-width"),
            ScaleValue::PageFit => f.write_str("page-fit"),
            ScaleValue::PageActual => f.write_str("page-actual"),
            ScaleValue::Custom(scale) => write!(f, "{scale}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScaleValueRepr {
    Factor(f64),
    Named(String),
}

impl TryFrom<ScaleValueRepr> for ScaleValue {
    type Error = String;

    fn try_from(repr: ScaleValueRepr) -> Result<Self, Self::Error> {
        let factor = match repr {
            ScaleValueRepr::Factor(factor) => factor,
            ScaleValueRepr::Named(name) => match name.as_str() {
                "auto" => return Ok(ScaleValue::Auto),
                "page-width" => return Ok(ScaleValue::PageWidth),
                "page-fit" => return Ok(ScaleValue::PageFit),
                "page-actual" => return Ok(ScaleValue::PageActual),
                other => other
                    .parse::<f64>()
                    .map_err(|_| format!("unknown scale value {other:?}"))?,
            },
        };
        if factor.is_finite() && factor > 0.0 {
            Ok(ScaleValue::Custom(factor))
        } else {
            Err(format!("scale factor must be positive, got {factor}"))
        }
    }
}

impl From<ScaleValue> for ScaleValueRepr {
    fn from(value: ScaleValue) -> Self {
        match value {
            ScaleValue::Custom(factor) => ScaleValueRepr::Factor(factor),
            preset => ScaleValueRepr::Named(preset.to_string()),
        }
    }
}

/// Pages are 1-based throughout.
pub trait DocumentRenderer {
    fn page_count(&self) -> u32;

    /// `None` until the page has been laid out
    fn page_viewport(&self, page: u32) -> Option<PageViewport>;

    /// `None` until the page has been painted
    fn page_canvas(&self, page: u32) -> Option<&RgbaImage>;

    /// `None` until the page's text layer exists
    fn text_layer_container(&self, page: u32) -> Option<LayerContainer>;

    /// Scroll so that `y_offset` viewport pixels into `page` is at the top
    fn scroll_page_into_view(&mut self, page: u32, y_offset: f64);

    /// Re-evaluate page scale, typically re-rendering visible pages
    fn set_scale_value(&mut self, scale: ScaleValue);
}
