//! Page viewport and the viewport <-> scaled coordinate transform
//!
//! A [`PageViewport`] describes how one page is currently drawn: the PDF
//! view box, zoom scale and rotation, folded into a single affine transform
//! from PDF user space (origin bottom-left, y up) to viewport pixels (origin
//! top-left, y down).

use super::types::{Rect, Scaled, ScaledPosition, ViewportPosition};

/// Per-page viewport descriptor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageViewport {
    /// PDF user-space box `[x0, y0, x1, y1]`
    pub view_box: [f64; 4],
    pub scale: f64,
    /// Clockwise degrees, one of 0/90/180/270
    pub rotation: u16,
    pub offset_x: f64,
    pub offset_y: f64,
    width: f64,
    height: f64,
    transform: [f64; 6],
}

impl PageViewport {
    #[must_use]
    pub fn new(view_box: [f64; 4], scale: f64, rotation: i32) -> Self {
        Self::with_offset(view_box, scale, rotation, 0.0, 0.0)
    }

    #[must_use]
    pub fn with_offset(
        view_box: [f64; 4],
        scale: f64,
        rotation: i32,
        offset_x: f64,
        offset_y: f64,
    ) -> Self {
        let rotation = normalize_rotation(rotation);
        let center_x = (view_box[2] + view_box[0]) / 2.0;
        let center_y = (view_box[3] + view_box[1]) / 2.0;

        // Rotation matrix with the y flip folded in.
        let (a, b, c, d) = match rotation {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };

        let box_w = view_box[2] - view_box[0];
        let box_h = view_box[3] - view_box[1];
        let (canvas_x, canvas_y, width, height) = if a == 0.0 {
            (
                (center_y - view_box[1]).abs() * scale + offset_x,
                (center_x - view_box[0]).abs() * scale + offset_y,
                box_h * scale,
                box_w * scale,
            )
        } else {
            (
                (center_x - view_box[0]).abs() * scale + offset_x,
                (center_y - view_box[1]).abs() * scale + offset_y,
                box_w * scale,
                box_h * scale,
            )
        };

        let transform = [
            a * scale,
            b * scale,
            c * scale,
            d * scale,
            canvas_x - a * scale * center_x - c * scale * center_y,
            canvas_y - b * scale * center_x - d * scale * center_y,
        ];

        Self {
            view_box,
            scale,
            rotation,
            offset_x,
            offset_y,
            width,
            height,
            transform,
        }
    }

    /// Same page at a different zoom
    #[must_use]
    pub fn with_scale(&self, scale: f64) -> Self {
        Self::with_offset(
            self.view_box,
            scale,
            i32::from(self.rotation),
            self.offset_x,
            self.offset_y,
        )
    }

    /// Pixel width of the rendered page
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Pixel height of the rendered page
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[must_use]
    pub fn transform(&self) -> [f64; 6] {
        self.transform
    }

    /// PDF point to viewport pixels
    #[must_use]
    pub fn convert_to_viewport_point(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.transform;
        (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
    }

    /// PDF rect `[x1, y1, x2, y2]` to viewport corners, not normalised
    #[must_use]
    pub fn convert_to_viewport_rectangle(&self, rect: [f64; 4]) -> [f64; 4] {
        let (x1, y1) = self.convert_to_viewport_point(rect[0], rect[1]);
        let (x2, y2) = self.convert_to_viewport_point(rect[2], rect[3]);
        [x1, y1, x2, y2]
    }

    /// Viewport pixels back to a PDF point
    #[must_use]
    pub fn convert_to_pdf_point(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.transform;
        let det = m[0] * m[3] - m[1] * m[2];
        (
            (x * m[3] - y * m[2] + m[2] * m[5] - m[4] * m[3]) / det,
            (-x * m[1] + y * m[0] + m[4] * m[1] - m[5] * m[0]) / det,
        )
    }
}

fn normalize_rotation(rotation: i32) -> u16 {
    let degrees = rotation.rem_euclid(360);
    // Snap to the nearest quarter turn.
    (((degrees + 45) / 90 % 4) * 90) as u16
}

/// Viewport rect to its persisted form.
///
/// Always stores with the viewport's own top-left origin; the PDF-origin flag
/// only affects the opposite direction.
#[must_use]
pub fn viewport_to_scaled(rect: &Rect, viewport: &PageViewport) -> Scaled {
    Scaled::from_rect(rect, viewport.width(), viewport.height())
}

/// Viewport rect to PDF user-space corners, for positions persisted with
/// `use_pdf_coordinates` set. Inverse of the PDF branch of
/// [`scaled_to_viewport`].
#[must_use]
pub fn viewport_to_pdf(rect: &Rect, viewport: &PageViewport) -> Scaled {
    let (x1, y1) = viewport.convert_to_pdf_point(rect.left, rect.top);
    let (x2, y2) = viewport.convert_to_pdf_point(rect.right(), rect.bottom());
    Scaled {
        x1: x1.min(x2),
        y1: y1.min(y2),
        x2: x1.max(x2),
        y2: y1.max(y2),
        width: viewport.width(),
        height: viewport.height(),
    }
}

/// Project a persisted rect through the live viewport
#[must_use]
pub fn scaled_to_viewport(scaled: &Scaled, viewport: &PageViewport, use_pdf_coordinates: bool) -> Rect {
    if use_pdf_coordinates {
        let [x1, y1, x2, y2] =
            viewport.convert_to_viewport_rectangle([scaled.x1, scaled.y1, scaled.x2, scaled.y2]);
        return Rect::from_corners(x1, y1, x2, y2);
    }

    let sx = ratio(viewport.width(), scaled.width);
    let sy = ratio(viewport.height(), scaled.height);
    let x1 = scaled.x1 * sx;
    let y1 = scaled.y1 * sy;
    let x2 = scaled.x2 * sx;
    let y2 = scaled.y2 * sy;

    Rect::new(y1, x1, x2 - x1, y2 - y1)
}

/// A zero reference size means the rect was stored against this very viewport.
fn ratio(live: f64, stored: f64) -> f64 {
    if stored > 0.0 { live / stored } else { 1.0 }
}

#[must_use]
pub fn scaled_position_to_viewport(
    position: &ScaledPosition,
    viewport: &PageViewport,
) -> ViewportPosition {
    let flag = position.use_pdf_coordinates;
    ViewportPosition {
        page_number: position.page_number,
        bounding_rect: scaled_to_viewport(&position.bounding_rect, viewport, flag),
        rects: position
            .rects
            .iter()
            .map(|rect| scaled_to_viewport(rect, viewport, flag))
            .collect(),
    }
}

#[must_use]
pub fn viewport_position_to_scaled(
    position: &ViewportPosition,
    viewport: &PageViewport,
) -> ScaledPosition {
    ScaledPosition {
        page_number: position.page_number,
        bounding_rect: viewport_to_scaled(&position.bounding_rect, viewport),
        rects: position
            .rects
            .iter()
            .map(|rect| viewport_to_scaled(rect, viewport))
            .collect(),
        use_pdf_coordinates: false,
    }
}
