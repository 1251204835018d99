//! Area screenshots of a rendered page canvas

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbaImage, imageops};

use crate::error::{HighlightError, Result};

use super::types::Rect;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Capture `rect` (viewport pixels) from a page canvas as a PNG data URI.
///
/// `pixel_ratio` is canvas pixels per viewport pixel; the canvas of a HiDPI
/// rendering is larger than the viewport it backs. The output is sized in
/// viewport pixels. `canvas` is `None` until the page has been painted.
pub fn capture_area(
    canvas: Option<&RgbaImage>,
    page: u32,
    rect: &Rect,
    pixel_ratio: f64,
) -> Result<String> {
    let canvas = canvas
        .filter(|c| c.width() > 0 && c.height() > 0)
        .ok_or(HighlightError::CaptureUnavailable { page })?;

    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    };

    let source = Rect::new(
        rect.top * ratio,
        rect.left * ratio,
        rect.width * ratio,
        rect.height * ratio,
    )
    .clamp_to(f64::from(canvas.width()), f64::from(canvas.height()));
    if source.width <= 0.0 || source.height <= 0.0 {
        return Err(HighlightError::EmptyCapture { page });
    }

    let x = (source.left.floor() as u32).min(canvas.width() - 1);
    let y = (source.top.floor() as u32).min(canvas.height() - 1);
    let w = (source.width.round() as u32).clamp(1, canvas.width() - x);
    let h = (source.height.round() as u32).clamp(1, canvas.height() - y);

    let region = imageops::crop_imm(canvas, x, y, w, h).to_image();

    let out_w = ((source.width / ratio).round() as u32).max(1);
    let out_h = ((source.height / ratio).round() as u32).max(1);
    let region = if (out_w, out_h) == (w, h) {
        region
    } else {
        imageops::resize(&region, out_w, out_h, imageops::FilterType::Triangle)
    };

    encode_png_data_uri(region)
}

fn encode_png_data_uri(image: RgbaImage) -> Result<String> {
    let mut png: Vec<u8> = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let mut uri = String::with_capacity(PNG_DATA_URI_PREFIX.len() + png.len() * 4 / 3 + 4);
    uri.push_str(PNG_DATA_URI_PREFIX);
    STANDARD.encode_string(&png, &mut uri);
    Ok(uri)
}
