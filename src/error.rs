//! Error taxonomy for highlight geometry and overlay rendering

use crate::highlight::HighlightId;

/// Errors raised by the highlight core.
///
/// `EmptyInput` is a programmer error. `StaleViewport` and
/// `CaptureUnavailable` are renderer timing races: the synchronizer
/// skips the affected page and retries on the next render-complete event.
#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    #[error("bounding rect requested for an empty rect set")]
    EmptyInput,

    #[error("page {page} has not been painted yet, nothing to capture")]
    CaptureUnavailable { page: u32 },

    #[error("capture area lies outside the canvas of page {page}")]
    EmptyCapture { page: u32 },

    #[error("no viewport available for page {page}")]
    StaleViewport { page: u32 },

    #[error("selection is outside the tracked document container")]
    SelectionOutOfBounds,

    #[error("unknown highlight {0}")]
    UnknownHighlight(HighlightId),

    #[error("page {page} is outside the document (1..={page_count})")]
    InvalidPage { page: u32, page_count: u32 },

    #[error("failed to encode screenshot: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, HighlightError>;
