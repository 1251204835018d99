//! Highlight overlay for paged documents

mod coordinates;
mod debounce;
mod rects;
mod renderer;
mod screenshot;
mod selection;
mod synchronizer;
mod types;

pub use coordinates::{
    PageViewport, scaled_position_to_viewport, scaled_to_viewport, viewport_position_to_scaled,
    viewport_to_pdf, viewport_to_scaled,
};
pub use debounce::Debouncer;
pub use rects::{OptimizerConfig, get_bounding_rect, optimize_client_rects};
pub use renderer::{DocumentRenderer, LayerContainer, RendererEvent, ScaleValue};
pub use screenshot::capture_area;
pub use selection::{
    AreaDrag, ContainerGeometry, PendingSelection, SelectionCapture, SelectionChange,
    SelectionKind, SelectionOutcome, SelectionState, SelectionTicket, TextRange,
};
pub use synchronizer::{
    HighlightTransformFn, OverlayLayer, OverlaySynchronizer, SelectionFinishedFn, Tip, TipAnchor,
    TipRenderFn, TransformContext,
};
pub use types::*;
