pub mod error;
pub mod event_source;
pub mod highlight;
pub mod logging;
pub mod settings;

pub mod test_utils;

pub use error::{HighlightError, Result};
pub use highlight::{
    DocumentRenderer, Highlight, HighlightId, OverlaySynchronizer, PageViewport, ScaledPosition,
};
pub use settings::HighlighterSettings;
