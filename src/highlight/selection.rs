//! Selection capture state machine
//!
//! Tracks one user interaction at a time, text range or area drag, from the
//! first selection event until the caller commits it as a ghost highlight or
//! it is discarded.
//!
//! ```text
//! Idle -> Selecting -> PendingTip -> Committed | Discarded -> Idle
//! ```

use std::time::{Duration, Instant};

use log::debug;

use crate::error::HighlightError;

use super::debounce::Debouncer;
use super::types::{Content, GhostHighlight, Rect, ScaledPosition, ViewportPosition};

/// Area drags smaller than this in either direction are treated as clicks
const MIN_AREA_SIZE: f64 = 1.0;

/// Position of a page's container in client coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContainerGeometry {
    pub top: f64,
    pub left: f64,
    pub scroll_top: f64,
    pub scroll_left: f64,
}

/// A non-collapsed text selection within one page
#[derive(Clone, Debug, PartialEq)]
pub struct TextRange {
    /// 1-based page the selection starts on
    pub page: u32,
    /// Page-relative viewport rects, one per line fragment
    pub rects: Vec<Rect>,
    pub text: String,
}

impl TextRange {
    /// Build from raw client rects, translating into the page container's space
    pub fn from_client_rects(
        page: u32,
        text: impl Into<String>,
        client_rects: &[Rect],
        container: &ContainerGeometry,
    ) -> Self {
        let rects = client_rects
            .iter()
            .map(|rect| Rect {
                top: rect.top + container.scroll_top - container.top,
                left: rect.left + container.scroll_left - container.left,
                width: rect.width,
                height: rect.height,
            })
            .collect();
        Self {
            page,
            rects,
            text: text.into(),
        }
    }
}

/// Selection change as reported by the host
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionChange {
    Collapsed,
    /// Anchored outside the document container, e.g. in the host's own UI
    Outside,
    Range(TextRange),
}

/// Handle for committing or discarding one finished selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SelectionTicket(u64);

/// An in-progress area drag, page-relative viewport pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaDrag {
    pub page: u32,
    pub start: (f64, f64),
    pub current: (f64, f64),
}

impl AreaDrag {
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start.0, self.start.1, self.current.0, self.current.1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionKind {
    Text,
    Area(AreaDrag),
}

/// A finished selection waiting for the caller's decision
#[derive(Clone, Debug, PartialEq)]
pub struct PendingSelection {
    pub ticket: SelectionTicket,
    pub viewport_position: ViewportPosition,
    pub scaled_position: ScaledPosition,
    pub content: Content,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SelectionState {
    #[default]
    Idle,
    Selecting(SelectionKind),
    PendingTip(PendingSelection),
}

/// Terminal result of one selection instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    Committed,
    Discarded,
}

#[derive(Debug)]
pub struct SelectionCapture {
    state: SelectionState,
    ghost: Option<(SelectionTicket, GhostHighlight)>,
    text_debounce: Debouncer<TextRange>,
    next_ticket: u64,
}

impl SelectionCapture {
    #[must_use]
    pub fn new(text_debounce: Duration) -> Self {
        Self {
            state: SelectionState::Idle,
            ghost: None,
            text_debounce: Debouncer::new(text_debounce),
            next_ticket: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, SelectionState::Idle)
    }

    #[must_use]
    pub fn ghost(&self) -> Option<&GhostHighlight> {
        self.ghost.as_ref().map(|(_, ghost)| ghost)
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingSelection> {
        match &self.state {
            SelectionState::PendingTip(pending) => Some(pending),
            _ => None,
        }
    }

    #[must_use]
    pub fn area_drag(&self) -> Option<&AreaDrag> {
        match &self.state {
            SelectionState::Selecting(SelectionKind::Area(drag)) => Some(drag),
            _ => None,
        }
    }

    /// True while a selection, tip or ghost is active; highlight tips stay hidden
    #[must_use]
    pub fn interaction_in_progress(&self) -> bool {
        !self.is_idle() || self.ghost.is_some()
    }

    /// Feed a native selection change.
    ///
    /// Returns `Discarded` when a new range supersedes a selection that was
    /// waiting in `PendingTip`; its tip is stale from then on. A collapse
    /// leaves `PendingTip` alone, since focusing the tip itself collapses
    /// the native selection.
    pub fn on_selection_change(
        &mut self,
        change: SelectionChange,
        now: Instant,
    ) -> Option<SelectionOutcome> {
        match change {
            SelectionChange::Outside => {
                debug!("Ignoring selection: {}", HighlightError::SelectionOutOfBounds);
                None
            }
            SelectionChange::Collapsed => {
                self.text_debounce.cancel();
                if matches!(self.state, SelectionState::Selecting(SelectionKind::Text)) {
                    self.state = SelectionState::Idle;
                }
                None
            }
            SelectionChange::Range(range) => {
                if self.area_drag().is_some() {
                    debug!("Ignoring text selection during area drag");
                    return None;
                }
                let superseded = self.pending().is_some();
                self.state = SelectionState::Selecting(SelectionKind::Text);
                self.text_debounce.call(range, now);
                superseded.then_some(SelectionOutcome::Discarded)
            }
        }
    }

    /// The text range to finalize, once the selection has been quiet long enough
    pub fn poll(&mut self, now: Instant) -> Option<TextRange> {
        let range = self.text_debounce.poll(now)?;
        matches!(self.state, SelectionState::Selecting(SelectionKind::Text)).then_some(range)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.text_debounce.deadline()
    }

    /// Abandon a text selection that produced nothing to highlight
    pub fn abandon_text(&mut self) {
        if matches!(self.state, SelectionState::Selecting(SelectionKind::Text)) {
            self.state = SelectionState::Idle;
        }
    }

    /// Start an area drag; refused while another drag is active
    pub fn begin_area_drag(&mut self, page: u32, point: (f64, f64)) -> bool {
        if self.area_drag().is_some() {
            return false;
        }
        self.text_debounce.cancel();
        self.state = SelectionState::Selecting(SelectionKind::Area(AreaDrag {
            page,
            start: point,
            current: point,
        }));
        true
    }

    pub fn update_area_drag(&mut self, point: (f64, f64)) {
        if let SelectionState::Selecting(SelectionKind::Area(drag)) = &mut self.state {
            drag.current = point;
        }
    }

    /// Finish the drag; `None` if none was active or the box is degenerate
    pub fn end_area_drag(&mut self) -> Option<AreaDrag> {
        let drag = *self.area_drag()?;
        self.state = SelectionState::Idle;

        let rect = drag.rect();
        if rect.width < MIN_AREA_SIZE || rect.height < MIN_AREA_SIZE {
            debug!("Dropping degenerate area selection {rect:?}");
            return None;
        }
        Some(drag)
    }

    /// Move to `PendingTip` with computed geometry and content
    pub fn finish(
        &mut self,
        viewport_position: ViewportPosition,
        scaled_position: ScaledPosition,
        content: Content,
    ) -> SelectionTicket {
        let ticket = SelectionTicket(self.next_ticket);
        self.next_ticket += 1;
        self.state = SelectionState::PendingTip(PendingSelection {
            ticket,
            viewport_position,
            scaled_position,
            content,
        });
        ticket
    }

    /// Promote the pending selection to the ghost highlight, replacing any prior one
    pub fn commit(&mut self, ticket: SelectionTicket) -> Option<SelectionOutcome> {
        match std::mem::take(&mut self.state) {
            SelectionState::PendingTip(pending) if pending.ticket == ticket => {
                self.ghost = Some((
                    ticket,
                    GhostHighlight {
                        position: pending.scaled_position,
                        content: pending.content,
                    },
                ));
                Some(SelectionOutcome::Committed)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Discard the selection `ticket` refers to, pending or already a ghost
    pub fn discard(&mut self, ticket: SelectionTicket) -> Option<SelectionOutcome> {
        let is_pending = self.pending().is_some_and(|p| p.ticket == ticket);
        let is_ghost = self.ghost.as_ref().is_some_and(|(t, _)| *t == ticket);
        if is_pending || is_ghost {
            self.cancel()
        } else {
            None
        }
    }

    /// Drop the pending tip and the ghost but keep a selection still being made.
    ///
    /// A text range or area drag in `Selecting` carries on and finishes as usual.
    pub fn dismiss(&mut self) -> Option<SelectionOutcome> {
        let pending = self.pending().is_some();
        if pending {
            self.state = SelectionState::Idle;
        }
        let ghost = self.ghost.take().is_some();
        (pending || ghost).then_some(SelectionOutcome::Discarded)
    }

    /// Escape or click-away: drop everything in progress
    pub fn cancel(&mut self) -> Option<SelectionOutcome> {
        let was_active = self.interaction_in_progress() || self.text_debounce.is_pending();
        self.text_debounce.cancel();
        self.state = SelectionState::Idle;
        self.ghost = None;
        was_active.then_some(SelectionOutcome::Discarded)
    }
}
