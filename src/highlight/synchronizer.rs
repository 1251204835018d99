//! Overlay synchronizer
//!
//! Keeps one overlay layer per page in step with the highlight set, the
//! ghost highlight and the renderer's current viewports. Stored positions
//! never change; every render pass re-projects them through the live
//! viewport, so overlays follow zoom and rotation.
//!
//! Everything runs on the caller's thread. Time only enters through the
//! `now` arguments, and [`OverlaySynchronizer::poll`] fires debounced work.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Instant;

use image::RgbaImage;
use log::{debug, info, warn};

use crate::error::{HighlightError, Result};
use crate::event_source::{EventSource, KeyCode, KeyEventKind, OverlayEvent, PointerDown};
use crate::settings::HighlighterSettings;

use super::coordinates::{
    PageViewport, scaled_position_to_viewport, scaled_to_viewport, viewport_position_to_scaled,
    viewport_to_scaled,
};
use super::debounce::Debouncer;
use super::rects::{OptimizerConfig, get_bounding_rect, optimize_client_rects};
use super::renderer::{DocumentRenderer, LayerContainer, RendererEvent, ScaleValue};
use super::screenshot::capture_area;
use super::selection::{
    AreaDrag, SelectionCapture, SelectionOutcome, SelectionState, SelectionTicket, TextRange,
};
use super::types::{
    Content, GhostHighlight, Highlight, HighlightId, Rect, Scaled, ScaledPosition,
    ViewportHighlight, ViewportPosition,
};

/// Produces the caller's visual for one highlight in one render pass
pub type HighlightTransformFn<H, V> =
    Box<dyn FnMut(&ViewportHighlight<'_, H>, usize, &mut TransformContext<'_, H, V>) -> V>;

/// Called once per finished selection; returns the tip content to show
pub type SelectionFinishedFn<V> = Box<dyn FnMut(&ScaledPosition, &Content, SelectionTicket) -> V>;

/// Re-renders a highlight's tip against its latest projection
pub type TipRenderFn<H, V> = Box<dyn Fn(&ViewportHighlight<'_, H>) -> V>;

type AreaSelectionFn = Box<dyn Fn(&PointerDown) -> bool>;
type ScrollChangeFn = Box<dyn FnMut()>;

enum TipRequest<H, V> {
    Show(TipRenderFn<H, V>),
    Hide,
}

/// Per-highlight services handed to the transform strategy
pub struct TransformContext<'a, H, V> {
    page: u32,
    viewport: PageViewport,
    canvas: Option<&'a RgbaImage>,
    is_scrolled_to: bool,
    tip: Option<TipRequest<H, V>>,
}

impl<H, V> TransformContext<'_, H, V> {
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Whether this highlight is the target of the last `scroll_to`
    #[must_use]
    pub fn is_scrolled_to(&self) -> bool {
        self.is_scrolled_to
    }

    /// Open a tip for this highlight. Ignored while a selection is in progress.
    pub fn set_tip<F>(&mut self, render: F)
    where
        F: Fn(&ViewportHighlight<'_, H>) -> V + 'static,
    {
        self.tip = Some(TipRequest::Show(Box::new(render)));
    }

    /// Close any tip and drop the in-progress selection
    pub fn hide_tip(&mut self) {
        self.tip = Some(TipRequest::Hide);
    }

    /// Viewport rect on this page to its persisted form, e.g. after an area edit
    #[must_use]
    pub fn to_scaled(&self, rect: &Rect) -> Scaled {
        viewport_to_scaled(rect, &self.viewport)
    }

    pub fn screenshot(&self, rect: &Rect) -> Result<String> {
        capture_area(
            self.canvas,
            self.page,
            rect,
            pixel_ratio(self.canvas, &self.viewport),
        )
    }
}

/// Where a tip should be drawn, page-relative
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TipAnchor {
    /// Horizontal centre of the anchored box
    pub left: f64,
    pub top: f64,
    pub bottom: f64,
}

impl TipAnchor {
    fn for_rect(rect: &Rect) -> Self {
        Self {
            left: rect.left + rect.width / 2.0,
            top: rect.top,
            bottom: rect.bottom(),
        }
    }
}

/// A floating tip the caller should draw
#[derive(Debug)]
pub struct Tip<V> {
    pub position: ViewportPosition,
    pub anchor: TipAnchor,
    pub content: V,
}

impl<V> Tip<V> {
    fn new(position: ViewportPosition, content: V) -> Self {
        Self {
            anchor: TipAnchor::for_rect(&position.bounding_rect),
            position,
            content,
        }
    }
}

/// Painted contents of one page's overlay
#[derive(Debug)]
pub struct OverlayLayer<V> {
    container: LayerContainer,
    items: Vec<V>,
    render_count: u64,
}

impl<V> OverlayLayer<V> {
    fn new(container: LayerContainer) -> Self {
        Self {
            container,
            items: Vec::new(),
            render_count: 0,
        }
    }

    /// Text-layer container the overlay is attached to
    #[must_use]
    pub fn container(&self) -> LayerContainer {
        self.container
    }

    #[must_use]
    pub fn items(&self) -> &[V] {
        &self.items
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.render_count
    }
}

pub struct OverlaySynchronizer<R, H, V> {
    renderer: R,
    highlights: Rc<[Highlight<H>]>,
    transform: HighlightTransformFn<H, V>,
    on_selection_finished: SelectionFinishedFn<V>,
    enable_area_selection: Option<AreaSelectionFn>,
    on_scroll_change: Option<ScrollChangeFn>,
    capture: SelectionCapture,
    resize_debounce: Debouncer<()>,
    layers: BTreeMap<u32, OverlayLayer<V>>,
    tip: Option<Tip<V>>,
    highlight_tip: Option<(HighlightId, TipRenderFn<H, V>)>,
    scrolled_to: Option<HighlightId>,
    scroll_settle_until: Option<Instant>,
    scale_value: ScaleValue,
    optimizer: OptimizerConfig,
    settings: HighlighterSettings,
    document_ready: bool,
}

impl<R, H, V> OverlaySynchronizer<R, H, V>
where
    R: DocumentRenderer,
    H: 'static,
    V: 'static,
{
    pub fn new<T, S>(
        renderer: R,
        settings: HighlighterSettings,
        highlight_transform: T,
        on_selection_finished: S,
    ) -> Self
    where
        T: FnMut(&ViewportHighlight<'_, H>, usize, &mut TransformContext<'_, H, V>) -> V + 'static,
        S: FnMut(&ScaledPosition, &Content, SelectionTicket) -> V + 'static,
    {
        Self {
            renderer,
            highlights: Rc::from(Vec::new()),
            transform: Box::new(highlight_transform),
            on_selection_finished: Box::new(on_selection_finished),
            enable_area_selection: None,
            on_scroll_change: None,
            capture: SelectionCapture::new(settings.selection_debounce()),
            resize_debounce: Debouncer::new(settings.resize_debounce()),
            layers: BTreeMap::new(),
            tip: None,
            highlight_tip: None,
            scrolled_to: None,
            scroll_settle_until: None,
            scale_value: settings.scale_value,
            optimizer: settings.optimizer(),
            settings,
            document_ready: false,
        }
    }

    /// Enable area selection for pointer presses the predicate accepts
    #[must_use]
    pub fn with_area_selection<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PointerDown) -> bool + 'static,
    {
        self.enable_area_selection = Some(Box::new(predicate));
        self
    }

    /// Notified when the user scrolls the document
    #[must_use]
    pub fn with_scroll_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.on_scroll_change = Some(Box::new(listener));
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn highlights(&self) -> &Rc<[Highlight<H>]> {
        &self.highlights
    }

    pub fn layer(&self, page: u32) -> Option<&OverlayLayer<V>> {
        self.layers.get(&page)
    }

    pub fn layers(&self) -> impl Iterator<Item = (u32, &OverlayLayer<V>)> {
        self.layers.iter().map(|(page, layer)| (*page, layer))
    }

    pub fn tip(&self) -> Option<&Tip<V>> {
        self.tip.as_ref()
    }

    pub fn ghost(&self) -> Option<&GhostHighlight> {
        self.capture.ghost()
    }

    pub fn selection_state(&self) -> &SelectionState {
        self.capture.state()
    }

    pub fn scrolled_to(&self) -> Option<&HighlightId> {
        self.scrolled_to.as_ref()
    }

    pub fn scale_value(&self) -> ScaleValue {
        self.scale_value
    }

    pub fn is_document_ready(&self) -> bool {
        self.document_ready
    }

    /// Earliest instant at which [`Self::poll`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.capture.next_deadline(), self.resize_debounce.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ------------------------------------------------------------------
    // Caller inputs
    // ------------------------------------------------------------------

    /// Replace the highlight set. Re-renders only when the array identity changes.
    pub fn set_highlights(&mut self, highlights: impl Into<Rc<[Highlight<H>]>>) {
        let highlights = highlights.into();
        if Rc::ptr_eq(&self.highlights, &highlights) {
            return;
        }
        self.highlights = highlights;
        self.render_all();
    }

    pub fn set_scale_value(&mut self, scale_value: ScaleValue) {
        if self.scale_value != scale_value {
            self.scale_value = scale_value;
            self.apply_scale_value();
        }
    }

    /// Swap in a new document. All overlay state belonging to the old one is dropped.
    pub fn attach_document(&mut self, renderer: R) -> R {
        info!("Attaching new document ({} pages)", renderer.page_count());
        self.layers.clear();
        self.tip = None;
        self.highlight_tip = None;
        self.scrolled_to = None;
        self.scroll_settle_until = None;
        self.capture.cancel();
        self.resize_debounce.cancel();
        self.document_ready = false;
        std::mem::replace(&mut self.renderer, renderer)
    }

    /// Turn the pending selection into the ghost highlight
    pub fn commit(&mut self, ticket: SelectionTicket) -> Option<SelectionOutcome> {
        let previous = self.ghost_page();
        let outcome = self.capture.commit(ticket)?;
        self.render_pages(previous.into_iter().chain(self.ghost_page()));
        Some(outcome)
    }

    /// Drop the selection `ticket` refers to, with its tip and ghost
    pub fn discard(&mut self, ticket: SelectionTicket) -> Option<SelectionOutcome> {
        let ghost_page = self.ghost_page();
        let outcome = self.capture.discard(ticket)?;
        self.tip = None;
        self.highlight_tip = None;
        self.render_pages(ghost_page);
        Some(outcome)
    }

    /// Close every tip and drop any selection or ghost
    pub fn hide_tip_and_selection(&mut self) {
        let ghost_page = self.ghost_page();
        self.tip = None;
        self.highlight_tip = None;
        if self.capture.cancel().is_some() {
            debug!("Discarded in-progress selection");
        }
        self.render_pages(ghost_page);
    }

    /// Open a tip for a highlight from outside a render pass, e.g. on hover.
    ///
    /// `render` is re-run on every pass over the highlight so the tip follows
    /// zoom. Returns `false` without storing anything while a selection is in
    /// progress, or if the highlight's page has no overlay yet.
    pub fn set_highlight_tip<F>(&mut self, id: &HighlightId, render: F) -> Result<bool>
    where
        F: Fn(&ViewportHighlight<'_, H>) -> V + 'static,
    {
        let page = self
            .find_highlight(id)
            .map(|h| h.position.page_number)
            .ok_or_else(|| HighlightError::UnknownHighlight(id.clone()))?;
        self.check_page(page)?;
        if self.capture.interaction_in_progress() {
            debug!("Selection in progress, not opening tip for {id}");
            return Ok(false);
        }

        self.tip = None;
        self.highlight_tip = Some((id.clone(), Box::new(render)));
        self.render_page(page);
        if self.tip.is_none() {
            self.highlight_tip = None;
        }
        Ok(self.tip.is_some())
    }

    /// Bring a highlight into view and mark it as scrolled-to
    pub fn scroll_to(&mut self, id: &HighlightId, now: Instant) -> Result<()> {
        let position = self
            .find_highlight(id)
            .map(|h| h.position.clone())
            .ok_or_else(|| HighlightError::UnknownHighlight(id.clone()))?;
        let page = position.page_number;
        self.check_page(page)?;
        let viewport = self
            .renderer
            .page_viewport(page)
            .ok_or(HighlightError::StaleViewport { page })?;

        let top = scaled_to_viewport(
            &position.bounding_rect,
            &viewport,
            position.use_pdf_coordinates,
        )
        .top;

        // The renderer reports its own scroll back to us; ignore it until it settles.
        self.scroll_settle_until = now.checked_add(self.settings.scroll_settle());
        self.renderer
            .scroll_page_into_view(page, top - self.settings.scroll_margin);

        let previous = self
            .scrolled_to
            .replace(id.clone())
            .and_then(|prev| self.find_highlight(&prev).map(|h| h.position.page_number));
        self.render_pages(previous.into_iter().chain([page]));
        Ok(())
    }

    /// Capture an area of a rendered page as a PNG data URI
    pub fn screenshot(&self, page: u32, rect: &Rect) -> Result<String> {
        let viewport = self
            .renderer
            .page_viewport(page)
            .ok_or(HighlightError::StaleViewport { page })?;
        let canvas = self.renderer.page_canvas(page);
        capture_area(canvas, page, rect, pixel_ratio(canvas, &viewport))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: OverlayEvent, now: Instant) {
        match event {
            OverlayEvent::Renderer(RendererEvent::DocumentReady) => self.on_document_ready(),
            OverlayEvent::Renderer(RendererEvent::TextLayerRendered(page)) => {
                self.render_page(page);
            }
            OverlayEvent::SelectionChanged(change) => {
                if self.capture.on_selection_change(change, now).is_some() {
                    debug!("New selection replaced the pending one, closing its tip");
                    self.tip = None;
                }
            }
            OverlayEvent::PointerDown(pointer) => self.on_pointer_down(&pointer),
            OverlayEvent::PointerMove(point) => self.capture.update_area_drag(point),
            OverlayEvent::PointerUp => {
                if let Some(drag) = self.capture.end_area_drag() {
                    self.after_area_selection(drag);
                }
            }
            OverlayEvent::Key(key) => {
                if key.code == KeyCode::Esc && key.kind != KeyEventKind::Release {
                    self.hide_tip_and_selection();
                }
            }
            OverlayEvent::Scroll => self.on_scroll(now),
            OverlayEvent::Resize => self.resize_debounce.call((), now),
        }
    }

    /// Run debounced work that has come due
    pub fn poll(&mut self, now: Instant) {
        if self.resize_debounce.poll(now).is_some() {
            self.apply_scale_value();
        }
        if let Some(range) = self.capture.poll(now) {
            self.after_selection(range);
        }
    }

    /// Feed every available event from `source`, polling timers in between.
    /// Returns the time of the last event handled.
    pub fn drain_events<S: EventSource>(
        &mut self,
        source: &mut S,
    ) -> anyhow::Result<Option<Instant>> {
        let mut last = None;
        while source.poll(std::time::Duration::ZERO)? {
            let timed = source.read()?;
            self.poll(timed.at);
            self.handle_event(timed.event, timed.at);
            last = Some(timed.at);
        }
        Ok(last)
    }

    fn on_document_ready(&mut self) {
        info!("Document ready with {} pages", self.renderer.page_count());
        self.document_ready = true;
        self.apply_scale_value();
    }

    fn apply_scale_value(&mut self) {
        debug!("Applying scale value {}", self.scale_value);
        self.renderer.set_scale_value(self.scale_value);
        self.render_all();
    }

    fn on_pointer_down(&mut self, pointer: &PointerDown) {
        if pointer.inside_tip {
            return;
        }
        self.hide_tip_and_selection();

        let Some(page) = pointer.page else {
            return;
        };
        let enabled = self
            .enable_area_selection
            .as_ref()
            .is_some_and(|predicate| predicate(pointer));
        if enabled {
            self.capture.begin_area_drag(page, pointer.point);
        }
    }

    fn on_scroll(&mut self, now: Instant) {
        if let Some(until) = self.scroll_settle_until {
            if now < until {
                debug!("Ignoring scroll caused by scroll_to");
                return;
            }
            self.scroll_settle_until = None;
        }

        if let Some(listener) = self.on_scroll_change.as_mut() {
            listener();
        }

        let cleared_page = self
            .scrolled_to
            .take()
            .and_then(|id| self.find_highlight(&id).map(|h| h.position.page_number));
        self.render_pages(cleared_page);

        // A selection still being made survives the scroll and finishes as usual.
        let ghost_page = self.ghost_page();
        self.tip = None;
        self.highlight_tip = None;
        if self.capture.dismiss().is_some() {
            debug!("Scroll discarded the pending selection");
        }
        self.render_pages(ghost_page);
    }

    fn after_selection(&mut self, range: TextRange) {
        let page = range.page;
        if self.highlight_tip.is_some() {
            debug!("Highlight tip is open, ignoring selection on page {page}");
            self.capture.abandon_text();
            return;
        }
        if self.check_page(page).is_err() {
            debug!("Ignoring selection on unknown page {page}");
            self.capture.abandon_text();
            return;
        }
        let Some(viewport) = self.renderer.page_viewport(page) else {
            debug!("{}", HighlightError::StaleViewport { page });
            self.capture.abandon_text();
            return;
        };

        let rects = optimize_client_rects(&range.rects, &self.optimizer);
        let Ok(bounding_rect) = get_bounding_rect(&rects) else {
            self.capture.abandon_text();
            return;
        };

        let viewport_position = ViewportPosition {
            page_number: page,
            bounding_rect,
            rects,
        };
        let scaled_position = viewport_position_to_scaled(&viewport_position, &viewport);
        self.present_selection(viewport_position, scaled_position, Content::text(range.text));
    }

    fn after_area_selection(&mut self, drag: AreaDrag) {
        let page = drag.page;
        let bounding_rect = drag.rect();
        let Some(viewport) = self.renderer.page_viewport(page) else {
            debug!("{}", HighlightError::StaleViewport { page });
            return;
        };

        let image = match self.screenshot(page, &bounding_rect) {
            Ok(image) => image,
            Err(e) => {
                warn!("Dropping area selection: {e}");
                return;
            }
        };

        let viewport_position = ViewportPosition {
            page_number: page,
            bounding_rect,
            rects: Vec::new(),
        };
        let scaled_position = viewport_position_to_scaled(&viewport_position, &viewport);
        self.present_selection(viewport_position, scaled_position, Content::image(image));
    }

    fn present_selection(
        &mut self,
        viewport_position: ViewportPosition,
        scaled_position: ScaledPosition,
        content: Content,
    ) {
        let ticket = self.capture.finish(
            viewport_position.clone(),
            scaled_position.clone(),
            content.clone(),
        );
        let tip = (self.on_selection_finished)(&scaled_position, &content, ticket);
        self.tip = Some(Tip::new(viewport_position, tip));
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn render_all(&mut self) {
        let page_count = self.renderer.page_count();
        let invalid = self
            .highlights
            .iter()
            .filter(|h| h.position.page_number == 0 || h.position.page_number > page_count)
            .count();
        if invalid > 0 {
            warn!("{invalid} highlight(s) reference pages outside 1..={page_count}");
        }

        for page in 1..=page_count {
            self.render_page(page);
        }
    }

    fn render_pages(&mut self, pages: impl IntoIterator<Item = u32>) {
        let pages: BTreeSet<u32> = pages.into_iter().collect();
        for page in pages {
            self.render_page(page);
        }
    }

    /// Repaint one page's overlay. A page that is not rendered yet is skipped;
    /// its text-layer-rendered event brings us back.
    fn render_page(&mut self, page: u32) {
        if self.check_page(page).is_err() {
            return;
        }
        let Some(container) = self.renderer.text_layer_container(page) else {
            debug!("Page {page} has no text layer yet, deferring overlay");
            return;
        };
        let Some(viewport) = self.renderer.page_viewport(page) else {
            debug!("{}", HighlightError::StaleViewport { page });
            return;
        };

        let highlights = Rc::clone(&self.highlights);
        let ghost = self.capture.ghost().cloned();
        let canvas = self.renderer.page_canvas(page);

        let entries = highlights
            .iter()
            .filter(|h| h.position.page_number == page)
            .map(|h| (Some(&h.id), &h.position, &h.content, Some(&h.data)))
            .chain(
                ghost
                    .iter()
                    .filter(|g| g.position.page_number == page)
                    .map(|g| (None, &g.position, &g.content, None)),
            );

        let mut items = Vec::new();
        let mut refreshed_tip = None;
        let mut requests = Vec::new();
        for (index, (id, position, content, data)) in entries.enumerate() {
            let highlight = ViewportHighlight {
                id,
                position: scaled_position_to_viewport(position, &viewport),
                content,
                data,
            };

            if let Some((tip_id, render)) = &self.highlight_tip {
                if id == Some(tip_id) {
                    refreshed_tip = Some((highlight.position.clone(), render(&highlight)));
                }
            }

            let mut ctx = TransformContext {
                page,
                viewport,
                canvas,
                is_scrolled_to: id.is_some() && id == self.scrolled_to.as_ref(),
                tip: None,
            };
            items.push((self.transform)(&highlight, index, &mut ctx));

            if let Some(request) = ctx.tip {
                let rendered = match request {
                    TipRequest::Show(render) => {
                        let content = render(&highlight);
                        Some((id.cloned(), render, content))
                    }
                    TipRequest::Hide => None,
                };
                requests.push((highlight.position.clone(), rendered));
            }
        }

        let layer = self.layers.entry(page).or_insert_with(|| {
            debug!("Attaching overlay layer to page {page}");
            OverlayLayer::new(container)
        });
        if layer.container != container {
            debug!("Text layer of page {page} was rebuilt, re-attaching overlay");
            layer.container = container;
        }
        layer.items = items;
        layer.render_count += 1;

        if let Some((position, content)) = refreshed_tip {
            self.show_tip(position, content);
        }
        for (position, request) in requests {
            match request {
                Some(_) if self.capture.interaction_in_progress() => {
                    debug!("Suppressing highlight tip during selection");
                }
                Some((id, render, content)) => {
                    if let Some(id) = id {
                        self.highlight_tip = Some((id, render));
                    }
                    self.show_tip(position, content);
                }
                None => self.hide_tip_and_selection(),
            }
        }
    }

    /// Highlight tips never cover an interaction in progress
    fn show_tip(&mut self, position: ViewportPosition, content: V) {
        if self.capture.interaction_in_progress() {
            return;
        }
        self.tip = Some(Tip::new(position, content));
    }

    fn find_highlight(&self, id: &HighlightId) -> Option<&Highlight<H>> {
        self.highlights.iter().find(|h| &h.id == id)
    }

    fn ghost_page(&self) -> Option<u32> {
        self.capture.ghost().map(|g| g.position.page_number)
    }

    fn check_page(&self, page: u32) -> Result<()> {
        let page_count = self.renderer.page_count();
        if page == 0 || page > page_count {
            return Err(HighlightError::InvalidPage { page, page_count });
        }
        Ok(())
    }
}

/// Canvas pixels per viewport pixel
fn pixel_ratio(canvas: Option<&RgbaImage>, viewport: &PageViewport) -> f64 {
    match canvas {
        Some(canvas) if viewport.width() > 0.0 => f64::from(canvas.width()) / viewport.width(),
        _ => 1.0,
    }
}
