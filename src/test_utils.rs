pub mod test_helpers {
    use crate::event_source::{KeyModifiers, OverlayEvent, PointerDown, SimulatedEventSource};
    use crate::highlight::{
        DocumentRenderer, LayerContainer, PageViewport, Rect, RendererEvent, ScaleValue,
        SelectionChange, TextRange,
    };
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    /// One page of a [`MockRenderer`]
    #[derive(Clone, Debug, Default)]
    pub struct MockPage {
        pub viewport: Option<PageViewport>,
        pub canvas: Option<RgbaImage>,
        pub container: Option<LayerContainer>,
    }

    /// In-memory renderer recording every command it receives
    #[derive(Debug, Default)]
    pub struct MockRenderer {
        pub pages: Vec<MockPage>,
        pub scale_calls: Vec<ScaleValue>,
        pub scroll_calls: Vec<(u32, f64)>,
        next_container: u64,
    }

    impl MockRenderer {
        /// `page_count` pages, all laid out with `viewport` and a text layer
        pub fn new(page_count: u32, viewport: PageViewport) -> Self {
            let mut renderer = Self::unrendered(page_count, viewport);
            for page in 1..=page_count {
                renderer.render_text_layer(page);
            }
            renderer
        }

        /// Pages are laid out but no text layer exists yet
        pub fn unrendered(page_count: u32, viewport: PageViewport) -> Self {
            Self {
                pages: (0..page_count)
                    .map(|_| MockPage {
                        viewport: Some(viewport),
                        ..MockPage::default()
                    })
                    .collect(),
                ..Self::default()
            }
        }

        pub fn page_mut(&mut self, page: u32) -> &mut MockPage {
            &mut self.pages[page as usize - 1]
        }

        /// Build a fresh text layer for `page`, returning its new container
        pub fn render_text_layer(&mut self, page: u32) -> LayerContainer {
            self.next_container += 1;
            let container = LayerContainer(self.next_container);
            self.page_mut(page).container = Some(container);
            container
        }

        /// Paint `page` with a solid colour at its viewport size times `pixel_ratio`
        pub fn paint(&mut self, page: u32, pixel_ratio: f64, color: [u8; 4]) {
            let Some(viewport) = self.page_mut(page).viewport else {
                return;
            };
            let width = (viewport.width() * pixel_ratio).round() as u32;
            let height = (viewport.height() * pixel_ratio).round() as u32;
            self.page_mut(page).canvas =
                Some(RgbaImage::from_pixel(width, height, image::Rgba(color)));
        }

        fn page(&self, page: u32) -> Option<&MockPage> {
            page.checked_sub(1).and_then(|i| self.pages.get(i as usize))
        }
    }

    impl DocumentRenderer for MockRenderer {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_viewport(&self, page: u32) -> Option<PageViewport> {
            self.page(page).and_then(|p| p.viewport)
        }

        fn page_canvas(&self, page: u32) -> Option<&RgbaImage> {
            self.page(page).and_then(|p| p.canvas.as_ref())
        }

        fn text_layer_container(&self, page: u32) -> Option<LayerContainer> {
            self.page(page).and_then(|p| p.container)
        }

        fn scroll_page_into_view(&mut self, page: u32, y_offset: f64) {
            self.scroll_calls.push((page, y_offset));
        }

        fn set_scale_value(&mut self, scale: ScaleValue) {
            self.scale_calls.push(scale);
            if let ScaleValue::Custom(scale) = scale {
                for page in &mut self.pages {
                    page.viewport = page.viewport.map(|vp| vp.with_scale(scale));
                }
            }
        }
    }

    /// Builder for timed overlay event scenarios
    pub struct TestScenarioBuilder {
        start: Instant,
        elapsed: Duration,
        events: Vec<(Duration, OverlayEvent)>,
    }

    impl TestScenarioBuilder {
        pub fn new(start: Instant) -> Self {
            Self {
                start,
                elapsed: Duration::ZERO,
                events: Vec::new(),
            }
        }

        /// Advance the clock before the next event
        pub fn wait_ms(mut self, ms: u64) -> Self {
            self.elapsed += Duration::from_millis(ms);
            self
        }

        pub fn event(mut self, event: OverlayEvent) -> Self {
            self.events.push((self.elapsed, event));
            self
        }

        pub fn document_ready(self) -> Self {
            self.event(RendererEvent::DocumentReady.into())
        }

        pub fn text_layer_rendered(self, page: u32) -> Self {
            self.event(RendererEvent::TextLayerRendered(page).into())
        }

        /// Native selection now covers `rects` on `page`
        pub fn select_text(self, page: u32, text: &str, rects: &[Rect]) -> Self {
            self.event(OverlayEvent::SelectionChanged(SelectionChange::Range(
                TextRange {
                    page,
                    rects: rects.to_vec(),
                    text: text.to_string(),
                },
            )))
        }

        pub fn collapse_selection(self) -> Self {
            self.event(OverlayEvent::SelectionChanged(SelectionChange::Collapsed))
        }

        pub fn pointer_down(self, page: u32, point: (f64, f64)) -> Self {
            self.event(SimulatedEventSource::pointer_down(
                page,
                point,
                KeyModifiers::empty(),
            ))
        }

        /// Alt-press, the usual area selection gesture
        pub fn alt_pointer_down(self, page: u32, point: (f64, f64)) -> Self {
            self.event(SimulatedEventSource::pointer_down(
                page,
                point,
                KeyModifiers::ALT,
            ))
        }

        pub fn pointer_down_in_tip(self) -> Self {
            self.event(OverlayEvent::PointerDown(PointerDown {
                page: None,
                point: (0.0, 0.0),
                inside_tip: true,
                modifiers: KeyModifiers::empty(),
            }))
        }

        pub fn drag_to(self, point: (f64, f64)) -> Self {
            self.event(OverlayEvent::PointerMove(point))
        }

        pub fn pointer_up(self) -> Self {
            self.event(OverlayEvent::PointerUp)
        }

        pub fn press_escape(self) -> Self {
            self.event(SimulatedEventSource::escape())
        }

        pub fn scroll(self) -> Self {
            self.event(OverlayEvent::Scroll)
        }

        pub fn resize(self) -> Self {
            self.event(OverlayEvent::Resize)
        }

        /// Time of the next event, for driving `poll` by hand
        pub fn now(&self) -> Instant {
            self.start + self.elapsed
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.start, self.events)
        }
    }
}
