use pdf_highlighter::event_source::{KeyModifiers, OverlayEvent, SimulatedEventSource};
use pdf_highlighter::highlight::{
    Content, DocumentRenderer, Highlight, HighlightId, OverlaySynchronizer, PageViewport, Rect, RendererEvent,
    Scaled, ScaledPosition, ScaleValue, SelectionOutcome, SelectionState, SelectionTicket,
};
use pdf_highlighter::test_utils::test_helpers::{MockRenderer, TestScenarioBuilder};
use pdf_highlighter::{HighlightError, HighlighterSettings};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

const PAGE_WIDTH: f64 = 600.0;
const PAGE_HEIGHT: f64 = 800.0;
const EPS: f64 = 1e-6;

/// What the test transform paints for each highlight
#[derive(Clone, Debug, PartialEq)]
enum Item {
    Painted {
        id: Option<String>,
        index: usize,
        rect: Rect,
        scrolled_to: bool,
    },
    Tip(String),
}

type Finished = Rc<RefCell<Vec<(ScaledPosition, Content, SelectionTicket)>>>;
type Overlay = OverlaySynchronizer<MockRenderer, (), Item>;

fn viewport() -> PageViewport {
    PageViewport::new([0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT], 1.0, 0)
}

fn highlight(id: &str, page: u32, rect: Rect, use_pdf_coordinates: bool) -> Highlight<()> {
    let scaled = Scaled::from_rect(&rect, PAGE_WIDTH, PAGE_HEIGHT);
    Highlight {
        id: HighlightId::new(id),
        position: ScaledPosition {
            page_number: page,
            bounding_rect: scaled,
            rects: vec![scaled],
            use_pdf_coordinates,
        },
        content: Content::text(id),
        data: (),
    }
}

fn synchronizer(renderer: MockRenderer) -> (Overlay, Finished) {
    synchronizer_with_tips(renderer, Rc::new(Cell::new(false)))
}

/// While `open_tip` is set, highlight "a" asks for a tip on every render pass
fn synchronizer_with_tips(renderer: MockRenderer, open_tip: Rc<Cell<bool>>) -> (Overlay, Finished) {
    let finished: Finished = Rc::default();
    let sink = Rc::clone(&finished);
    let sync: Overlay = OverlaySynchronizer::new(
        renderer,
        HighlighterSettings::default(),
        move |highlight, index, ctx| {
            if open_tip.get() && highlight.id.is_some_and(|id| id.as_str() == "a") {
                ctx.set_tip(|h| Item::Tip(format!("tip at {}", h.position.bounding_rect.top)));
            }
            Item::Painted {
                id: highlight.id.map(|id| id.to_string()),
                index,
                rect: highlight.position.bounding_rect,
                scrolled_to: ctx.is_scrolled_to(),
            }
        },
        move |position, content, ticket| {
            sink.borrow_mut()
                .push((position.clone(), content.clone(), ticket));
            Item::Tip(content.text.clone().unwrap_or_default())
        },
    );
    (sync, finished)
}

fn painted(sync: &Overlay, page: u32) -> Vec<Item> {
    sync.layer(page)
        .map(|layer| layer.items().to_vec())
        .unwrap_or_default()
}

fn painted_rect(sync: &Overlay, page: u32, index: usize) -> Rect {
    match &painted(sync, page)[index] {
        Item::Painted { rect, .. } => *rect,
        other => panic!("expected painted highlight, got {other:?}"),
    }
}

fn is_scrolled_to(sync: &Overlay, page: u32, id: &str) -> bool {
    painted(sync, page).iter().any(|item| {
        matches!(item, Item::Painted { id: Some(i), scrolled_to: true, .. } if i == id)
    })
}

fn assert_rect_close(actual: &Rect, expected: &Rect) {
    assert!(
        (actual.top - expected.top).abs() < EPS
            && (actual.left - expected.left).abs() < EPS
            && (actual.width - expected.width).abs() < EPS
            && (actual.height - expected.height).abs() < EPS,
        "{actual:?} != {expected:?}"
    );
}

fn scenario_a_rects() -> Vec<Rect> {
    vec![
        Rect::new(0.0, 0.0, 50.0, 10.0),
        Rect::new(0.0, 50.0, 30.0, 10.0),
        Rect::new(10.0, 0.0, 40.0, 10.0),
    ]
}

/// Drive a two-line text selection to the tip, returning when the tip was shown
fn finish_text_selection(sync: &mut Overlay, start: Instant) -> Instant {
    let rects = scenario_a_rects();
    let mut source = TestScenarioBuilder::new(start)
        .select_text(1, "two", &rects[..1])
        .wait_ms(200)
        .select_text(1, "two lines", &rects)
        .build();
    let last = sync.drain_events(&mut source).unwrap().unwrap();
    let due = last + Duration::from_millis(500);
    sync.poll(due);
    due
}

#[test]
fn pdf_origin_highlight_projects_with_flipped_origin() {
    let (mut sync, _) = synchronizer(MockRenderer::new(3, viewport()));
    sync.set_highlights(vec![highlight(
        "b",
        2,
        Rect::new(100.0, 50.0, 200.0, 30.0),
        true,
    )]);
    sync.handle_event(RendererEvent::DocumentReady.into(), Instant::now());

    assert_rect_close(&painted_rect(&sync, 2, 0), &Rect::new(670.0, 50.0, 200.0, 30.0));
    assert!(painted(&sync, 1).is_empty());
    assert!(painted(&sync, 3).is_empty());
    assert_eq!(sync.renderer().scale_calls, vec![ScaleValue::Auto]);
}

#[test]
fn layers_are_created_once_the_text_layer_exists() {
    let (mut sync, _) = synchronizer(MockRenderer::unrendered(2, viewport()));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(10.0, 10.0, 50.0, 10.0),
        false,
    )]);
    sync.handle_event(RendererEvent::DocumentReady.into(), Instant::now());
    assert!(sync.layer(1).is_none());

    let container = sync.renderer_mut().render_text_layer(1);
    sync.handle_event(RendererEvent::TextLayerRendered(1).into(), Instant::now());

    let layer = sync.layer(1).expect("layer after text layer render");
    assert_eq!(layer.container(), container);
    assert_eq!(layer.items().len(), 1);
    assert!(sync.layer(2).is_none());
}

#[test]
fn rebuilt_text_layer_reuses_the_overlay_layer() {
    let (mut sync, _) = synchronizer(MockRenderer::new(1, viewport()));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(10.0, 10.0, 50.0, 10.0),
        false,
    )]);
    let first = sync.layer(1).unwrap().container();
    let renders = sync.layer(1).unwrap().render_count();

    let rebuilt = sync.renderer_mut().render_text_layer(1);
    sync.handle_event(RendererEvent::TextLayerRendered(1).into(), Instant::now());

    let layer = sync.layer(1).unwrap();
    assert_ne!(first, rebuilt);
    assert_eq!(layer.container(), rebuilt);
    assert_eq!(layer.render_count(), renders + 1);
    assert_eq!(layer.items().len(), 1);
}

#[test]
fn same_highlight_array_does_not_rerender() {
    let (mut sync, _) = synchronizer(MockRenderer::new(1, viewport()));
    let highlights: Rc<[Highlight<()>]> = Rc::from(vec![highlight(
        "a",
        1,
        Rect::new(10.0, 10.0, 50.0, 10.0),
        false,
    )]);

    sync.set_highlights(Rc::clone(&highlights));
    let renders = sync.layer(1).unwrap().render_count();

    sync.set_highlights(Rc::clone(&highlights));
    assert_eq!(sync.layer(1).unwrap().render_count(), renders);

    // Equal contents, new array
    sync.set_highlights(highlights.to_vec());
    assert_eq!(sync.layer(1).unwrap().render_count(), renders + 1);
}

#[test]
fn overlays_follow_zoom_changes() {
    let (mut sync, _) = synchronizer(MockRenderer::new(1, viewport()));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(100.0, 50.0, 200.0, 30.0),
        false,
    )]);

    sync.set_scale_value(ScaleValue::Custom(2.0));

    assert_eq!(sync.renderer().scale_calls, vec![ScaleValue::Custom(2.0)]);
    assert_rect_close(&painted_rect(&sync, 1, 0), &Rect::new(200.0, 100.0, 400.0, 60.0));

    // Unchanged value is not pushed again
    sync.set_scale_value(ScaleValue::Custom(2.0));
    assert_eq!(sync.renderer().scale_calls.len(), 1);
}

#[test]
fn burst_of_resizes_rescales_once() {
    let start = Instant::now();
    let (mut sync, _) = synchronizer(MockRenderer::new(1, viewport()));

    let mut builder = TestScenarioBuilder::new(start);
    for _ in 0..5 {
        builder = builder.resize().wait_ms(100);
    }
    let mut source = builder.build();
    let last = sync.drain_events(&mut source).unwrap().unwrap();
    assert!(sync.renderer().scale_calls.is_empty());
    assert_eq!(sync.next_deadline(), Some(last + Duration::from_millis(500)));

    sync.poll(last + Duration::from_millis(499));
    assert!(sync.renderer().scale_calls.is_empty());

    sync.poll(last + Duration::from_millis(500));
    sync.poll(last + Duration::from_millis(2000));
    assert_eq!(sync.renderer().scale_calls, vec![ScaleValue::Auto]);
    assert_eq!(sync.next_deadline(), None);
}

#[test]
fn scroll_to_marks_highlight_until_user_scrolls() {
    let start = Instant::now();
    let listener_calls = Rc::new(Cell::new(0));
    let calls = Rc::clone(&listener_calls);
    let (sync, _) = synchronizer(MockRenderer::new(2, viewport()));
    let mut sync = sync.with_scroll_listener(move || calls.set(calls.get() + 1));
    sync.set_highlights(vec![
        highlight("a", 1, Rect::new(10.0, 10.0, 50.0, 10.0), false),
        highlight("b", 2, Rect::new(300.0, 20.0, 50.0, 10.0), false),
    ]);
    assert!(!is_scrolled_to(&sync, 2, "b"));

    sync.scroll_to(&HighlightId::new("b"), start).unwrap();
    assert_eq!(sync.renderer().scroll_calls, vec![(2, 290.0)]);
    assert_eq!(sync.scrolled_to(), Some(&HighlightId::new("b")));
    assert!(is_scrolled_to(&sync, 2, "b"));
    assert!(!is_scrolled_to(&sync, 1, "a"));

    // The renderer's own scroll notification
    sync.handle_event(OverlayEvent::Scroll, start + Duration::from_millis(50));
    assert!(is_scrolled_to(&sync, 2, "b"));
    assert_eq!(listener_calls.get(), 0);

    sync.handle_event(OverlayEvent::Scroll, start + Duration::from_millis(400));
    assert!(!is_scrolled_to(&sync, 2, "b"));
    assert_eq!(sync.scrolled_to(), None);
    assert_eq!(listener_calls.get(), 1);
}

#[test]
fn scroll_to_moves_the_active_mark() {
    let start = Instant::now();
    let (mut sync, _) = synchronizer(MockRenderer::new(2, viewport()));
    sync.set_highlights(vec![
        highlight("a", 1, Rect::new(10.0, 10.0, 50.0, 10.0), false),
        highlight("b", 2, Rect::new(300.0, 20.0, 50.0, 10.0), false),
    ]);

    sync.scroll_to(&HighlightId::new("a"), start).unwrap();
    sync.scroll_to(&HighlightId::new("b"), start).unwrap();

    assert!(!is_scrolled_to(&sync, 1, "a"));
    assert!(is_scrolled_to(&sync, 2, "b"));
}

#[test]
fn scroll_to_rejects_unusable_targets() {
    let now = Instant::now();
    let (mut sync, _) = synchronizer(MockRenderer::new(2, viewport()));
    sync.set_highlights(vec![
        highlight("a", 1, Rect::new(10.0, 10.0, 50.0, 10.0), false),
        highlight("far", 9, Rect::new(10.0, 10.0, 50.0, 10.0), false),
    ]);

    assert!(matches!(
        sync.scroll_to(&HighlightId::new("missing"), now),
        Err(HighlightError::UnknownHighlight(_))
    ));
    assert!(matches!(
        sync.scroll_to(&HighlightId::new("far"), now),
        Err(HighlightError::InvalidPage { page: 9, page_count: 2 })
    ));

    sync.renderer_mut().page_mut(1).viewport = None;
    assert!(matches!(
        sync.scroll_to(&HighlightId::new("a"), now),
        Err(HighlightError::StaleViewport { page: 1 })
    ));
    assert!(sync.renderer().scroll_calls.is_empty());
    assert_eq!(sync.scrolled_to(), None);
}

#[test]
fn highlights_on_missing_pages_are_skipped() {
    let (mut sync, _) = synchronizer(MockRenderer::new(2, viewport()));
    sync.set_highlights(vec![
        highlight("zero", 0, Rect::new(10.0, 10.0, 50.0, 10.0), false),
        highlight("far", 7, Rect::new(10.0, 10.0, 50.0, 10.0), false),
        highlight("ok", 2, Rect::new(10.0, 10.0, 50.0, 10.0), false),
    ]);

    assert!(painted(&sync, 1).is_empty());
    assert_eq!(painted(&sync, 2).len(), 1);
    assert!(sync.layer(7).is_none());
}

#[test]
fn text_selection_flows_to_tip_and_ghost() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));

    finish_text_selection(&mut sync, start);

    let finished = finished.borrow();
    assert_eq!(finished.len(), 1);
    let (position, content, ticket) = finished[0].clone();
    assert_eq!(content, Content::text("two lines"));
    assert_eq!(position.page_number, 1);
    assert!(!position.use_pdf_coordinates);
    assert_eq!(
        position.bounding_rect,
        Scaled::from_rect(&Rect::new(0.0, 0.0, 80.0, 20.0), PAGE_WIDTH, PAGE_HEIGHT)
    );
    assert_eq!(position.rects.len(), 2);

    let tip = sync.tip().expect("selection tip");
    assert_eq!(tip.content, Item::Tip("two lines".into()));
    assert!((tip.anchor.left - 40.0).abs() < EPS);
    assert!((tip.anchor.bottom - 20.0).abs() < EPS);
    assert!(matches!(sync.selection_state(), SelectionState::PendingTip(_)));

    assert_eq!(sync.commit(ticket), Some(SelectionOutcome::Committed));
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
    assert!(sync.ghost().is_some());
    assert_eq!(
        painted(&sync, 1),
        vec![Item::Painted {
            id: None,
            index: 0,
            rect: Rect::new(0.0, 0.0, 80.0, 20.0),
            scrolled_to: false,
        }]
    );

    sync.handle_event(SimulatedEventSource::escape(), start + Duration::from_secs(2));
    assert!(sync.ghost().is_none());
    assert!(sync.tip().is_none());
    assert!(painted(&sync, 1).is_empty());
}

#[test]
fn ghost_is_painted_after_page_highlights() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(300.0, 10.0, 50.0, 10.0),
        false,
    )]);

    finish_text_selection(&mut sync, start);
    let ticket = finished.borrow()[0].2;
    sync.commit(ticket);

    let items = painted(&sync, 1);
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Item::Painted { id: Some(id), index: 0, .. } if id == "a"));
    assert!(matches!(&items[1], Item::Painted { id: None, index: 1, .. }));
}

#[test]
fn discard_continuation_returns_to_idle() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));

    finish_text_selection(&mut sync, start);
    let ticket = finished.borrow()[0].2;

    assert_eq!(sync.discard(ticket), Some(SelectionOutcome::Discarded));
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
    assert!(sync.tip().is_none());
    assert!(sync.ghost().is_none());

    // Already resolved
    assert_eq!(sync.commit(ticket), None);
    assert!(sync.ghost().is_none());
}

#[test]
fn collapsed_selection_never_reaches_the_caller() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));

    let mut source = TestScenarioBuilder::new(start)
        .select_text(1, "word", &scenario_a_rects()[..1])
        .wait_ms(100)
        .collapse_selection()
        .build();
    sync.drain_events(&mut source).unwrap();
    sync.poll(start + Duration::from_secs(5));

    assert!(finished.borrow().is_empty());
    assert!(sync.tip().is_none());
}

#[test]
fn click_away_cancels_pending_selection_but_tip_clicks_do_not() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));
    let now = finish_text_selection(&mut sync, start);
    assert_eq!(finished.borrow().len(), 1);

    let mut source = TestScenarioBuilder::new(now).pointer_down_in_tip().build();
    sync.drain_events(&mut source).unwrap();
    assert!(sync.tip().is_some());
    assert!(matches!(sync.selection_state(), SelectionState::PendingTip(_)));

    let mut source = TestScenarioBuilder::new(now).pointer_down(1, (300.0, 300.0)).build();
    sync.drain_events(&mut source).unwrap();
    assert!(sync.tip().is_none());
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
}

#[test]
fn user_scroll_discards_ghost() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));
    let now = finish_text_selection(&mut sync, start);
    let ticket = finished.borrow()[0].2;
    sync.commit(ticket);
    assert!(sync.ghost().is_some());

    sync.handle_event(OverlayEvent::Scroll, now);
    assert!(sync.ghost().is_none());
    assert!(painted(&sync, 1).is_empty());
}

#[test]
fn selection_without_viewport_is_dropped() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));
    sync.renderer_mut().page_mut(1).viewport = None;

    finish_text_selection(&mut sync, start);

    assert!(finished.borrow().is_empty());
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
}

#[test]
fn area_selection_captures_a_screenshot() {
    let start = Instant::now();
    let mut renderer = MockRenderer::new(1, viewport());
    renderer.paint(1, 2.0, [255, 0, 0, 255]);
    let (sync, finished) = synchronizer(renderer);
    let mut sync =
        sync.with_area_selection(|pointer| pointer.modifiers.contains(KeyModifiers::ALT));

    let mut source = TestScenarioBuilder::new(start)
        .alt_pointer_down(1, (10.0, 20.0))
        .wait_ms(50)
        .drag_to((60.0, 40.0))
        .wait_ms(50)
        .drag_to((110.0, 70.0))
        .pointer_up()
        .build();
    sync.drain_events(&mut source).unwrap();

    let finished = finished.borrow();
    assert_eq!(finished.len(), 1);
    let (position, content, _) = &finished[0];
    assert!(content.text.is_none());
    assert!(
        content
            .image
            .as_deref()
            .is_some_and(|uri| uri.starts_with("data:image/png;base64,"))
    );
    assert_eq!(
        position.bounding_rect,
        Scaled::from_rect(&Rect::new(20.0, 10.0, 100.0, 50.0), PAGE_WIDTH, PAGE_HEIGHT)
    );
    assert!(position.rects.is_empty());
    assert!(sync.tip().is_some());
}

#[test]
fn area_selection_needs_the_predicate() {
    let start = Instant::now();
    let mut renderer = MockRenderer::new(1, viewport());
    renderer.paint(1, 1.0, [0, 0, 255, 255]);
    let (sync, finished) = synchronizer(renderer);
    let mut sync =
        sync.with_area_selection(|pointer| pointer.modifiers.contains(KeyModifiers::ALT));

    let mut source = TestScenarioBuilder::new(start)
        .pointer_down(1, (10.0, 20.0))
        .drag_to((110.0, 70.0))
        .pointer_up()
        .build();
    sync.drain_events(&mut source).unwrap();

    assert!(finished.borrow().is_empty());
    assert!(sync.tip().is_none());
}

#[test]
fn area_selection_on_unpainted_page_is_dropped() {
    let start = Instant::now();
    let (sync, finished) = synchronizer(MockRenderer::new(1, viewport()));
    let mut sync = sync.with_area_selection(|_| true);

    let mut source = TestScenarioBuilder::new(start)
        .pointer_down(1, (10.0, 20.0))
        .drag_to((110.0, 70.0))
        .pointer_up()
        .build();
    sync.drain_events(&mut source).unwrap();

    assert!(finished.borrow().is_empty());
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
}

#[test]
fn highlight_tip_follows_zoom() {
    let open_tip = Rc::new(Cell::new(true));
    let (mut sync, _) =
        synchronizer_with_tips(MockRenderer::new(1, viewport()), Rc::clone(&open_tip));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(100.0, 50.0, 200.0, 30.0),
        false,
    )]);
    assert_eq!(
        sync.tip().map(|tip| tip.content.clone()),
        Some(Item::Tip("tip at 100".into()))
    );

    open_tip.set(false);
    sync.set_scale_value(ScaleValue::Custom(2.0));
    let tip = sync.tip().expect("tip survives re-render");
    assert_eq!(tip.content, Item::Tip("tip at 200".into()));
    assert!((tip.anchor.top - 200.0).abs() < EPS);

    sync.handle_event(SimulatedEventSource::escape(), Instant::now());
    assert!(sync.tip().is_none());
}

#[test]
fn highlight_tip_is_suppressed_during_selection() {
    let start = Instant::now();
    let open_tip = Rc::new(Cell::new(false));
    let (mut sync, _) =
        synchronizer_with_tips(MockRenderer::new(1, viewport()), Rc::clone(&open_tip));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(300.0, 50.0, 200.0, 30.0),
        false,
    )]);
    finish_text_selection(&mut sync, start);

    open_tip.set(true);
    sync.handle_event(RendererEvent::TextLayerRendered(1).into(), start);

    assert_eq!(
        sync.tip().map(|tip| tip.content.clone()),
        Some(Item::Tip("two lines".into()))
    );
}

#[test]
fn attaching_a_document_drops_overlay_state() {
    let start = Instant::now();
    let (mut sync, _) = synchronizer(MockRenderer::new(2, viewport()));
    sync.set_highlights(vec![highlight(
        "a",
        1,
        Rect::new(10.0, 10.0, 50.0, 10.0),
        false,
    )]);
    sync.scroll_to(&HighlightId::new("a"), start).unwrap();
    finish_text_selection(&mut sync, start);

    let old = sync.attach_document(MockRenderer::unrendered(5, viewport()));

    assert_eq!(old.scroll_calls.len(), 1);
    assert_eq!(sync.layers().count(), 0);
    assert!(sync.tip().is_none());
    assert!(sync.scrolled_to().is_none());
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
    assert!(!sync.is_document_ready());
    assert_eq!(sync.renderer().page_count(), 5);
}

#[test]
fn full_session_through_event_source() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::unrendered(2, viewport()));
    sync.set_highlights(vec![highlight(
        "a",
        2,
        Rect::new(100.0, 50.0, 200.0, 30.0),
        true,
    )]);

    sync.renderer_mut().render_text_layer(2);
    let mut source = TestScenarioBuilder::new(start)
        .document_ready()
        .wait_ms(10)
        .text_layer_rendered(2)
        .wait_ms(10)
        .select_text(2, "hello", &[Rect::new(5.0, 5.0, 40.0, 12.0)])
        .wait_ms(600)
        .press_escape()
        .build();
    sync.drain_events(&mut source).unwrap();

    assert!(sync.is_document_ready());
    assert_rect_close(&painted_rect(&sync, 2, 0), &Rect::new(670.0, 50.0, 200.0, 30.0));
    assert_eq!(finished.borrow().len(), 1);
    // Escape arrived after the tip was shown
    assert!(sync.tip().is_none());
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
}

#[test]
fn new_selection_then_collapse_closes_the_previous_tip() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));
    let now = finish_text_selection(&mut sync, start);
    let ticket = finished.borrow()[0].2;
    assert!(sync.tip().is_some());

    let mut source = TestScenarioBuilder::new(now)
        .select_text(1, "other", &scenario_a_rects()[1..2])
        .wait_ms(50)
        .collapse_selection()
        .build();
    let last = sync.drain_events(&mut source).unwrap().unwrap();
    sync.poll(last + Duration::from_secs(2));

    assert!(sync.tip().is_none());
    assert!(matches!(sync.selection_state(), SelectionState::Idle));
    assert_eq!(sync.commit(ticket), None);
    assert!(sync.ghost().is_none());
    assert_eq!(finished.borrow().len(), 1);
}

#[test]
fn scroll_during_text_selection_lets_it_finish() {
    let start = Instant::now();
    let (mut sync, finished) = synchronizer(MockRenderer::new(1, viewport()));

    let mut source = TestScenarioBuilder::new(start)
        .select_text(1, "two", &scenario_a_rects()[..1])
        .wait_ms(100)
        .scroll()
        .build();
    sync.drain_events(&mut source).unwrap();
    assert!(matches!(sync.selection_state(), SelectionState::Selecting(_)));

    sync.poll(start + Duration::from_secs(2));

    assert_eq!(finished.borrow().len(), 1);
    assert_eq!(
        sync.tip().map(|tip| tip.content.clone()),
        Some(Item::Tip("two".into()))
    );
}

#[test]
fn highlight_tip_can_be_opened_between_render_passes() {
    let start = Instant::now();
    let (mut sync, _) = synchronizer(MockRenderer::new(2, viewport()));
    sync.set_highlights(vec![
        highlight("a", 1, Rect::new(100.0, 50.0, 200.0, 30.0), false),
        highlight("far", 9, Rect::new(10.0, 10.0, 50.0, 10.0), false),
    ]);
    assert!(sync.tip().is_none());

    let opened = sync
        .set_highlight_tip(&HighlightId::new("a"), |h| {
            Item::Tip(format!("pinned at {}", h.position.bounding_rect.top))
        })
        .unwrap();
    assert!(opened);
    assert_eq!(
        sync.tip().map(|tip| tip.content.clone()),
        Some(Item::Tip("pinned at 100".into()))
    );

    sync.set_scale_value(ScaleValue::Custom(2.0));
    assert_eq!(
        sync.tip().map(|tip| tip.content.clone()),
        Some(Item::Tip("pinned at 200".into()))
    );

    assert!(matches!(
        sync.set_highlight_tip(&HighlightId::new("missing"), |_| Item::Tip(String::new())),
        Err(HighlightError::UnknownHighlight(_))
    ));
    assert!(matches!(
        sync.set_highlight_tip(&HighlightId::new("far"), |_| Item::Tip(String::new())),
        Err(HighlightError::InvalidPage { page: 9, page_count: 2 })
    ));

    sync.handle_event(SimulatedEventSource::escape(), start);
    assert!(sync.tip().is_none());

    // A pending selection keeps its own tip
    finish_text_selection(&mut sync, start);
    let opened = sync
        .set_highlight_tip(&HighlightId::new("a"), |_| Item::Tip("pinned".into()))
        .unwrap();
    assert!(!opened);
    assert_eq!(
        sync.tip().map(|tip| tip.content.clone()),
        Some(Item::Tip("two lines".into()))
    );
}
