use anyhow::Result;
pub use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

use crate::highlight::{RendererEvent, SelectionChange};

/// Pointer press over the document container
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerDown {
    /// Page under the pointer, if any
    pub page: Option<u32>,
    /// Page-relative viewport pixels
    pub point: (f64, f64),
    /// Pressed inside the floating tip UI
    pub inside_tip: bool,
    pub modifiers: KeyModifiers,
}

/// Everything the overlay reacts to
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayEvent {
    Renderer(RendererEvent),
    SelectionChanged(SelectionChange),
    PointerDown(PointerDown),
    PointerMove((f64, f64)),
    PointerUp,
    Key(KeyEvent),
    Scroll,
    Resize,
}

impl From<RendererEvent> for OverlayEvent {
    fn from(event: RendererEvent) -> Self {
        OverlayEvent::Renderer(event)
    }
}

/// An event stamped with the time it happened
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    pub at: Instant,
    pub event: OverlayEvent,
}

/// Trait for abstracting event sources to enable testing
pub trait EventSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<TimedEvent>;
}

/// Simulated event source for testing
pub struct SimulatedEventSource {
    start: Instant,
    pub(crate) events: Vec<(Duration, OverlayEvent)>,
    current_index: usize,
}

impl SimulatedEventSource {
    /// Events are given as offsets from `start`
    pub fn new(start: Instant, events: Vec<(Duration, OverlayEvent)>) -> Self {
        Self {
            start,
            events,
            current_index: 0,
        }
    }

    /// Helper method to create a key event
    pub fn key_event(code: KeyCode, modifiers: KeyModifiers) -> OverlayEvent {
        OverlayEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        })
    }

    pub fn escape() -> OverlayEvent {
        Self::key_event(KeyCode::Esc, KeyModifiers::empty())
    }

    /// Pointer press on `page`, outside any tip
    pub fn pointer_down(page: u32, point: (f64, f64), modifiers: KeyModifiers) -> OverlayEvent {
        OverlayEvent::PointerDown(PointerDown {
            page: Some(page),
            point,
            inside_tip: false,
            modifiers,
        })
    }

    /// Time of the last scheduled event
    pub fn end(&self) -> Instant {
        self.events
            .last()
            .map_or(self.start, |(offset, _)| self.start + *offset)
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<TimedEvent> {
        let (offset, event) = self
            .events
            .get(self.current_index)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("simulated event source exhausted"))?;
        self.current_index += 1;
        Ok(TimedEvent {
            at: self.start + offset,
            event,
        })
    }
}
