//! Last-call-wins timer
//!
//! Time is passed in by the caller, so the owner's event loop decides when to
//! poll and tests can drive it with synthetic instants.

use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pending<T> {
    // None when the window runs past the end of `Instant`; only `flush` releases it.
    deadline: Option<Instant>,
    value: T,
}

/// Coalesces bursts of calls into one, fired once `window` has passed
/// without another call.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `value`, superseding anything still pending
    pub fn call(&mut self, value: T, now: Instant) {
        self.pending = Some(Pending {
            deadline: now.checked_add(self.window),
            value,
        });
    }

    /// Take the pending value if its quiet window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.deadline.is_some_and(|d| now >= d) => {
                self.pending.take().map(|p| p.value)
            }
            _ => None,
        }
    }

    /// Take the pending value now, ignoring the window
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and_then(|p| p.deadline)
    }
}
