//! Per-channel suppression of mechanical bounce.

use std::time::{Duration, Instant};

/// Accepts at most one transition per window.
///
/// The window starts at the last *accepted* transition; suppressed
/// transitions do not extend it.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_fired: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if a transition observed at `at` must produce an event.
    pub fn accept(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last_fired {
            if at.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_fired = Some(at);
        true
    }
}
