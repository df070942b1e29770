//! Engine timer bookkeeping.

use std::time::{Duration, Instant};

/// The single wake-up deadline requested by the engine.
///
/// A new request replaces the previous one; there is never more than one
/// pending timer.
#[derive(Debug, Default)]
pub struct TimerState {
    deadline: Option<Instant>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one engine timer event. `None` clears the timer.
    pub fn apply(&mut self, timeout: Option<Duration>) {
        self.deadline = timeout.map(|t| Instant::now() + t);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Time left until the deadline; zero when already due.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_due(&self) -> bool {
        matches!(self.remaining(), Some(Duration::ZERO))
    }
}
