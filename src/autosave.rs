//! Debounced auto-save scheduling.
//!
//! Time is passed in by the caller, so the scheduler has no timers or threads
//! of its own and behaves identically under test.

use std::time::{Duration, Instant};

/// Default quiescence delay between the last edit and the save.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

/// Tracks whether a save is due. Each edit pushes the deadline out; an edit
/// inside the window supersedes the pending save instead of queueing another.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records an edit at `now`, superseding any pending save.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true, and clears the pending save, if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drops any pending save. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}
