//! Poll timer driven by the agent loop.
//!
//! The timer never fires on its own; the loop asks for its [`deadline`] and
//! calls [`fire_if_due`] once that instant has passed.
//!
//! [`deadline`]: PollTimer::deadline
//! [`fire_if_due`]: PollTimer::fire_if_due

use std::time::{Duration, Instant};

/// At most one live recurring timer.
#[derive(Debug, Default, Clone)]
pub struct PollTimer {
    next_fire: Option<Instant>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`. No-op if already running.
    ///
    /// Returns whether a new timer was started.
    pub fn start(&mut self, now: Instant, interval: Duration) -> bool {
        if self.next_fire.is_some() {
            return false;
        }
        self.next_fire = Some(now + interval);
        true
    }

    /// Stop the timer. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        self.next_fire.take().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.next_fire.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Report a tick if one is due and schedule the next one `interval` later.
    ///
    /// The interval is passed on every call so a changed poll interval takes
    /// effect from the next tick on.
    pub fn fire_if_due(&mut self, now: Instant, interval: Duration) -> bool {
        match self.next_fire {
            Some(at) if at <= now => {
                self.next_fire = Some(now + interval);
                true
            }
            _ => false,
        }
    }
}
