//! Cancellable periodic timer.
//!
//! The timer holds only a deadline. The runtime sleeps until
//! [`CounterTimer::deadline`] and then calls [`CounterTimer::fire`]; nothing
//! runs in the background, so cancelling is just clearing the deadline and a
//! session close can never leave a tick behind.

use std::time::{Duration, Instant};

/// Periodic timer owned by one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterTimer {
    schedule: Option<(Instant, Duration)>,
}

impl CounterTimer {
    /// Stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start firing every `interval`, first at `now + interval`.
    ///
    /// Restarting a running timer moves its next deadline.
    pub fn start(&mut self, now: Instant, interval: Duration) {
        self.schedule = Some((now + interval, interval));
    }

    /// Stop the timer. Returns whether it was running.
    pub fn cancel(&mut self) -> bool {
        self.schedule.take().is_some()
    }

    /// Timer is running.
    pub fn is_running(&self) -> bool {
        self.schedule.is_some()
    }

    /// Next time the timer fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.schedule.map(|(at, _)| at)
    }

    /// Fire if the deadline has passed, scheduling the next deadline.
    ///
    /// Missed periods collapse into one tick.
    pub fn fire(&mut self, now: Instant) -> bool {
        let Some((at, interval)) = self.schedule else {
            return false;
        };
        if now < at {
            return false;
        }
        let mut next = at + interval;
        if next <= now {
            next = now + interval;
        }
        self.schedule = Some((next, interval));
        true
    }
}
