//! Debounce timer state.
//!
//! [`Debouncer`] owns at most one pending payload and its deadline.
//! Scheduling replaces both, which cancels the previous invocation; only the
//! payload present when the deadline passes is ever released. The state
//! machine takes the current time as input and never sleeps itself, so the
//! caller decides how to wait for [`Debouncer::deadline`].

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending payload and restart the timer from `now`.
    pub fn schedule(&mut self, payload: T, now: Instant) {
        self.pending = Some((payload, now + self.delay));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Release the payload if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(p, _)| p),
            _ => None,
        }
    }

    /// Release the pending payload immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(p, _)| p)
    }

    /// Drop the pending payload.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
