//! Retransmission timer.
//!
//! Reliable delivery requires that unacknowledged frames are re-sent if no
//! ACK arrives within a bounded time.  [`RetransmitTimer`] is deliberately
//! simple: a fixed timeout and the instant it was last armed.  Nothing fires
//! on its own; the receive loop polls [`RetransmitTimer::is_expired`] on
//! every tick.
//!
//! All methods take `now` explicitly so state machines stay deterministic
//! under test.

use std::time::{Duration, Instant};

/// Elapsed-time check against a fixed timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitTimer {
    timeout: Duration,
    armed_at: Instant,
}

impl RetransmitTimer {
    /// Create a timer armed at `now`.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            armed_at: now,
        }
    }

    /// Re-arm the timer (call on every (re)transmission).
    pub fn reset(&mut self, now: Instant) {
        self.armed_at = now;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.armed_at)
    }

    /// `true` once strictly more than `timeout` has passed since arming.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now) > self.timeout
    }
}
