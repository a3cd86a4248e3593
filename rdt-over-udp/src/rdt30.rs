//! rdt 3.0: rdt 2.2 plus a retransmission timer.
//!
//! Handles outright loss: while a frame is outstanding, every tick checks the
//! timer and resends once it has expired.  The timer is re-armed on the first
//! send and on every retransmission, whether it was triggered by the timer or
//! by a corrupted/mismatched ACK.

use std::time::{Duration, Instant};

use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};
use crate::rdt22::Rdt22;
use crate::timer::RetransmitTimer;

#[derive(Debug)]
pub struct Rdt30 {
    inner: Rdt22,
    timer: RetransmitTimer,
}

impl Rdt30 {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            inner: Rdt22::tagged("rdt3.0"),
            timer: RetransmitTimer::new(timeout, now),
        }
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }
}

impl Protocol for Rdt30 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rdt30
    }

    fn send(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, StateError> {
        let datagram = self.inner.send(payload, now)?;
        self.timer.reset(now);
        Ok(datagram)
    }

    fn on_datagram(&mut self, datagram: &[u8], now: Instant) -> Actions {
        let before = self.inner.tx_count();
        let actions = self.inner.on_datagram(datagram, now);
        if self.inner.tx_count() > before {
            self.timer.reset(now);
        }
        actions
    }

    fn on_tick(&mut self, now: Instant) -> Vec<Vec<u8>> {
        if !self.inner.state().is_waiting_for_ack() || !self.timer.is_expired(now) {
            return Vec::new();
        }
        log::debug!(
            "[rdt3.0] timeout after {:?}; retransmitting seq={}",
            self.timer.elapsed(now),
            self.inner.state().sender_seq
        );
        self.timer.reset(now);
        self.inner.resend(now).into_iter().collect()
    }
}
