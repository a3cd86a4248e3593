//! Selective-Repeat send-side state machine.
//!
//! Sequence numbers run modulo `2W`; the frames themselves live in a
//! circular buffer of `W` slots indexed by `seq % W`, so a slot is reused
//! only after the frame `W` numbers earlier has been acknowledged.
//!
//! ```text
//!  slots:  [ 2 ][ 3 ][ . ][ 5 ][ . ]     W = 5, base = 2, next = 6
//!           ▲              ▲
//!           base           acked out of order, kept until base passes
//! ```
//!
//! Each frame has its own timer and is retransmitted alone.

use std::time::{Duration, Instant};

use crate::timer::RetransmitTimer;

/// A single in-flight frame.
#[derive(Debug, Clone)]
pub struct SrEntry {
    pub sequence: u8,
    pub datagram: Vec<u8>,
    pub tx_count: u32,
    pub timer: RetransmitTimer,
}

/// Selective-Repeat send-side state for one endpoint.
#[derive(Debug)]
pub struct SrSender {
    base: usize,
    next: usize,
    timeout: Duration,
    slots: Box<[Option<SrEntry>]>,
}

impl SrSender {
    /// # Panics
    ///
    /// Panics if `window_size` is outside `2..=128`.
    pub fn new(window_size: usize, timeout: Duration) -> Self {
        assert!(
            (2..=128).contains(&window_size),
            "Selective-Repeat window must be in 2..=128, got {window_size}"
        );
        Self {
            base: 0,
            next: 0,
            timeout,
            slots: vec![None; window_size].into_boxed_slice(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.slots.len()
    }

    fn sequence_space(&self) -> usize {
        2 * self.slots.len()
    }

    fn index(&self, sequence: usize) -> usize {
        sequence % self.slots.len()
    }

    pub fn base(&self) -> u8 {
        self.base as u8
    }

    pub fn next_sequence(&self) -> u8 {
        self.next as u8
    }

    /// Frames between `base` and `next`, acknowledged or not.
    pub fn in_flight(&self) -> usize {
        (self.next + self.sequence_space() - self.base) % self.sequence_space()
    }

    pub fn can_send(&self) -> bool {
        self.in_flight() < self.window_size() - 1
    }

    pub fn has_unacked(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Store a just-transmitted frame under [`next_sequence`](Self::next_sequence).
    ///
    /// Check [`can_send`](Self::can_send) before calling.
    pub fn record_sent(&mut self, datagram: Vec<u8>, now: Instant) {
        debug_assert!(self.can_send(), "record_sent called on a full Selective-Repeat window");
        let index = self.index(self.next);
        self.slots[index] = Some(SrEntry {
            sequence: self.next as u8,
            datagram,
            tx_count: 1,
            timer: RetransmitTimer::new(self.timeout, now),
        });
        self.next = (self.next + 1) % self.sequence_space();
    }

    /// Acknowledge exactly one frame and slide `base` past every
    /// acknowledged frame at the front of the window.
    ///
    /// Returns `false` when `ack` is not outstanding (stale or duplicate).
    pub fn on_ack(&mut self, ack: u8) -> bool {
        let ack = ack as usize;
        let space = self.sequence_space();
        if ack >= space || (ack + space - self.base) % space >= self.in_flight() {
            return false;
        }
        let index = self.index(ack);
        let matches = self.slots[index]
            .as_ref()
            .is_some_and(|entry| entry.sequence as usize == ack);
        if !matches {
            return false;
        }
        self.slots[index] = None;

        while self.base != self.next && self.slots[self.index(self.base)].is_none() {
            self.base = (self.base + 1) % space;
        }
        true
    }

    /// Datagrams whose own timer has expired; each is re-armed at `now`.
    pub fn due_for_resend(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        for offset in 0..self.in_flight() {
            let index = self.index(self.base + offset);
            if let Some(entry) = self.slots[index].as_mut() {
                if entry.timer.is_expired(now) {
                    entry.tx_count += 1;
                    entry.timer.reset(now);
                    due.push(entry.datagram.clone());
                }
            }
        }
        due
    }

    pub fn entry(&self, sequence: u8) -> Option<&SrEntry> {
        self.slots[self.index(sequence as usize)]
            .as_ref()
            .filter(|entry| entry.sequence == sequence)
    }
}
