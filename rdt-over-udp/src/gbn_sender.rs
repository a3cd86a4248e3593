//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] maintains a circular window over a sequence space of `W`
//! numbers.  Unlike stop-and-wait, multiple frames may be outstanding
//! simultaneously.
//!
//! # Protocol contract
//!
//! - At most `W − 1` frames may be in flight at once, so `next` can never
//!   catch up with `base` and a cumulative ACK is never ambiguous.
//! - ACKs are **cumulative**: `ACK(n)` means the receiver has accepted every
//!   frame up to and including sequence number `n`.
//! - Every frame carries its own [`RetransmitTimer`].  The oldest frame
//!   expires first and the rest follow, so on a loss the whole window goes
//!   back out ("go back N").
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::timer::RetransmitTimer;

// ---------------------------------------------------------------------------
// GbnEntry
// ---------------------------------------------------------------------------

/// A single in-flight frame occupying one slot in the window.
#[derive(Debug, Clone)]
pub struct GbnEntry {
    pub sequence: u8,
    /// The encoded frame (ready to hand to the socket).
    pub datagram: Vec<u8>,
    /// Total number of times this frame has been transmitted.
    pub tx_count: u32,
    pub timer: RetransmitTimer,
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one endpoint.
///
/// # Sequence-number layout
///
/// ```text
///       base               next
///        │                   │
///  ──────┼───────────────────┼──────────────┐
///        │ <── in flight ──▶ │ <── free ──▶ │  (mod W)
/// ```
#[derive(Debug)]
pub struct GbnSender {
    /// Sequence number of the **oldest** unacked frame (left window edge).
    base: usize,
    /// Size of the sequence space (W).
    capacity: usize,
    timeout: Duration,
    /// In-flight frames ordered by sequence number (front = `base`).
    window: VecDeque<GbnEntry>,
}

impl GbnSender {
    /// Create a new [`GbnSender`] over a sequence space of `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is outside `2..=256`.
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        assert!(
            (2..=256).contains(&capacity),
            "Go-Back-N window must be in 2..=256, got {capacity}"
        );
        Self {
            base: 0,
            capacity,
            timeout,
            window: VecDeque::with_capacity(capacity - 1),
        }
    }

    pub fn base(&self) -> u8 {
        self.base as u8
    }

    /// Sequence number the next new frame will carry.
    pub fn next_sequence(&self) -> u8 {
        ((self.base + self.window.len()) % self.capacity) as u8
    }

    /// `true` when there is room for at least one more in-flight frame.
    pub fn can_send(&self) -> bool {
        self.window.len() < self.capacity - 1
    }

    /// Number of frames currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    pub fn has_unacked(&self) -> bool {
        !self.window.is_empty()
    }

    /// Place a just-transmitted frame into the window under
    /// [`next_sequence`](Self::next_sequence) and arm its timer.
    ///
    /// Check [`can_send`](Self::can_send) before calling.
    pub fn record_sent(&mut self, datagram: Vec<u8>, now: Instant) {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full Go-Back-N window ({} / {})",
            self.window.len(),
            self.capacity - 1
        );
        let sequence = self.next_sequence();
        self.window.push_back(GbnEntry {
            sequence,
            datagram,
            tx_count: 1,
            timer: RetransmitTimer::new(self.timeout, now),
        });
    }

    /// Process a cumulative ACK.
    ///
    /// Removes every frame in `[base, ack]`, advances `base` past `ack`, and
    /// returns the number of newly acknowledged frames.  Returns `0` for a
    /// stale ACK (outside the outstanding range).
    pub fn on_ack(&mut self, ack: u8) -> usize {
        let offset = (ack as usize + self.capacity - self.base) % self.capacity;
        if offset >= self.window.len() {
            return 0;
        }
        let acked = offset + 1;
        self.window.drain(..acked);
        self.base = (self.base + acked) % self.capacity;
        acked
    }

    /// Datagrams whose individual timer has expired, oldest first.
    ///
    /// Each returned frame is re-armed at `now` and its `tx_count` bumped.
    pub fn due_for_resend(&mut self, now: Instant) -> Vec<Vec<u8>> {
        self.window
            .iter_mut()
            .filter(|entry| entry.timer.is_expired(now))
            .map(|entry| {
                entry.tx_count += 1;
                entry.timer.reset(now);
                entry.datagram.clone()
            })
            .collect()
    }

    /// Iterate over all in-flight frames from oldest to newest.
    pub fn window_entries(&self) -> impl Iterator<Item = &GbnEntry> {
        self.window.iter()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn filled(capacity: usize, frames: usize, now: Instant) -> GbnSender {
        let mut s = GbnSender::new(capacity, TIMEOUT);
        for i in 0..frames {
            s.record_sent(vec![i as u8], now);
        }
        s
    }

    #[test]
    fn initial_state() {
        let s = GbnSender::new(4, TIMEOUT);
        assert_eq!(s.base(), 0);
        assert_eq!(s.next_sequence(), 0);
        assert!(s.can_send());
        assert!(!s.has_unacked());
    }

    #[test]
    fn window_admits_capacity_minus_one() {
        let now = Instant::now();
        let s = filled(4, 3, now);
        assert!(!s.can_send());
        assert_eq!(s.in_flight(), 3);
        assert_eq!(s.next_sequence(), 3);
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let mut s = filled(8, 3, Instant::now());
        assert_eq!(s.on_ack(1), 2);
        assert_eq!(s.base(), 2);
        assert_eq!(s.in_flight(), 1);
        assert_eq!(s.window_entries().next().map(|e| e.sequence), Some(2));
    }

    #[test]
    fn stale_and_future_acks_are_ignored() {
        let mut s = filled(8, 2, Instant::now());
        assert_eq!(s.on_ack(0), 1);
        assert_eq!(s.on_ack(0), 0, "duplicate");
        assert_eq!(s.on_ack(5), 0, "beyond next");
        assert_eq!(s.base(), 1);
    }

    #[test]
    fn initial_receiver_ack_is_stale_with_full_window() {
        // A fresh receiver acknowledges W - 1 before anything arrives.
        let mut s = filled(4, 3, Instant::now());
        assert_eq!(s.on_ack(3), 0);
        assert_eq!(s.in_flight(), 3);
    }

    #[test]
    fn sequence_numbers_wrap_modulo_capacity() {
        let now = Instant::now();
        let mut s = GbnSender::new(3, TIMEOUT);
        for _ in 0..4 {
            s.record_sent(vec![], now);
            let seq = s.window_entries().last().map(|e| e.sequence).unwrap();
            assert_eq!(s.on_ack(seq), 1);
        }
        assert_eq!(s.base(), 1);
        s.record_sent(vec![], now);
        s.record_sent(vec![], now);
        assert_eq!(s.next_sequence(), 0);
        assert_eq!(s.on_ack(2), 2);
        assert!(!s.has_unacked());
    }

    #[test]
    fn expired_frames_go_back_out_in_order() {
        let start = Instant::now();
        let mut s = GbnSender::new(8, TIMEOUT);
        s.record_sent(vec![0], start);
        s.record_sent(vec![1], start + Duration::from_millis(50));

        assert!(s.due_for_resend(start + Duration::from_millis(60)).is_empty());
        assert_eq!(
            s.due_for_resend(start + Duration::from_millis(120)),
            vec![vec![0]]
        );
        assert_eq!(
            s.due_for_resend(start + Duration::from_millis(230)),
            vec![vec![0], vec![1]]
        );
        assert_eq!(s.window_entries().map(|e| e.tx_count).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    #[should_panic(expected = "2..=256")]
    fn oversized_window_panics() {
        GbnSender::new(257, TIMEOUT);
    }
}
