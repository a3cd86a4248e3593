//! Outbound frame state for stop-and-wait reliability.
//!
//! [`Sender`] holds the single in-flight frame so it can be retransmitted
//! verbatim.  It does **not** touch the socket; the engines call these
//! methods and the endpoint owns the actual send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** frame is in flight at any moment (`unacked`).
//! - On ACK: clear `unacked`.
//! - On NAK, corruption or timeout: resend the same bytes unchanged.

use std::time::Instant;

// ---------------------------------------------------------------------------
// RetransmitEntry
// ---------------------------------------------------------------------------

/// A frame that has been sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// The encoded frame exactly as it went on the wire.
    pub datagram: Vec<u8>,
    /// How many times this frame has been transmitted (1 = first send).
    pub tx_count: u32,
    /// Time of the most recent transmission.
    pub sent_at: Instant,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Stop-and-wait send-side retransmission slot.
#[derive(Debug, Default)]
pub struct Sender {
    /// The in-flight frame, or `None` when the sender is idle.
    pub unacked: Option<RetransmitEntry>,
}

impl Sender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `datagram` into the in-flight slot (first transmission).
    ///
    /// Replaces any previous frame; rdt 2.0 can abandon an exchange without
    /// ever seeing its ACK.
    pub fn record_sent(&mut self, datagram: Vec<u8>, now: Instant) {
        self.unacked = Some(RetransmitEntry {
            datagram,
            tx_count: 1,
            sent_at: now,
        });
    }

    /// Bytes to put back on the wire, bumping the transmission count.
    ///
    /// Returns `None` when nothing is in flight.
    pub fn retransmit(&mut self, now: Instant) -> Option<Vec<u8>> {
        let entry = self.unacked.as_mut()?;
        entry.tx_count += 1;
        log::debug!(
            "[sender] transmission #{} after {:?}",
            entry.tx_count,
            now.saturating_duration_since(entry.sent_at)
        );
        entry.sent_at = now;
        Some(entry.datagram.clone())
    }

    /// Drop the in-flight frame (acknowledged or abandoned).
    pub fn clear(&mut self) {
        self.unacked = None;
    }

    /// Number of times the in-flight frame has been sent, or `0` when idle.
    pub fn tx_count(&self) -> u32 {
        self.unacked.as_ref().map_or(0, |e| e.tx_count)
    }

    pub fn has_unacked(&self) -> bool {
        self.unacked.is_some()
    }
}
