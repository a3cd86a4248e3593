//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** frames are accepted (`seq == expected`).
//! - Out-of-order or duplicate frames are **silently discarded**.
//! - After every data frame (accepted or not) the caller should send a
//!   **cumulative ACK** carrying [`ack_number`](GbnReceiver::ack_number),
//!   the last in-order sequence number received.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

// ---------------------------------------------------------------------------
// GbnReceiver
// ---------------------------------------------------------------------------

/// Go-Back-N receive-side state for one endpoint.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next expected sequence number, modulo `capacity`.
    expected: usize,
    capacity: usize,
}

impl GbnReceiver {
    /// Create a receiver over a sequence space of `capacity` (W).
    pub fn new(capacity: usize) -> Self {
        assert!(
            (2..=256).contains(&capacity),
            "Go-Back-N window must be in 2..=256, got {capacity}"
        );
        Self {
            expected: 0,
            capacity,
        }
    }

    pub fn expected(&self) -> u8 {
        self.expected as u8
    }

    /// Process an inbound data frame.
    ///
    /// Returns the payload to deliver if the frame was **accepted**, or
    /// `None` for an out-of-order or duplicate frame.  Either way the caller
    /// should answer with [`ack_number`](Self::ack_number).
    pub fn on_frame(&mut self, seq: u8, payload: Vec<u8>) -> Option<Vec<u8>> {
        if seq as usize == self.expected {
            self.expected = (self.expected + 1) % self.capacity;
            Some(payload)
        } else {
            None
        }
    }

    /// Cumulative ACK number (`expected − 1 mod W`).
    pub fn ack_number(&self) -> u8 {
        ((self.expected + self.capacity - 1) % self.capacity) as u8
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
