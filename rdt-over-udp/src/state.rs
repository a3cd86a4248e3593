//! Stop-and-wait endpoint state.
//!
//! Every stop-and-wait engine is both a sender and a receiver.  Its state is
//! a single per-engine value: the current [`Phase`] plus one mod-2 sequence
//! counter per role.  Keeping the counters here (and not on a shared phase
//! enum) means two engines can never alias each other's sequence numbers.
//!
//! ```text
//!                  send()
//!  WaitForRequest ────────▶ WaitForAck
//!        ▲                      │
//!        └──── matching ACK ────┘
//! ```

use std::fmt;

/// Which half of the exchange the endpoint is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Idle: accepts a new send(), answers inbound data.
    #[default]
    WaitForRequest,
    /// A frame is outstanding; send() is rejected.
    WaitForAck,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitForRequest => f.write_str("waiting for request"),
            Self::WaitForAck => f.write_str("waiting for ACK"),
        }
    }
}

/// `{phase, sender_seq, receiver_seq}` for one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointState {
    pub phase: Phase,
    /// Sequence number carried by the next (or outstanding) data frame.
    pub sender_seq: u8,
    /// Sequence number expected from the peer's next new data frame.
    pub receiver_seq: u8,
}

impl EndpointState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_waiting_for_ack(&self) -> bool {
        self.phase == Phase::WaitForAck
    }

    /// Sequence number of the last frame delivered to the application.
    pub fn last_delivered_seq(&self) -> u8 {
        flip(self.receiver_seq)
    }

    /// Outstanding frame confirmed: flip `sender_seq` and go idle.
    pub fn complete_send(&mut self) {
        self.sender_seq = flip(self.sender_seq);
        self.phase = Phase::WaitForRequest;
    }

    /// A new in-order frame was delivered: expect the other sequence next.
    pub fn advance_receiver(&mut self) {
        self.receiver_seq = flip(self.receiver_seq);
    }
}

/// Next value of a mod-2 sequence counter.
#[inline]
pub fn flip(seq: u8) -> u8 {
    (seq + 1) % 2
}
