//! rdt 1.0: reliable transfer over a perfectly reliable channel.
//!
//! No checksum, no acknowledgement, no retransmission: every payload is
//! transmitted once and everything received is delivered verbatim.  Over the
//! fault-injecting channel this variant visibly delivers garbage, which is
//! the point.

use std::time::Instant;

use crate::frame::{FrameCodec, Layout};
use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};

const CODEC: FrameCodec = FrameCodec::new(Layout::Raw);

#[derive(Debug, Default)]
pub struct Rdt10;

impl Rdt10 {
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for Rdt10 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rdt10
    }

    fn send(&mut self, payload: &[u8], _now: Instant) -> Result<Vec<u8>, StateError> {
        log::debug!("[rdt1.0] → DATA len={}", payload.len());
        Ok(CODEC.encode(None, payload))
    }

    fn on_datagram(&mut self, datagram: &[u8], _now: Instant) -> Actions {
        // The raw layout has no minimum size, so decoding cannot fail.
        let Ok(frame) = CODEC.decode(datagram) else {
            return Actions::none();
        };
        log::debug!("[rdt1.0] ← DATA len={}", frame.payload.len());
        Actions {
            transmit: Vec::new(),
            deliver: vec![frame.payload],
        }
    }

    fn on_tick(&mut self, _now: Instant) -> Vec<Vec<u8>> {
        Vec::new()
    }
}
