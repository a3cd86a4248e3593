//! Selective-Repeat engine: [`SrSender`] and [`SrReceiver`] behind one
//! [`Protocol`].
//!
//! ```text
//!  send()      → DATA(next)     (WindowFull if W − 1 in flight)
//!  ← DATA(s)   → ACK(s)         buffer if in window, deliver contiguous run
//!  ← ACK(n)    → clear slot n   slide base over cleared slots
//!  tick        → resend each frame whose own timer expired
//! ```

use std::time::{Duration, Instant};

use crate::frame::{Control, FrameCodec, Layout};
use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};
use crate::sr_receiver::{Disposition, SrReceiver};
use crate::sr_sender::SrSender;

const CODEC: FrameCodec = FrameCodec::new(Layout::Sequenced {
    control_covers_sequence: true,
});

#[derive(Debug)]
pub struct SelectiveRepeat {
    sender: SrSender,
    receiver: SrReceiver,
}

impl SelectiveRepeat {
    /// # Panics
    ///
    /// Panics if `window_size` is outside `2..=128`.
    pub fn new(window_size: usize, timeout: Duration) -> Self {
        Self {
            sender: SrSender::new(window_size, timeout),
            receiver: SrReceiver::new(window_size),
        }
    }

    pub fn sender(&self) -> &SrSender {
        &self.sender
    }

    pub fn receiver(&self) -> &SrReceiver {
        &self.receiver
    }
}

impl Protocol for SelectiveRepeat {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::SelectiveRepeat
    }

    fn send(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, StateError> {
        if !self.sender.can_send() {
            return Err(StateError::WindowFull {
                outstanding: self.sender.in_flight(),
            });
        }
        let seq = self.sender.next_sequence();
        let datagram = CODEC.encode(Some(seq), payload);
        self.sender.record_sent(datagram.clone(), now);
        log::debug!("[sr] → DATA seq={} len={}", seq, payload.len());
        Ok(datagram)
    }

    fn on_datagram(&mut self, datagram: &[u8], _now: Instant) -> Actions {
        let frame = match CODEC.decode(datagram).and_then(|f| f.verified()) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("[sr] discarding datagram: {e}");
                return Actions::none();
            }
        };
        let seq = frame.sequence.unwrap_or_default();

        match frame.control() {
            Some(Control::Ack) => {
                let cleared = self.sender.on_ack(seq);
                log::debug!(
                    "[sr] ← ACK ack={} cleared={} base={}",
                    seq,
                    cleared,
                    self.sender.base()
                );
                Actions::none()
            }
            Some(Control::Nak) => {
                log::debug!("[sr] ← NAK seq={}; ignored", seq);
                Actions::none()
            }
            None => {
                let disposition = self.receiver.on_frame(seq, frame.payload);
                log::debug!("[sr] ← DATA seq={} {:?}", seq, disposition);
                if !disposition.should_ack() {
                    return Actions::none();
                }
                Actions {
                    transmit: vec![CODEC.encode(Some(seq), Control::Ack.token())],
                    deliver: self.receiver.drain(),
                }
            }
        }
    }

    fn on_tick(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let resend = self.sender.due_for_resend(now);
        if !resend.is_empty() {
            log::debug!("[sr] timeout; retransmitting {} frame(s)", resend.len());
        }
        resend
    }
}
