//! rdt 2.1: adds a 1-bit sequence number to rdt 2.0.
//!
//! Data frames carry `sender_seq`; ACK/NAK frames carry the sequence number
//! they refer to, but that byte is left out of their checksum.  On the
//! sending side any corruption or NAK is answered by a blind retransmission,
//! and the receiver's sequence check turns the resulting duplicates into
//! re-ACKs instead of double deliveries.
//!
//! ```text
//!  idle:    corrupted        → NAK(receiver_seq)
//!           DATA(expected)   → deliver, ACK(seq), flip receiver_seq
//!           DATA(duplicate)  → ACK(seq)
//!  waiting: corrupted | NAK  → resend last frame
//!           ACK              → flip sender_seq, idle
//! ```

use std::time::Instant;

use crate::frame::{Control, Frame, FrameCodec, Layout};
use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};
use crate::sender::Sender;
use crate::state::{EndpointState, Phase};

const CODEC: FrameCodec = FrameCodec::new(Layout::Sequenced {
    control_covers_sequence: false,
});

#[derive(Debug, Default)]
pub struct Rdt21 {
    state: EndpointState,
    sender: Sender,
}

impl Rdt21 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    fn reply(control: Control, seq: u8) -> Vec<u8> {
        CODEC.encode(Some(seq), control.token())
    }

    fn on_idle(&mut self, frame: Frame) -> Actions {
        if !frame.valid {
            log::debug!(
                "[rdt2.1] ← corrupted frame; → NAK seq={}",
                self.state.receiver_seq
            );
            return Actions::transmit(Self::reply(Control::Nak, self.state.receiver_seq));
        }
        if !frame.is_data() {
            log::debug!("[rdt2.1] ← stray {:?} while idle; ignored", frame.control());
            return Actions::none();
        }

        let seq = frame.sequence.unwrap_or_default();
        if seq == self.state.receiver_seq {
            log::debug!("[rdt2.1] ← DATA seq={} len={}; → ACK", seq, frame.payload.len());
            self.state.advance_receiver();
            Actions {
                transmit: vec![Self::reply(Control::Ack, seq)],
                deliver: vec![frame.payload],
            }
        } else {
            log::debug!("[rdt2.1] ← duplicate DATA seq={}; → ACK", seq);
            Actions::transmit(Self::reply(Control::Ack, seq))
        }
    }

    fn on_waiting(&mut self, frame: Frame, now: Instant) -> Actions {
        match (frame.valid, frame.control()) {
            (true, Some(Control::Ack)) => {
                log::debug!("[rdt2.1] ← ACK seq={:?}", frame.sequence);
                self.sender.clear();
                self.state.complete_send();
                Actions::none()
            }
            (true, None) => {
                log::debug!("[rdt2.1] ← DATA while waiting for ACK; ignored");
                Actions::none()
            }
            (valid, _) => {
                if valid {
                    log::debug!("[rdt2.1] ← NAK; retransmitting seq={}", self.state.sender_seq);
                } else {
                    log::debug!(
                        "[rdt2.1] ← corrupted reply; retransmitting seq={}",
                        self.state.sender_seq
                    );
                }
                self.sender
                    .retransmit(now)
                    .map(Actions::transmit)
                    .unwrap_or_default()
            }
        }
    }
}

impl Protocol for Rdt21 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rdt21
    }

    fn send(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, StateError> {
        if self.state.is_waiting_for_ack() {
            return Err(StateError::AwaitingAck);
        }
        let datagram = CODEC.encode(Some(self.state.sender_seq), payload);
        self.sender.record_sent(datagram.clone(), now);
        self.state.phase = Phase::WaitForAck;
        log::debug!(
            "[rdt2.1] → DATA seq={} len={}",
            self.state.sender_seq,
            payload.len()
        );
        Ok(datagram)
    }

    fn on_datagram(&mut self, datagram: &[u8], now: Instant) -> Actions {
        match CODEC.decode(datagram) {
            Ok(frame) => match self.state.phase {
                Phase::WaitForRequest => self.on_idle(frame),
                Phase::WaitForAck => self.on_waiting(frame, now),
            },
            Err(e) => {
                log::debug!("[rdt2.1] discarding datagram: {e}");
                Actions::none()
            }
        }
    }

    fn on_tick(&mut self, _now: Instant) -> Vec<Vec<u8>> {
        Vec::new()
    }
}
