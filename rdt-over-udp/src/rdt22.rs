//! rdt 2.2: NAK-free stop-and-wait.
//!
//! Instead of a NAK the receiver re-acknowledges the last sequence number it
//! delivered; a sender that sees an ACK for the *other* sequence number (or a
//! corrupted reply) resends.  The checksum always covers the sequence byte.
//!
//! ```text
//!  idle:    DATA(expected)         → deliver, ACK(seq), flip receiver_seq
//!           corrupted | duplicate  → ACK(flip(receiver_seq))
//!  waiting: ACK(sender_seq)        → flip sender_seq, idle
//!           corrupted | ACK(other) → resend last frame
//! ```
//!
//! [`crate::rdt30::Rdt30`] reuses this engine unchanged and adds a timer.

use std::time::Instant;

use crate::frame::{Control, Frame, FrameCodec, Layout};
use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};
use crate::sender::Sender;
use crate::state::{EndpointState, Phase};

pub(crate) const CODEC: FrameCodec = FrameCodec::new(Layout::Sequenced {
    control_covers_sequence: true,
});

#[derive(Debug)]
pub struct Rdt22 {
    state: EndpointState,
    sender: Sender,
    tag: &'static str,
}

impl Default for Rdt22 {
    fn default() -> Self {
        Self::new()
    }
}

impl Rdt22 {
    pub fn new() -> Self {
        Self::tagged("rdt2.2")
    }

    /// Same engine, logging under another name.
    pub(crate) fn tagged(tag: &'static str) -> Self {
        Self {
            state: EndpointState::new(),
            sender: Sender::new(),
            tag,
        }
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Put the outstanding frame back on the wire, if there is one.
    pub(crate) fn resend(&mut self, now: Instant) -> Option<Vec<u8>> {
        if !self.state.is_waiting_for_ack() {
            return None;
        }
        self.sender.retransmit(now)
    }

    pub(crate) fn tx_count(&self) -> u32 {
        self.sender.tx_count()
    }

    fn ack(seq: u8) -> Vec<u8> {
        CODEC.encode(Some(seq), Control::Ack.token())
    }

    fn on_idle(&mut self, frame: Frame) -> Actions {
        let seq = frame.sequence.unwrap_or_default();
        if frame.valid && !frame.is_data() {
            log::debug!("[{}] ← stray {:?} while idle; ignored", self.tag, frame.control());
            return Actions::none();
        }
        if frame.valid && seq == self.state.receiver_seq {
            log::debug!(
                "[{}] ← DATA seq={} len={}; → ACK",
                self.tag,
                seq,
                frame.payload.len()
            );
            self.state.advance_receiver();
            return Actions {
                transmit: vec![Self::ack(seq)],
                deliver: vec![frame.payload],
            };
        }

        let previous = self.state.last_delivered_seq();
        if frame.valid {
            log::debug!("[{}] ← duplicate DATA seq={}; → ACK seq={}", self.tag, seq, previous);
        } else {
            log::debug!("[{}] ← corrupted frame; → ACK seq={}", self.tag, previous);
        }
        Actions::transmit(Self::ack(previous))
    }

    fn on_waiting(&mut self, frame: Frame, now: Instant) -> Actions {
        let seq = frame.sequence.unwrap_or_default();
        let resend = if !frame.valid {
            log::debug!(
                "[{}] ← corrupted reply; retransmitting seq={}",
                self.tag,
                self.state.sender_seq
            );
            true
        } else if frame.is_ack() && seq == self.state.sender_seq {
            log::debug!("[{}] ← ACK seq={}", self.tag, seq);
            self.sender.clear();
            self.state.complete_send();
            false
        } else if frame.is_ack() {
            log::debug!(
                "[{}] ← ACK seq={} for previous frame; retransmitting seq={}",
                self.tag,
                seq,
                self.state.sender_seq
            );
            true
        } else {
            log::debug!("[{}] ← unexpected frame while waiting for ACK; ignored", self.tag);
            false
        };

        if resend {
            self.sender
                .retransmit(now)
                .map(Actions::transmit)
                .unwrap_or_default()
        } else {
            Actions::none()
        }
    }
}

impl Protocol for Rdt22 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rdt22
    }

    fn send(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, StateError> {
        if self.state.is_waiting_for_ack() {
            return Err(StateError::AwaitingAck);
        }
        let datagram = CODEC.encode(Some(self.state.sender_seq), payload);
        self.sender.record_sent(datagram.clone(), now);
        self.state.phase = Phase::WaitForAck;
        log::debug!(
            "[{}] → DATA seq={} len={}",
            self.tag,
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
                log::debug!("[{}] discarding datagram: {e}", self.tag);
                Actions::none()
            }
        }
    }

    fn on_tick(&mut self, _now: Instant) -> Vec<Vec<u8>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrupt(mut datagram: Vec<u8>) -> Vec<u8> {
        let last = datagram.len() - 1;
        datagram[last] ^= 0x01;
        datagram
    }

    #[test]
    fn in_order_data_is_delivered_and_acked_with_its_sequence() {
        let mut rdt = Rdt22::new();
        let actions = rdt.on_datagram(&CODEC.encode(Some(0), b"hi"), Instant::now());
        assert_eq!(actions.deliver, vec![b"hi".to_vec()]);
        assert_eq!(actions.transmit, vec![Rdt22::ack(0)]);
        assert_eq!(rdt.state().receiver_seq, 1);
    }

    #[test]
    fn corrupted_or_duplicate_data_reacks_previous_sequence() {
        let mut rdt = Rdt22::new();
        let now = Instant::now();

        // Nothing delivered yet: "previous" is 1.
        let actions = rdt.on_datagram(&corrupt(CODEC.encode(Some(0), b"x")), now);
        assert!(actions.deliver.is_empty());
        assert_eq!(actions.transmit, vec![Rdt22::ack(1)]);

        rdt.on_datagram(&CODEC.encode(Some(0), b"x"), now);
        let actions = rdt.on_datagram(&CODEC.encode(Some(0), b"x"), now);
        assert!(actions.deliver.is_empty());
        assert_eq!(actions.transmit, vec![Rdt22::ack(0)]);
    }

    #[test]
    fn ack_for_other_sequence_triggers_resend() {
        let mut rdt = Rdt22::new();
        let now = Instant::now();
        let sent = rdt.send(b"msg", now).unwrap();

        let actions = rdt.on_datagram(&Rdt22::ack(1), now);
        assert_eq!(actions.transmit, vec![sent]);
        assert_eq!(rdt.tx_count(), 2);
        assert_eq!(rdt.state().phase, Phase::WaitForAck);

        rdt.on_datagram(&Rdt22::ack(0), now);
        assert_eq!(rdt.state().phase, Phase::WaitForRequest);
        assert_eq!(rdt.state().sender_seq, 1);
    }

    #[test]
    fn corrupted_ack_triggers_resend() {
        let mut rdt = Rdt22::new();
        let now = Instant::now();
        let sent = rdt.send(b"msg", now).unwrap();
        let actions = rdt.on_datagram(&corrupt(Rdt22::ack(0)), now);
        assert_eq!(actions.transmit, vec![sent]);
    }

    #[test]
    fn resend_is_only_available_while_waiting() {
        let mut rdt = Rdt22::new();
        let now = Instant::now();
        assert_eq!(rdt.resend(now), None);
        let sent = rdt.send(b"msg", now).unwrap();
        assert_eq!(rdt.resend(now), Some(sent));
        rdt.on_datagram(&Rdt22::ack(0), now);
        assert_eq!(rdt.resend(now), None);
    }

    #[test]
    fn send_while_waiting_is_rejected() {
        let mut rdt = Rdt22::new();
        let now = Instant::now();
        rdt.send(b"a", now).unwrap();
        assert_eq!(rdt.send(b"b", now), Err(StateError::AwaitingAck));
    }
}
