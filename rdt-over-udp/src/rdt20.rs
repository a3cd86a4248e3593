//! rdt 2.0: checksum plus ACK/NAK, no sequence numbers.
//!
//! The receiver answers every data frame with `ACK` (checksum good) or `NAK`
//! (checksum bad) and the sender retransmits on `NAK`.  Without sequence
//! numbers a corrupted ACK/NAK is ambiguous: the sender cannot tell whether
//! its frame arrived.  This engine reproduces the textbook behaviour of
//! giving up and returning to idle without resending, which silently loses
//! the message whenever a NAK is corrupted in transit.

use std::time::Instant;

use crate::frame::{Control, FrameCodec, Layout};
use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};
use crate::sender::Sender;
use crate::state::{EndpointState, Phase};

const CODEC: FrameCodec = FrameCodec::new(Layout::Checksummed);

#[derive(Debug, Default)]
pub struct Rdt20 {
    state: EndpointState,
    sender: Sender,
}

impl Rdt20 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    fn reply(control: Control) -> Vec<u8> {
        CODEC.encode(None, control.token())
    }
}

impl Protocol for Rdt20 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rdt20
    }

    fn send(&mut self, payload: &[u8], now: Instant) -> Result<Vec<u8>, StateError> {
        if self.state.is_waiting_for_ack() {
            return Err(StateError::AwaitingAck);
        }
        let datagram = CODEC.encode(None, payload);
        self.sender.record_sent(datagram.clone(), now);
        self.state.phase = Phase::WaitForAck;
        log::debug!("[rdt2.0] → DATA len={}", payload.len());
        Ok(datagram)
    }

    fn on_datagram(&mut self, datagram: &[u8], now: Instant) -> Actions {
        let frame = match CODEC.decode(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("[rdt2.0] discarding datagram: {e}");
                return Actions::none();
            }
        };

        match self.state.phase {
            Phase::WaitForRequest => {
                if !frame.valid {
                    log::debug!("[rdt2.0] ← corrupted frame; → NAK");
                    Actions::transmit(Self::reply(Control::Nak))
                } else if frame.is_data() {
                    log::debug!("[rdt2.0] ← DATA len={}; → ACK", frame.payload.len());
                    Actions {
                        transmit: vec![Self::reply(Control::Ack)],
                        deliver: vec![frame.payload],
                    }
                } else {
                    log::debug!("[rdt2.0] ← stray {:?} while idle; ignored", frame.control());
                    Actions::none()
                }
            }
            Phase::WaitForAck => {
                if !frame.valid {
                    log::warn!(
                        "[rdt2.0] ← corrupted reply; cannot tell ACK from NAK, giving up on frame"
                    );
                    self.sender.clear();
                    self.state.phase = Phase::WaitForRequest;
                    return Actions::none();
                }
                match frame.control() {
                    Some(Control::Ack) => {
                        log::debug!("[rdt2.0] ← ACK");
                        self.sender.clear();
                        self.state.phase = Phase::WaitForRequest;
                        Actions::none()
                    }
                    Some(Control::Nak) => {
                        log::debug!("[rdt2.0] ← NAK; retransmitting");
                        self.sender
                            .retransmit(now)
                            .map(Actions::transmit)
                            .unwrap_or_default()
                    }
                    None => {
                        log::debug!("[rdt2.0] ← DATA while waiting for ACK; ignored");
                        Actions::none()
                    }
                }
            }
        }
    }

    fn on_tick(&mut self, _now: Instant) -> Vec<Vec<u8>> {
        Vec::new()
    }
}
