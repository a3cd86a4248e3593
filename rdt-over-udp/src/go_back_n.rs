//! Go-Back-N engine: [`GbnSender`] and [`GbnReceiver`] behind one
//! [`Protocol`].
//!
//! ```text
//!  send()      → DATA(next)          (WindowFull if W − 1 in flight)
//!  ← DATA(s)   → ACK(expected − 1)   deliver iff s == expected
//!  ← ACK(n)    → clear [base, n]     ignored unless n is outstanding
//!  tick        → resend every frame whose timer expired
//! ```
//!
//! Corrupted and undersized datagrams are dropped; the sender's timers
//! recover from them.

use std::time::{Duration, Instant};

use crate::frame::{Control, FrameCodec, Layout};
use crate::gbn_receiver::GbnReceiver;
use crate::gbn_sender::GbnSender;
use crate::protocol::{Actions, Protocol, ProtocolKind, StateError};

const CODEC: FrameCodec = FrameCodec::new(Layout::Sequenced {
    control_covers_sequence: true,
});

#[derive(Debug)]
pub struct GoBackN {
    sender: GbnSender,
    receiver: GbnReceiver,
}

impl GoBackN {
    /// # Panics
    ///
    /// Panics if `window_size` is outside `2..=256`.
    pub fn new(window_size: usize, timeout: Duration) -> Self {
        Self {
            sender: GbnSender::new(window_size, timeout),
            receiver: GbnReceiver::new(window_size),
        }
    }

    pub fn sender(&self) -> &GbnSender {
        &self.sender
    }

    pub fn receiver(&self) -> &GbnReceiver {
        &self.receiver
    }
}

impl Protocol for GoBackN {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::GoBackN
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
        log::debug!(
            "[gbn] → DATA seq={} len={} in_flight={}",
            seq,
            payload.len(),
            self.sender.in_flight()
        );
        Ok(datagram)
    }

    fn on_datagram(&mut self, datagram: &[u8], _now: Instant) -> Actions {
        let frame = match CODEC.decode(datagram).and_then(|f| f.verified()) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("[gbn] discarding datagram: {e}");
                return Actions::none();
            }
        };
        let seq = frame.sequence.unwrap_or_default();

        match frame.control() {
            Some(Control::Ack) => {
                let acked = self.sender.on_ack(seq);
                log::debug!(
                    "[gbn] ← ACK ack={} acked={} base={} in_flight={}",
                    seq,
                    acked,
                    self.sender.base(),
                    self.sender.in_flight()
                );
                Actions::none()
            }
            Some(Control::Nak) => {
                log::debug!("[gbn] ← NAK seq={}; ignored", seq);
                Actions::none()
            }
            None => {
                let delivered = self.receiver.on_frame(seq, frame.payload);
                let ack = self.receiver.ack_number();
                if delivered.is_some() {
                    log::debug!("[gbn] ← DATA seq={}; → ACK ack={}", seq, ack);
                } else {
                    log::debug!(
                        "[gbn] ← out-of-order DATA seq={} (expected {}); → ACK ack={}",
                        seq,
                        self.receiver.expected(),
                        ack
                    );
                }
                Actions {
                    transmit: vec![CODEC.encode(Some(ack), Control::Ack.token())],
                    deliver: delivered.into_iter().collect(),
                }
            }
        }
    }

    fn on_tick(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let resend = self.sender.due_for_resend(now);
        if !resend.is_empty() {
            log::debug!(
                "[gbn] timeout; going back {} frame(s) from base={}",
                resend.len(),
                self.sender.base()
            );
        }
        resend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn ack(n: u8) -> Vec<u8> {
        CODEC.encode(Some(n), b"ACK")
    }

    /// Feed `datagrams` into `to` and collect everything it asks for.
    fn pump(to: &mut GoBackN, datagrams: Vec<Vec<u8>>, now: Instant) -> Actions {
        let mut all = Actions::none();
        for d in datagrams {
            let a = to.on_datagram(&d, now);
            all.transmit.extend(a.transmit);
            all.deliver.extend(a.deliver);
        }
        all
    }

    #[test]
    fn window_full_after_w_minus_one_sends() {
        let now = Instant::now();
        let mut gbn = GoBackN::new(4, TIMEOUT);
        for _ in 0..3 {
            gbn.send(b"x", now).unwrap();
        }
        assert_eq!(
            gbn.send(b"x", now),
            Err(StateError::WindowFull { outstanding: 3 })
        );
    }

    #[test]
    fn lossless_exchange_delivers_in_order() {
        let now = Instant::now();
        let mut a = GoBackN::new(4, TIMEOUT);
        let mut b = GoBackN::new(4, TIMEOUT);

        let sent: Vec<_> = ["one", "two", "three"]
            .iter()
            .map(|p| a.send(p.as_bytes(), now).unwrap())
            .collect();
        let at_b = pump(&mut b, sent, now);
        assert_eq!(
            at_b.deliver,
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );

        pump(&mut a, at_b.transmit, now);
        assert!(!a.sender().has_unacked());
    }

    #[test]
    fn gap_is_not_delivered_and_reacks_last_in_order() {
        let now = Instant::now();
        let mut a = GoBackN::new(8, TIMEOUT);
        let mut b = GoBackN::new(8, TIMEOUT);

        let f0 = a.send(b"0", now).unwrap();
        let _lost = a.send(b"1", now).unwrap();
        let f2 = a.send(b"2", now).unwrap();

        let r = b.on_datagram(&f0, now);
        assert_eq!(r.deliver, vec![b"0".to_vec()]);
        let r = b.on_datagram(&f2, now);
        assert!(r.deliver.is_empty());
        assert_eq!(r.transmit, vec![ack(0)]);
    }

    #[test]
    fn timeout_resends_whole_outstanding_window() {
        let start = Instant::now();
        let mut gbn = GoBackN::new(8, TIMEOUT);
        let f0 = gbn.send(b"0", start).unwrap();
        let f1 = gbn.send(b"1", start).unwrap();

        assert!(gbn.on_tick(start + Duration::from_millis(50)).is_empty());
        assert_eq!(gbn.on_tick(start + Duration::from_millis(150)), vec![f0, f1]);
    }

    #[test]
    fn cumulative_ack_clears_prefix() {
        let now = Instant::now();
        let mut gbn = GoBackN::new(8, TIMEOUT);
        for _ in 0..3 {
            gbn.send(b"x", now).unwrap();
        }
        gbn.on_datagram(&ack(1), now);
        assert_eq!(gbn.sender().in_flight(), 1);
        assert_eq!(gbn.sender().base(), 2);
    }

    #[test]
    fn corrupted_frames_are_dropped_silently() {
        let now = Instant::now();
        let mut gbn = GoBackN::new(8, TIMEOUT);
        let mut bad = CODEC.encode(Some(0), b"data");
        bad[1] ^= 0x10;
        assert!(gbn.on_datagram(&bad, now).is_empty());
        assert!(gbn.on_datagram(&[0x00], now).is_empty());
        assert_eq!(gbn.receiver().expected(), 0);
    }
}
