//! Selective-Repeat receive-side state machine.
//!
//! Valid data inside `[rbase, rbase + W)` is buffered in slot `seq % W` and
//! acknowledged individually.  Frames from the previous window
//! `[rbase − W, rbase)` were already delivered; they are acknowledged again
//! (the sender evidently missed the first ACK) but not stored.  Whenever the
//! slot at `rbase` fills, the contiguous run of present slots is drained in
//! order.

/// What happened to one inbound data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Inside the receive window; stored (or already stored) and to be ACKed.
    Buffered,
    /// From the previous window; to be ACKed but not stored.
    Duplicate,
    /// Outside the sequence space; dropped without reply.
    Ignored,
}

impl Disposition {
    pub fn should_ack(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

#[derive(Debug)]
pub struct SrReceiver {
    base: usize,
    slots: Box<[Option<Vec<u8>>]>,
}

impl SrReceiver {
    /// # Panics
    ///
    /// Panics if `window_size` is outside `2..=128`.
    pub fn new(window_size: usize) -> Self {
        assert!(
            (2..=128).contains(&window_size),
            "Selective-Repeat window must be in 2..=128, got {window_size}"
        );
        Self {
            base: 0,
            slots: vec![None; window_size].into_boxed_slice(),
        }
    }

    pub fn base(&self) -> u8 {
        self.base as u8
    }

    fn sequence_space(&self) -> usize {
        2 * self.slots.len()
    }

    pub fn on_frame(&mut self, seq: u8, payload: Vec<u8>) -> Disposition {
        let seq = seq as usize;
        let space = self.sequence_space();
        if seq >= space {
            return Disposition::Ignored;
        }
        let offset = (seq + space - self.base) % space;
        if offset < self.slots.len() {
            let slot = &mut self.slots[seq % self.slots.len()];
            if slot.is_none() {
                *slot = Some(payload);
            }
            Disposition::Buffered
        } else {
            Disposition::Duplicate
        }
    }

    /// Pop the in-order run starting at `rbase`, advancing `rbase` past it.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let mut ready = Vec::new();
        let window = self.slots.len();
        while let Some(payload) = self.slots[self.base % window].take() {
            ready.push(payload);
            self.base = (self.base + 1) % self.sequence_space();
        }
        ready
    }

    /// Number of frames held out of order.
    pub fn buffered(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_frame_drains_immediately() {
        let mut r = SrReceiver::new(4);
        assert_eq!(r.on_frame(0, b"a".to_vec()), Disposition::Buffered);
        assert_eq!(r.drain(), vec![b"a".to_vec()]);
        assert_eq!(r.base(), 1);
    }

    #[test]
    fn out_of_order_frames_wait_for_the_gap() {
        let mut r = SrReceiver::new(4);
        assert_eq!(r.on_frame(2, b"c".to_vec()), Disposition::Buffered);
        assert_eq!(r.on_frame(1, b"b".to_vec()), Disposition::Buffered);
        assert!(r.drain().is_empty());
        assert_eq!(r.buffered(), 2);

        r.on_frame(0, b"a".to_vec());
        assert_eq!(r.drain(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(r.base(), 3);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn previous_window_is_acked_but_not_stored() {
        let mut r = SrReceiver::new(4);
        r.on_frame(0, b"a".to_vec());
        r.drain();
        assert_eq!(r.on_frame(0, b"a".to_vec()), Disposition::Duplicate);
        assert_eq!(r.buffered(), 0);
        assert!(r.drain().is_empty());
    }

    #[test]
    fn retransmitted_frame_keeps_first_copy() {
        let mut r = SrReceiver::new(4);
        r.on_frame(1, b"first".to_vec());
        assert_eq!(r.on_frame(1, b"second".to_vec()), Disposition::Buffered);
        r.on_frame(0, b"zero".to_vec());
        assert_eq!(r.drain(), vec![b"zero".to_vec(), b"first".to_vec()]);
    }

    #[test]
    fn sequence_numbers_outside_the_space_are_ignored() {
        let mut r = SrReceiver::new(4);
        assert_eq!(r.on_frame(8, b"x".to_vec()), Disposition::Ignored);
        assert!(!Disposition::Ignored.should_ack());
    }

    #[test]
    fn base_wraps_at_twice_the_window() {
        let mut r = SrReceiver::new(2);
        for seq in [0u8, 1, 2, 3, 0] {
            assert_eq!(r.on_frame(seq, vec![seq]), Disposition::Buffered);
            assert_eq!(r.drain(), vec![vec![seq]]);
        }
        assert_eq!(r.base(), 1);
    }
}
