//! Wire-format definitions for protocol frames.
//!
//! Every datagram exchanged between peers is a [`Frame`].  This module is
//! responsible for:
//! - Defining the on-wire layout of each protocol variant ([`Layout`]).
//! - Serialising a sequence number and payload into a byte buffer ready for
//!   transmission, with a trailing CRC-8 checksum.
//! - Deserialising a raw byte slice back into a [`Frame`], recomputing the
//!   checksum and recording whether it matched.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! There is no length field; the payload length is implied by the datagram
//! size.
//!
//! ```text
//!  Raw          | payload ...                         |
//!  Checksummed  | payload ...                 | crc8  |
//!  Sequenced    | seq | payload ...           | crc8  |
//! ```
//!
//! The checksum covers `seq ‖ payload` for sequenced frames, except that the
//! stop-and-wait 2.1 layout leaves the sequence byte out of the checksum of
//! pure ACK/NAK frames (see [`Layout::Sequenced`]).

/// Control token acknowledging a frame.
pub const ACK: &[u8] = b"ACK";
/// Control token requesting retransmission.
pub const NAK: &[u8] = b"NAK";

/// CRC-8 polynomial (x^8 + x^2 + x + 1).
const POLY: u8 = 0x07;

/// Precomputed CRC-8 lookup table, generated at compile time.
const CRC_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Compute CRC-8 (poly 0x07, init 0x00, no reflection, no final xor).
///
/// Detects every single-bit error in `data`.
pub fn crc8(data: &[u8]) -> u8 {
    crc8_update(0, data)
}

fn crc8_update(crc: u8, data: &[u8]) -> u8 {
    data.iter()
        .fold(crc, |crc, &byte| CRC_TABLE[(crc ^ byte) as usize])
}

// ---------------------------------------------------------------------------
// Control tokens
// ---------------------------------------------------------------------------

/// The two reserved control payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Ack,
    Nak,
}

impl Control {
    /// Classify a payload.  Matching is case-insensitive.
    pub fn classify(payload: &[u8]) -> Option<Self> {
        if payload.eq_ignore_ascii_case(ACK) {
            Some(Self::Ack)
        } else if payload.eq_ignore_ascii_case(NAK) {
            Some(Self::Nak)
        } else {
            None
        }
    }

    /// Literal token written on the wire.
    pub fn token(self) -> &'static [u8] {
        match self {
            Self::Ack => ACK,
            Self::Nak => NAK,
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Byte layout of one protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `payload` with no sequence number and no checksum (rdt 1.0).
    Raw,
    /// `payload ‖ crc8(payload)` (rdt 2.0).
    Checksummed,
    /// `seq ‖ payload ‖ crc8(..)`.
    ///
    /// When `control_covers_sequence` is `false` the checksum of an ACK/NAK
    /// frame is computed over the payload alone (rdt 2.1); data frames always
    /// cover `seq ‖ payload`.
    Sequenced { control_covers_sequence: bool },
}

impl Layout {
    /// Smallest datagram that can be decoded under this layout.
    pub fn min_len(self) -> usize {
        match self {
            Self::Raw => 0,
            Self::Checksummed => 1,
            Self::Sequenced { .. } => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence byte, for layouts that carry one.
    pub sequence: Option<u8>,
    pub payload: Vec<u8>,
    /// Checksum byte as carried on the wire.
    pub checksum: Option<u8>,
    /// `true` when the recomputed checksum matched (always `true` for
    /// [`Layout::Raw`]).
    pub valid: bool,
}

impl Frame {
    /// Control token carried by this frame, if any.
    pub fn control(&self) -> Option<Control> {
        Control::classify(&self.payload)
    }

    pub fn is_ack(&self) -> bool {
        self.control() == Some(Control::Ack)
    }

    pub fn is_nak(&self) -> bool {
        self.control() == Some(Control::Nak)
    }

    /// `true` for frames carrying application data rather than a control token.
    pub fn is_data(&self) -> bool {
        self.control().is_none()
    }

    /// Reject a frame whose checksum did not verify.
    pub fn verified(self) -> Result<Self, FramingError> {
        if self.valid {
            Ok(self)
        } else {
            Err(FramingError::ChecksumMismatch {
                carried: self.checksum.unwrap_or_default(),
            })
        }
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// Datagram shorter than the layout's minimum frame.
    #[error("datagram of {len} bytes is shorter than the {min}-byte minimum frame")]
    TooShort { len: usize, min: usize },
    /// Recomputed checksum differs from the one on the wire.
    #[error("checksum mismatch (carried {carried:#04x})")]
    ChecksumMismatch { carried: u8 },
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Encoder/decoder for one [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    layout: Layout,
}

impl FrameCodec {
    pub const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Serialise a frame into a newly allocated byte vector.
    ///
    /// `sequence` is ignored by layouts without a sequence byte and treated
    /// as `0` by [`Layout::Sequenced`] when absent.
    pub fn encode(&self, sequence: Option<u8>, payload: &[u8]) -> Vec<u8> {
        match self.layout {
            Layout::Raw => payload.to_vec(),
            Layout::Checksummed => {
                let mut buf = Vec::with_capacity(payload.len() + 1);
                buf.extend_from_slice(payload);
                buf.push(crc8(payload));
                buf
            }
            Layout::Sequenced { .. } => {
                let seq = sequence.unwrap_or(0);
                let mut buf = Vec::with_capacity(payload.len() + 2);
                buf.push(seq);
                buf.extend_from_slice(payload);
                buf.push(self.sequenced_checksum(seq, payload));
                buf
            }
        }
    }

    /// Parse a [`Frame`] from a raw datagram.
    ///
    /// A checksum mismatch is *not* an error here: the frame is returned with
    /// `valid == false` so that variants which answer corrupted frames (NAK,
    /// duplicate ACK) can do so.  Use [`Frame::verified`] to discard them.
    ///
    /// Returns [`Err`] only when `buf` is shorter than [`Layout::min_len`].
    pub fn decode(&self, buf: &[u8]) -> Result<Frame, FramingError> {
        let min = self.layout.min_len();
        if buf.len() < min {
            return Err(FramingError::TooShort { len: buf.len(), min });
        }

        let frame = match self.layout {
            Layout::Raw => Frame {
                sequence: None,
                payload: buf.to_vec(),
                checksum: None,
                valid: true,
            },
            Layout::Checksummed => {
                let (payload, check) = buf.split_at(buf.len() - 1);
                Frame {
                    sequence: None,
                    payload: payload.to_vec(),
                    checksum: Some(check[0]),
                    valid: crc8(payload) == check[0],
                }
            }
            Layout::Sequenced { .. } => {
                let seq = buf[0];
                let (payload, check) = buf[1..].split_at(buf.len() - 2);
                Frame {
                    sequence: Some(seq),
                    payload: payload.to_vec(),
                    checksum: Some(check[0]),
                    valid: self.sequenced_checksum(seq, payload) == check[0],
                }
            }
        };
        Ok(frame)
    }

    fn sequenced_checksum(&self, seq: u8, payload: &[u8]) -> u8 {
        let covers_sequence = match self.layout {
            Layout::Sequenced {
                control_covers_sequence: false,
            } => Control::classify(payload).is_none(),
            _ => true,
        };
        if covers_sequence {
            crc8_update(crc8(&[seq]), payload)
        } else {
            crc8(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEQUENCED: FrameCodec = FrameCodec::new(Layout::Sequenced {
        control_covers_sequence: true,
    });
    const RDT21: FrameCodec = FrameCodec::new(Layout::Sequenced {
        control_covers_sequence: false,
    });

    #[test]
    fn crc8_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8(b""), 0x00);
    }

    #[test]
    fn raw_layout_is_verbatim() {
        let codec = FrameCodec::new(Layout::Raw);
        let bytes = codec.encode(Some(1), b"hello");
        assert_eq!(bytes, b"hello");
        let frame = codec.decode(&bytes).unwrap();
        assert!(frame.valid);
        assert_eq!(frame.sequence, None);
        assert_eq!(frame.payload, b"hello");
    }

    #[test]
    fn checksummed_layout_appends_crc_of_payload() {
        let codec = FrameCodec::new(Layout::Checksummed);
        let bytes = codec.encode(None, b"ACK");
        assert_eq!(&bytes[..3], b"ACK");
        assert_eq!(bytes[3], crc8(b"ACK"));
        assert!(codec.decode(&bytes).unwrap().is_ack());
    }

    #[test]
    fn sequenced_layout_covers_sequence_byte() {
        let bytes = SEQUENCED.encode(Some(7), b"hi");
        assert_eq!(bytes, vec![7, b'h', b'i', crc8(&[7, b'h', b'i'])]);
    }

    #[test]
    fn rdt21_control_frames_leave_sequence_out_of_checksum() {
        let bytes = RDT21.encode(Some(1), b"NAK");
        assert_eq!(bytes[4], crc8(b"NAK"));

        // The sequence byte is not protected, so flipping it goes unnoticed.
        let mut flipped = bytes.clone();
        flipped[0] ^= 0x01;
        let frame = RDT21.decode(&flipped).unwrap();
        assert!(frame.valid);
        assert!(frame.is_nak());
        assert_eq!(frame.sequence, Some(0));

        // Data frames still cover it.
        let mut data = RDT21.encode(Some(1), b"data");
        data[0] ^= 0x01;
        assert!(!RDT21.decode(&data).unwrap().valid);
    }

    #[test]
    fn control_tokens_are_case_insensitive() {
        assert_eq!(Control::classify(b"ack"), Some(Control::Ack));
        assert_eq!(Control::classify(b"NaK"), Some(Control::Nak));
        assert_eq!(Control::classify(b"ACKS"), None);
    }

    #[test]
    fn undersized_datagrams_are_framing_errors() {
        assert_eq!(
            SEQUENCED.decode(&[0x01]),
            Err(FramingError::TooShort { len: 1, min: 2 })
        );
        assert_eq!(
            FrameCodec::new(Layout::Checksummed).decode(&[]),
            Err(FramingError::TooShort { len: 0, min: 1 })
        );
    }

    #[test]
    fn verified_rejects_corrupted_frame() {
        let mut bytes = SEQUENCED.encode(Some(0), b"payload");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        let err = SEQUENCED.decode(&bytes).unwrap().verified().unwrap_err();
        assert!(matches!(err, FramingError::ChecksumMismatch { .. }));
    }

    #[test]
    fn empty_payload_roundtrip() {
        let frame = SEQUENCED.decode(&SEQUENCED.encode(Some(3), b"")).unwrap();
        assert!(frame.valid);
        assert_eq!(frame.sequence, Some(3));
        assert!(frame.payload.is_empty());
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_sequence_and_payload(
            seq in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let frame = SEQUENCED.decode(&SEQUENCED.encode(Some(seq), &payload)).unwrap();
            prop_assert!(frame.valid);
            prop_assert_eq!(frame.sequence, Some(seq));
            prop_assert_eq!(frame.payload, payload);
        }

        #[test]
        fn any_single_bit_flip_is_detected(
            seq in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 1..64),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut bytes = SEQUENCED.encode(Some(seq), &payload);
            let index = position.index(bytes.len());
            bytes[index] ^= 1 << bit;
            let frame = SEQUENCED.decode(&bytes).unwrap();
            prop_assert!(!frame.valid);
        }

        #[test]
        fn any_single_bit_flip_is_detected_without_sequence(
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let codec = FrameCodec::new(Layout::Checksummed);
            let mut bytes = codec.encode(None, &payload);
            let index = position.index(bytes.len());
            bytes[index] ^= 1 << bit;
            prop_assert!(!codec.decode(&bytes).unwrap().valid);
        }

        // Longer than any control token, so a flip cannot turn the payload
        // into one and change what the checksum covers.
        #[test]
        fn any_single_bit_flip_in_an_rdt21_data_frame_is_detected(
            seq in 0u8..2,
            payload in proptest::collection::vec(any::<u8>(), 4..64),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut bytes = RDT21.encode(Some(seq), &payload);
            let index = position.index(bytes.len());
            bytes[index] ^= 1 << bit;
            prop_assert!(!RDT21.decode(&bytes).unwrap().valid);
        }
    }
}
