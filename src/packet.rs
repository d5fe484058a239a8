//! Encoded DCC packets and the packet encoder.
//!
//! A [`Packet`] holds the complete on-wire bit sequence for one DCC packet:
//! a 22 bit preamble of ones, every data byte preceded by a `0` start bit,
//! and a trailing XOR checksum byte with its own start bit.
//!
//! ```text
//! 1111111111111111111111 0 AAAAAAAA 0 DDDDDDDD 0 CCCCCCCC
//! |----- preamble -----|   address    command    checksum
//! ```
//!
//! The packet end bit is not stored. Every packet begins with a run of ones,
//! so the first preamble bit of the next transmitted packet closes the
//! previous one.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::Packet;
//!
//! let idle = Packet::encode(&[0xFF, 0x00], 0).unwrap();
//! assert_eq!(idle.bit_count(), 49);
//! assert_eq!(idle, Packet::IDLE);
//! assert_eq!(idle.data_bytes().as_slice(), &[0xFF, 0x00, 0xFF]);
//! ```

use crate::error::DccError;

/// Size of the packet bit buffer in bytes (80 bits).
pub const PACKET_BYTES: usize = 10;

/// Number of synchronization ones in front of every packet.
pub const PREAMBLE_BITS: u8 = 22;

/// Smallest accepted payload, in data bytes (checksum excluded).
pub const MIN_PAYLOAD: usize = 2;

/// Largest accepted payload, in data bytes (checksum excluded).
pub const MAX_PAYLOAD: usize = 5;

/// Idle packet payload: broadcast-to-nobody address `0xFF`, empty instruction.
pub const IDLE_PAYLOAD: [u8; 2] = [0xFF, 0x00];

/// Decoder reset payload: broadcast address, reset instruction.
pub const RESET_PAYLOAD: [u8; 2] = [0x00, 0x00];

/// An encoded DCC bit stream plus its repeat counter.
///
/// Packets are small `Copy` values. Once handed to the slot table they are
/// replaced wholesale and never edited in place while being transmitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet {
    buf: [u8; PACKET_BYTES],
    bit_count: u8,
    repeat: i8,
}

impl Packet {
    /// The idle packet, transmitted whenever nothing else is scheduled.
    pub const IDLE: Packet = Packet::build(&IDLE_PAYLOAD, 0);

    /// The digital decoder reset packet.
    pub const RESET: Packet = Packet::build(&RESET_PAYLOAD, 0);

    /// Encodes `payload` (2..=5 data bytes) into a packet.
    ///
    /// The checksum is computed here and must not be part of `payload`.
    /// `repeat` only matters for the immediate slot: a packet with
    /// `repeat = R` goes out `R + 1` times in a row.
    ///
    /// # Errors
    ///
    /// [`DccError::InvalidPayload`] if the payload length is out of range.
    pub fn encode(payload: &[u8], repeat: i8) -> Result<Self, DccError> {
        if !(MIN_PAYLOAD..=MAX_PAYLOAD).contains(&payload.len()) {
            return Err(DccError::InvalidPayload { len: payload.len() });
        }
        Ok(Self::build(payload, repeat))
    }

    const fn build(payload: &[u8], repeat: i8) -> Self {
        let mut buf = [0u8; PACKET_BYTES];
        let mut pos = 0usize;

        while pos < PREAMBLE_BITS as usize {
            buf[pos / 8] |= 0x80 >> (pos % 8);
            pos += 1;
        }

        let mut checksum = 0u8;
        let mut i = 0;
        while i <= payload.len() {
            let byte = if i < payload.len() {
                checksum ^= payload[i];
                payload[i]
            } else {
                checksum
            };

            // start bit stays 0
            pos += 1;

            let mut b = 0;
            while b < 8 {
                if byte & (0x80 >> b) != 0 {
                    buf[pos / 8] |= 0x80 >> (pos % 8);
                }
                pos += 1;
                b += 1;
            }
            i += 1;
        }

        Self {
            buf,
            bit_count: pos as u8,
            repeat,
        }
    }

    /// Returns a copy with a different repeat count.
    #[inline]
    pub const fn with_repeat(mut self, repeat: i8) -> Self {
        self.repeat = repeat;
        self
    }

    /// Number of valid bits: 49, 58, 67 or 76.
    #[inline]
    pub const fn bit_count(&self) -> u8 {
        self.bit_count
    }

    /// Remaining retransmissions for the immediate slot.
    #[inline]
    pub const fn repeat(&self) -> i8 {
        self.repeat
    }

    /// Consumes one retransmission. Returns `false` once exhausted.
    #[inline]
    pub(crate) fn take_repeat(&mut self) -> bool {
        if self.repeat > 0 {
            self.repeat -= 1;
            true
        } else {
            false
        }
    }

    /// Value of bit `index`, most significant bit of the first byte first.
    ///
    /// Bits at or past [`bit_count`](Self::bit_count) read as `false`.
    #[inline]
    pub const fn bit(&self, index: u8) -> bool {
        let i = index as usize;
        if i >= PACKET_BYTES * 8 {
            return false;
        }
        self.buf[i / 8] & (0x80 >> (i % 8)) != 0
    }

    /// Raw bit buffer, `ceil(bit_count / 8)` bytes long.
    pub fn raw(&self) -> &[u8] {
        &self.buf[..(self.bit_count as usize).div_ceil(8)]
    }

    /// Decodes the bytes after the preamble, checksum included.
    pub fn data_bytes(&self) -> heapless::Vec<u8, { MAX_PAYLOAD + 1 }> {
        let mut out = heapless::Vec::new();
        let mut pos = PREAMBLE_BITS;
        while pos + 9 <= self.bit_count {
            let mut byte = 0u8;
            for b in 0..8 {
                if self.bit(pos + 1 + b) {
                    byte |= 0x80 >> b;
                }
            }
            let _ = out.push(byte);
            pos += 9;
        }
        out
    }

    /// Returns `true` if the last data byte is the XOR of all the others.
    pub fn checksum_ok(&self) -> bool {
        let bytes = self.data_bytes();
        match bytes.split_last() {
            Some((check, data)) => data.iter().fold(0u8, |acc, b| acc ^ b) == *check,
            None => false,
        }
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::IDLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bits(packet: &Packet) -> Vec<bool> {
        (0..packet.bit_count()).map(|i| packet.bit(i)).collect()
    }

    fn byte_bits(byte: u8) -> Vec<bool> {
        core::iter::once(false)
            .chain((0..8).map(|b| byte & (0x80 >> b) != 0))
            .collect()
    }

    #[test]
    fn idle_packet_layout() {
        let idle = Packet::encode(&IDLE_PAYLOAD, 0).unwrap();
        assert_eq!(idle.bit_count(), 49);

        let mut expected = vec![true; 22];
        expected.extend(byte_bits(0xFF));
        expected.extend(byte_bits(0x00));
        expected.extend(byte_bits(0xFF));
        assert_eq!(bits(&idle), expected);
    }

    #[test]
    fn matches_hand_packed_layout() {
        // Same packing a byte-shifting encoder produces for {0x03, 0x3F, 0xB3}
        let p = Packet::encode(&[0x03, 0x3F, 0xB3], 0).unwrap();
        let c = 0x03 ^ 0x3F ^ 0xB3;
        assert_eq!(p.bit_count(), 58);
        assert_eq!(p.raw()[0], 0xFF);
        assert_eq!(p.raw()[1], 0xFF);
        assert_eq!(p.raw()[2], 0xFC | (0x03 >> 7));
        assert_eq!(p.raw()[3], 0x03 << 1);
        assert_eq!(p.raw()[4], 0x3F);
        assert_eq!(p.raw()[5], 0xB3 >> 1);
        assert_eq!(p.raw()[6], (0xB3u8 << 7) | (c >> 2));
        assert_eq!(p.raw()[7], c << 6);
    }

    #[test]
    fn bit_counts_per_length() {
        assert_eq!(Packet::encode(&[1, 2], 0).unwrap().bit_count(), 49);
        assert_eq!(Packet::encode(&[1, 2, 3], 0).unwrap().bit_count(), 58);
        assert_eq!(Packet::encode(&[1, 2, 3, 4], 0).unwrap().bit_count(), 67);
        assert_eq!(Packet::encode(&[1, 2, 3, 4, 5], 0).unwrap().bit_count(), 76);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert_eq!(
            Packet::encode(&[0xFF], 0),
            Err(DccError::InvalidPayload { len: 1 })
        );
        assert_eq!(
            Packet::encode(&[0; 6], 0),
            Err(DccError::InvalidPayload { len: 6 })
        );
        assert_eq!(
            Packet::encode(&[], 0),
            Err(DccError::InvalidPayload { len: 0 })
        );
    }

    #[test]
    fn reset_constant() {
        assert_eq!(Packet::RESET.data_bytes().as_slice(), &[0, 0, 0]);
        assert!(Packet::RESET.checksum_ok());
    }

    #[test]
    fn repeat_counter() {
        let mut p = Packet::IDLE.with_repeat(2);
        assert!(p.take_repeat());
        assert!(p.take_repeat());
        assert!(!p.take_repeat());
        assert_eq!(p.repeat(), 0);

        let mut never = Packet::IDLE.with_repeat(-1);
        assert!(!never.take_repeat());
    }

    #[test]
    fn bits_past_end_read_low() {
        assert!(!Packet::IDLE.bit(49));
        assert!(!Packet::IDLE.bit(200));
    }

    proptest! {
        #[test]
        fn payload_round_trips(payload in prop::collection::vec(any::<u8>(), 2..=5)) {
            let packet = Packet::encode(&payload, 0).unwrap();
            prop_assert_eq!(packet.bit_count() as usize, 22 + 9 * (payload.len() + 1));
            prop_assert!((0..22).all(|i| packet.bit(i)));

            let bytes = packet.data_bytes();
            prop_assert_eq!(&bytes[..payload.len()], payload.as_slice());
            let xor = payload.iter().fold(0u8, |acc, b| acc ^ b);
            prop_assert_eq!(bytes[payload.len()], xor);
            prop_assert!(packet.checksum_ok());
        }
    }
}
