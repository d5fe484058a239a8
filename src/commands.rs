//! DCC instruction builders.
//!
//! Pure functions that turn domain commands into packet payloads (data
//! bytes without the checksum). Nothing here touches a track; the
//! [`DccChannel`](crate::DccChannel) methods call these and hand the result
//! to the slot table.
//!
//! # Addressing
//!
//! | Range | Form | Bytes |
//! |-------|------|-------|
//! | 1..=127 | short | `[addr]` |
//! | 128..=10239 | long | `[0xC0 \| addr >> 8, addr & 0xFF]` |
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::commands::{self, Direction, LocoAddress};
//!
//! let loco = LocoAddress::new(3).unwrap();
//! let payload = commands::throttle(loco, 50, Direction::Forward);
//! assert_eq!(payload.as_slice(), &[0x03, 0x3F, 0xB3]);
//! ```

use heapless::Vec;

use crate::error::DccError;
use crate::packet::MAX_PAYLOAD;

/// Encoded instruction bytes, checksum not included.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// Highest short (one byte) locomotive address.
pub const MAX_SHORT_ADDRESS: u16 = 127;

/// Highest long (two byte) locomotive address.
pub const MAX_LONG_ADDRESS: u16 = 10239;

/// Highest speed step in 128-step mode (steps 0..=126).
pub const MAX_SPEED_STEP: u8 = 126;

/// Highest 9-bit accessory decoder address.
pub const MAX_ACCESSORY_ADDRESS: u16 = 511;

/// Highest CV number.
pub const MAX_CV: u16 = 1024;

/// Speed byte meaning "emergency stop" (direction bit aside).
const EMERGENCY_STOP_CODE: u8 = 1;

// ============================================================================
// Locomotive addressing
// ============================================================================

/// Direction of travel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Forward
    #[default]
    Forward,
    /// Reverse
    Reverse,
}

impl Direction {
    /// Bit 7 of the speed byte.
    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Direction::Forward => 0x80,
            Direction::Reverse => 0x00,
        }
    }
}

/// Validated locomotive decoder address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocoAddress(u16);

impl LocoAddress {
    /// Validates `address` against 1..=10239.
    pub fn new(address: u16) -> Result<Self, DccError> {
        if address == 0 || address > MAX_LONG_ADDRESS {
            return Err(DccError::InvalidAddress);
        }
        Ok(Self(address))
    }

    /// Raw address.
    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }

    /// Returns `true` if the address needs the two byte form.
    #[inline]
    pub fn is_long(self) -> bool {
        self.0 > MAX_SHORT_ADDRESS
    }

    fn encode_into(self, out: &mut Payload) {
        if self.is_long() {
            push(out, 0xC0 | (self.0 >> 8) as u8);
        }
        push(out, (self.0 & 0xFF) as u8);
    }
}

impl TryFrom<u16> for LocoAddress {
    type Error = DccError;

    fn try_from(address: u16) -> Result<Self, Self::Error> {
        Self::new(address)
    }
}

// Every builder emits at most 5 bytes, so pushes never overflow
#[inline]
fn push(out: &mut Payload, byte: u8) {
    let _ = out.push(byte);
}

// ============================================================================
// Speed and direction
// ============================================================================

/// 128-step speed and direction instruction.
///
/// `speed` 0 stops, 1..=126 are running steps; values above 126 clamp.
pub fn throttle(address: LocoAddress, speed: u8, direction: Direction) -> Payload {
    let code = match speed {
        0 => 0,
        s => s.min(MAX_SPEED_STEP) + 1,
    };
    speed_instruction(address, code | direction.bit())
}

/// Emergency stop for one locomotive, keeping its direction.
pub fn emergency_stop(address: LocoAddress, direction: Direction) -> Payload {
    speed_instruction(address, EMERGENCY_STOP_CODE | direction.bit())
}

fn speed_instruction(address: LocoAddress, speed_byte: u8) -> Payload {
    let mut out = Payload::new();
    address.encode_into(&mut out);
    push(&mut out, 0x3F);
    push(&mut out, speed_byte);
    out
}

// ============================================================================
// Functions
// ============================================================================

/// Function group selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FunctionGroup {
    /// F0 (headlight) and F1..=F4
    F0To4,
    /// F5..=F8
    F5To8,
    /// F9..=F12
    F9To12,
    /// F13..=F20 (expansion instruction)
    F13To20,
    /// F21..=F28 (expansion instruction)
    F21To28,
}

impl FunctionGroup {
    /// Group containing function `number`, if any.
    pub fn containing(number: u8) -> Option<Self> {
        match number {
            0..=4 => Some(Self::F0To4),
            5..=8 => Some(Self::F5To8),
            9..=12 => Some(Self::F9To12),
            13..=20 => Some(Self::F13To20),
            21..=28 => Some(Self::F21To28),
            _ => None,
        }
    }
}

/// Function group instruction.
///
/// `functions` is a bitmask where bit `i` is the state of F`i`; only the bits
/// of `group` are used.
///
/// F0 sits at bit 4 of the F0-F4 byte, F1..=F4 in bits 0..=3.
pub fn function_group(address: LocoAddress, group: FunctionGroup, functions: u32) -> Payload {
    let mut out = Payload::new();
    address.encode_into(&mut out);
    match group {
        FunctionGroup::F0To4 => push(
            &mut out,
            0x80 | ((functions & 0x01) << 4) as u8 | ((functions >> 1) & 0x0F) as u8,
        ),
        FunctionGroup::F5To8 => push(&mut out, 0xB0 | ((functions >> 5) & 0x0F) as u8),
        FunctionGroup::F9To12 => push(&mut out, 0xA0 | ((functions >> 9) & 0x0F) as u8),
        FunctionGroup::F13To20 => {
            push(&mut out, 0xDE);
            push(&mut out, (functions >> 13) as u8);
        }
        FunctionGroup::F21To28 => {
            push(&mut out, 0xDF);
            push(&mut out, (functions >> 21) as u8);
        }
    }
    out
}

/// Function instruction from caller-composed bytes.
///
/// Without `e_byte` this is a one byte F0-F12 instruction and `f_byte` is
/// forced into the `10xx xxxx` form. With `e_byte` it is an F13-F28
/// expansion instruction and `f_byte` is forced to 0xDE or 0xDF.
pub fn function_raw(address: LocoAddress, f_byte: u8, e_byte: Option<u8>) -> Payload {
    let mut out = Payload::new();
    address.encode_into(&mut out);
    match e_byte {
        None => push(&mut out, (f_byte | 0x80) & 0xBF),
        Some(e) => {
            push(&mut out, (f_byte | 0xDE) & 0xDF);
            push(&mut out, e);
        }
    }
    out
}

// ============================================================================
// Accessories
// ============================================================================

/// Accessory decoder output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessoryAddress {
    /// 9-bit board address 0..=511 plus output pair 0..=3.
    Board {
        /// Decoder board address.
        address: u16,
        /// Output pair on the board.
        channel: u8,
    },
    /// Linear output number 1..=2044: board `(n-1)/4 + 1`, channel `(n-1)%4`.
    Output(u16),
}

impl AccessoryAddress {
    /// Board address and channel, validated.
    pub fn board_and_channel(self) -> Result<(u16, u8), DccError> {
        let (address, channel) = match self {
            AccessoryAddress::Board { address, channel } => (address, channel),
            AccessoryAddress::Output(0) => return Err(DccError::InvalidAddress),
            AccessoryAddress::Output(n) => ((n - 1) / 4 + 1, ((n - 1) % 4) as u8),
        };
        if address > MAX_ACCESSORY_ADDRESS || channel > 3 {
            return Err(DccError::InvalidAddress);
        }
        Ok((address, channel))
    }
}

/// Basic accessory decoder instruction.
///
/// The three high address bits travel inverted in the second byte.
pub fn accessory(address: AccessoryAddress, activate: bool) -> Result<Payload, DccError> {
    let (board, channel) = address.board_and_channel()?;
    let mut out = Payload::new();
    push(&mut out, 0x80 | (board % 64) as u8);
    push(
        &mut out,
        ((((board / 64) % 8) as u8) << 4 | channel << 1 | activate as u8) ^ 0xF8,
    );
    Ok(out)
}

// ============================================================================
// Service mode (programming track)
// ============================================================================

fn check_cv(cv: u16) -> Result<u16, DccError> {
    if cv == 0 || cv > MAX_CV {
        return Err(DccError::InvalidCv);
    }
    // CV numbers travel zero-based
    Ok(cv - 1)
}

fn check_bit(bit: u8) -> Result<u8, DccError> {
    if bit > 7 {
        return Err(DccError::InvalidCv);
    }
    Ok(bit)
}

fn direct_mode(op: u8, cv: u16, data: u8) -> Result<Payload, DccError> {
    let cv = check_cv(cv)?;
    let mut out = Payload::new();
    push(&mut out, op | ((cv >> 8) & 0x03) as u8);
    push(&mut out, (cv & 0xFF) as u8);
    push(&mut out, data);
    Ok(out)
}

/// Direct mode "write byte".
pub fn cv_write_byte(cv: u16, value: u8) -> Result<Payload, DccError> {
    direct_mode(0x7C, cv, value)
}

/// Direct mode "verify byte". The decoder acks if the CV holds `value`.
pub fn cv_verify_byte(cv: u16, value: u8) -> Result<Payload, DccError> {
    direct_mode(0x74, cv, value)
}

/// Direct mode "write bit".
pub fn cv_write_bit(cv: u16, bit: u8, value: bool) -> Result<Payload, DccError> {
    let bit = check_bit(bit)?;
    direct_mode(0x78, cv, 0xF0 | (value as u8) << 3 | bit)
}

/// Direct mode "verify bit". The decoder acks if the bit is `value`.
pub fn cv_verify_bit(cv: u16, bit: u8, value: bool) -> Result<Payload, DccError> {
    let bit = check_bit(bit)?;
    direct_mode(0x78, cv, 0xE0 | (value as u8) << 3 | bit)
}
