//! Programming track: service mode CV access with acknowledgment detection.
//!
//! [`ProgrammingTrack`] wraps a [`Channel`] and implements [`DccChannel`] by
//! delegation, so the whole command API works on the programming track too.
//! On top it sends direct mode service packets through the immediate slot
//! and watches the current sense input for the decoder's acknowledgment: a
//! short current pulse the decoder produces by loading its motor.
//!
//! # Sequences
//!
//! | Operation | Packets (repeat count) |
//! |-----------|------------------------|
//! | write byte | reset (1), write (4), reset (1), idle (10), then verify byte |
//! | write bit | reset (1), bit write (4), reset (1), idle (10), then verify bit |
//! | verify | baseline, reset (3), verify (5), reset (1), ack window |
//! | read byte | verify bit = 1 for each of the 8 bits, then verify byte |
//!
//! Each packet load waits until the previous immediate burst has gone out,
//! so the ack window starts once the verify packets are on the rails.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::{Channel, ProgrammingTrack, SlotTable};
//! use rs_dcc::config::{AckConfig, ChannelConfig};
//! use rs_dcc::hal::{MockDelay, MockPower, MockSense};
//!
//! let mut table: SlotTable<2> = SlotTable::new();
//! let (publisher, _scheduler) = table.split();
//! let channel = Channel::new(
//!     publisher,
//!     MockPower::new(),
//!     MockSense::constant(10),
//!     MockDelay::new(),
//!     ChannelConfig::prog(),
//! );
//! let prog = ProgrammingTrack::new(channel, AckConfig::default());
//! assert_eq!(prog.ack_config().threshold, 30.0);
//! ```

use crate::channel::{Channel, DccChannel};
use crate::commands;
use crate::config::{AckConfig, ChannelConfig};
use crate::error::DccError;
use crate::packet::{IDLE_PAYLOAD, RESET_PAYLOAD};
use crate::slots::{Register, SlotIndex};
use crate::traits::{CurrentSense, Delay, PowerOutput};

/// Command side of the programming track.
pub struct ProgrammingTrack<'a, E: PowerOutput, S: CurrentSense, D: Delay, const N: usize> {
    channel: Channel<'a, E, S, D, N>,
    ack: AckConfig,
}

impl<'a, E, S, D, const N: usize> ProgrammingTrack<'a, E, S, D, N>
where
    E: PowerOutput,
    S: CurrentSense,
    D: Delay,
{
    /// Wraps `channel` for service mode use.
    pub fn new(channel: Channel<'a, E, S, D, N>, ack: AckConfig) -> Self {
        Self {
            channel: channel.named("prog"),
            ack,
        }
    }

    /// Acknowledgment detection settings.
    pub fn ack_config(&self) -> &AckConfig {
        &self.ack
    }

    /// The wrapped channel.
    pub fn channel(&self) -> &Channel<'a, E, S, D, N> {
        &self.channel
    }

    /// The wrapped channel, mutably.
    pub fn channel_mut(&mut self) -> &mut Channel<'a, E, S, D, N> {
        &mut self.channel
    }

    /// Writes `value` to `cv`, then verifies it.
    ///
    /// Returns `true` if the decoder acknowledged the verify.
    pub fn write_cv(&mut self, cv: u16, value: u8) -> Result<bool, DccError> {
        let write = commands::cv_write_byte(cv, value)?;
        let verify = commands::cv_verify_byte(cv, value)?;

        self.write_sequence(&write)?;
        let ack = self.verify(&verify)?;
        log::info!("CV{} write {}: {}", cv, value, ack_str(ack));
        Ok(ack)
    }

    /// Writes one bit of `cv`, then verifies it.
    ///
    /// Returns `true` if the decoder acknowledged the verify.
    pub fn write_cv_bit(&mut self, cv: u16, bit: u8, value: bool) -> Result<bool, DccError> {
        let write = commands::cv_write_bit(cv, bit, value)?;
        let verify = commands::cv_verify_bit(cv, bit, value)?;

        self.write_sequence(&write)?;
        let ack = self.verify(&verify)?;
        log::info!("CV{} bit {} write {}: {}", cv, bit, value as u8, ack_str(ack));
        Ok(ack)
    }

    /// Asks the decoder whether `cv` holds `value`.
    pub fn verify_cv(&mut self, cv: u16, value: u8) -> Result<bool, DccError> {
        let verify = commands::cv_verify_byte(cv, value)?;
        let ack = self.verify(&verify)?;
        log::debug!("CV{} verify {}: {}", cv, value, ack_str(ack));
        Ok(ack)
    }

    /// Reads `cv` bit by bit, then confirms the assembled value.
    ///
    /// Returns `None` when the decoder does not acknowledge the final
    /// verify (no decoder, or a bad read).
    pub fn read_cv(&mut self, cv: u16) -> Result<Option<u8>, DccError> {
        let mut value = 0u8;
        for bit in 0..8 {
            let probe = commands::cv_verify_bit(cv, bit, true)?;
            if self.verify(&probe)? {
                value |= 1 << bit;
            }
        }

        let confirm = commands::cv_verify_byte(cv, value)?;
        let result = self.verify(&confirm)?.then_some(value);
        match result {
            Some(v) => log::info!("CV{} read: {}", cv, v),
            None => log::warn!("CV{} read: no ack", cv),
        }
        Ok(result)
    }

    fn immediate(&mut self, payload: &[u8], repeat: i8) -> Result<(), DccError> {
        self.channel
            .load_packet(Register::Immediate, payload, repeat)
            .map(|_| ())
    }

    fn write_sequence(&mut self, write: &[u8]) -> Result<(), DccError> {
        self.immediate(&RESET_PAYLOAD, 1)?;
        self.immediate(write, 4)?;
        self.immediate(&RESET_PAYLOAD, 1)?;
        self.immediate(&IDLE_PAYLOAD, 10)
    }

    /// Sends a verify burst and watches for the ack pulse.
    fn verify(&mut self, verify: &[u8]) -> Result<bool, DccError> {
        let base = self.channel.sense().read_average(self.ack.base_samples);

        self.immediate(&RESET_PAYLOAD, 3)?;
        self.immediate(verify, 5)?;
        // Returns once the verify burst has started going out
        self.immediate(&RESET_PAYLOAD, 1)?;

        Ok(self.detect_ack(base))
    }

    fn detect_ack(&mut self, base: u16) -> bool {
        let AckConfig {
            samples,
            smoothing,
            threshold,
            ..
        } = self.ack;

        let mut smoothed = 0.0f32;
        let mut ack = false;
        for _ in 0..samples {
            let rise = self.channel.sense().read_current_sample() as f32 - base as f32;
            smoothed = rise * smoothing + smoothed * (1.0 - smoothing);
            if smoothed > threshold {
                ack = true;
            }
        }
        ack
    }
}

fn ack_str(ack: bool) -> &'static str {
    if ack {
        "ack"
    } else {
        "no ack"
    }
}

impl<E, S, D, const N: usize> DccChannel for ProgrammingTrack<'_, E, S, D, N>
where
    E: PowerOutput,
    S: CurrentSense,
    D: Delay,
{
    fn begin(&mut self) -> Result<(), DccError> {
        self.channel.begin()
    }

    fn end(&mut self) {
        self.channel.end()
    }

    fn set_power(&mut self, on: bool) {
        self.channel.set_power(on)
    }

    fn power(&self) -> bool {
        self.channel.power()
    }

    fn read_current(&mut self) -> u16 {
        self.channel.read_current()
    }

    fn config(&self) -> &ChannelConfig {
        self.channel.config()
    }

    fn load_packet(
        &mut self,
        register: Register,
        payload: &[u8],
        repeat: i8,
    ) -> Result<SlotIndex, DccError> {
        self.channel.load_packet(register, payload, repeat)
    }

    fn unload(&mut self, register: Register) -> Result<Option<SlotIndex>, DccError> {
        self.channel.unload(register)
    }
}
