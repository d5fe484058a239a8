//! Track channels: the normal-context command API.
//!
//! A track is split in two. The tick side is a [`TrackSignal`] handed to the
//! [`SignalGenerator`]; the command side is a [`DccChannel`] implementation
//! that owns the slot table's [`Publisher`], the enable line and the current
//! sense input.
//!
//! # Overview
//!
//! [`DccChannel`] has a small set of required methods (power, current,
//! packet load and unload) and provides the command API on top:
//!
//! - [`set_throttle`](DccChannel::set_throttle) / [`emergency_stop`](DccChannel::emergency_stop)
//! - [`set_function_group`](DccChannel::set_function_group) / [`set_function`](DccChannel::set_function)
//! - [`set_accessory`](DccChannel::set_accessory)
//! - [`check_overcurrent`](DccChannel::check_overcurrent)
//!
//! Two implementations exist: [`Channel`] for the main track and
//! [`ProgrammingTrack`](crate::ProgrammingTrack), which adds CV access.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::{Channel, DccChannel, SlotTable};
//! use rs_dcc::commands::Direction;
//! use rs_dcc::config::ChannelConfig;
//! use rs_dcc::hal::{MockDelay, MockPower, MockSense};
//!
//! let mut table: SlotTable<8> = SlotTable::new();
//! let (publisher, mut scheduler) = table.split();
//! let mut main = Channel::new(
//!     publisher,
//!     MockPower::new(),
//!     MockSense::constant(0),
//!     MockDelay::new(),
//!     ChannelConfig::main(),
//! );
//!
//! main.begin().unwrap();
//! main.set_power(true);
//! scheduler.consume(); // tick side drains the idle packet
//!
//! let slot = main.set_throttle(5, 3, 50, Direction::Forward).unwrap();
//! assert_eq!(slot.get(), 1);
//! ```
//!
//! [`TrackSignal`]: crate::TrackSignal
//! [`SignalGenerator`]: crate::SignalGenerator

use crate::commands::{self, AccessoryAddress, Direction, FunctionGroup, LocoAddress};
use crate::config::ChannelConfig;
use crate::error::DccError;
use crate::slots::{Publisher, Register, SlotIndex};
use crate::traits::{CurrentSense, Delay, PowerOutput};

/// Repeat count for accessory packets sent through the immediate slot.
pub const ACCESSORY_REPEAT: i8 = 4;

/// Normal-context interface of one track.
///
/// Register ids are caller-chosen; each one keeps its slot until
/// [`unload`](Self::unload).
pub trait DccChannel {
    /// Stages the idle packet into slot 1. Power stays as it is.
    fn begin(&mut self) -> Result<(), DccError>;

    /// Shuts the track down by disabling the output. Slots are kept.
    fn end(&mut self);

    /// Enables or disables the track output. The bit stream keeps running.
    fn set_power(&mut self, on: bool);

    /// Returns `true` if the track output is enabled.
    fn power(&self) -> bool;

    /// One raw current sample.
    fn read_current(&mut self) -> u16;

    /// Track configuration.
    fn config(&self) -> &ChannelConfig;

    /// Encodes `payload` and publishes it for `register`.
    fn load_packet(
        &mut self,
        register: Register,
        payload: &[u8],
        repeat: i8,
    ) -> Result<SlotIndex, DccError>;

    /// Releases `register`'s slot. `Ok(None)` if it was never loaded.
    fn unload(&mut self, register: Register) -> Result<Option<SlotIndex>, DccError>;

    /// Sets speed and direction of the locomotive at `address`.
    fn set_throttle(
        &mut self,
        register: u16,
        address: u16,
        speed: u8,
        direction: Direction,
    ) -> Result<SlotIndex, DccError> {
        let payload = commands::throttle(LocoAddress::new(address)?, speed, direction);
        self.load_packet(Register::Id(register), &payload, 0)
    }

    /// Emergency-stops the locomotive at `address`. The stop keeps being
    /// refreshed in `register`'s slot.
    fn emergency_stop(
        &mut self,
        register: u16,
        address: u16,
        direction: Direction,
    ) -> Result<SlotIndex, DccError> {
        let payload = commands::emergency_stop(LocoAddress::new(address)?, direction);
        self.load_packet(Register::Id(register), &payload, 0)
    }

    /// Sets one function group. Bit `i` of `functions` is F`i`.
    fn set_function_group(
        &mut self,
        register: u16,
        address: u16,
        group: FunctionGroup,
        functions: u32,
    ) -> Result<SlotIndex, DccError> {
        let payload = commands::function_group(LocoAddress::new(address)?, group, functions);
        self.load_packet(Register::Id(register), &payload, 0)
    }

    /// Sends a caller-composed function instruction.
    fn set_function(
        &mut self,
        register: u16,
        address: u16,
        f_byte: u8,
        e_byte: Option<u8>,
    ) -> Result<SlotIndex, DccError> {
        let payload = commands::function_raw(LocoAddress::new(address)?, f_byte, e_byte);
        self.load_packet(Register::Id(register), &payload, 0)
    }

    /// Switches an accessory output. Goes out as a short burst through the
    /// immediate slot and never occupies a steady-state slot.
    fn set_accessory(&mut self, address: AccessoryAddress, activate: bool) -> Result<(), DccError> {
        let payload = commands::accessory(address, activate)?;
        self.load_packet(Register::Immediate, &payload, ACCESSORY_REPEAT)?;
        Ok(())
    }

    /// Takes one current sample and compares it to the threshold.
    ///
    /// Above the threshold the output is disabled before the error is
    /// returned. There is no automatic re-enable.
    fn check_overcurrent(&mut self) -> Result<u16, DccError> {
        let sample = self.read_current();
        let threshold = self.config().overcurrent_threshold;
        if sample > threshold {
            self.set_power(false);
            log::warn!(
                "overcurrent: sample {} above {}, track power cut",
                sample,
                threshold
            );
            return Err(DccError::Overcurrent { sample, threshold });
        }
        Ok(sample)
    }
}

/// Command side of a track.
///
/// # Type Parameters
///
/// - `E`: enable line ([`PowerOutput`])
/// - `S`: current sense ([`CurrentSense`])
/// - `D`: delay used while waiting on the mailbox ([`Delay`])
/// - `N`: slot capacity, matching the [`SlotTable`](crate::SlotTable)
pub struct Channel<'a, E: PowerOutput, S: CurrentSense, D: Delay, const N: usize> {
    name: &'static str,
    publisher: Publisher<'a, N>,
    enable: E,
    sense: S,
    delay: D,
    config: ChannelConfig,
}

impl<'a, E, S, D, const N: usize> Channel<'a, E, S, D, N>
where
    E: PowerOutput,
    S: CurrentSense,
    D: Delay,
{
    /// Creates a channel around the producer half of a slot table.
    pub fn new(
        publisher: Publisher<'a, N>,
        enable: E,
        sense: S,
        delay: D,
        config: ChannelConfig,
    ) -> Self {
        let publisher =
            publisher.with_timeout(config.publish_timeout_ms, config.publish_poll_ms);
        Self {
            name: "main",
            publisher,
            enable,
            sense,
            delay,
            config,
        }
    }

    /// Sets the name used in log lines.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Name used in log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Producer half of the slot table.
    pub fn publisher(&self) -> &Publisher<'a, N> {
        &self.publisher
    }

    /// Enable line.
    pub fn enable_line(&self) -> &E {
        &self.enable
    }

    /// Current sense input.
    pub fn sense(&mut self) -> &mut S {
        &mut self.sense
    }

    /// Delay used for mailbox polling.
    pub fn delay(&self) -> &D {
        &self.delay
    }
}

impl<E, S, D, const N: usize> DccChannel for Channel<'_, E, S, D, N>
where
    E: PowerOutput,
    S: CurrentSense,
    D: Delay,
{
    fn begin(&mut self) -> Result<(), DccError> {
        self.publisher.load_idle(&mut self.delay)?;
        log::info!("{} track ready, {} slots", self.name, N);
        Ok(())
    }

    fn end(&mut self) {
        self.enable.set_enabled(false);
        log::info!("{} track shut down", self.name);
    }

    fn set_power(&mut self, on: bool) {
        log::info!("{} track power {}", self.name, if on { "on" } else { "off" });
        self.enable.set_enabled(on);
    }

    fn power(&self) -> bool {
        self.enable.is_enabled()
    }

    fn read_current(&mut self) -> u16 {
        self.sense.read_current_sample()
    }

    fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn load_packet(
        &mut self,
        register: Register,
        payload: &[u8],
        repeat: i8,
    ) -> Result<SlotIndex, DccError> {
        self.publisher
            .publish(register, payload, repeat, &mut self.delay)
            .map_err(|e| {
                log::warn!("{} track: {:?} not loaded: {}", self.name, register, e);
                e
            })
    }

    fn unload(&mut self, register: Register) -> Result<Option<SlotIndex>, DccError> {
        self.publisher.release(register, &mut self.delay)
    }
}
