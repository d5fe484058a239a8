//! ESP32 hardware abstraction layer for a two-track DCC command station.
//!
//! This module provides hardware implementations for an ESP32 driving one
//! H-bridge booster per track (L298N or similar): a signal input, an enable
//! input and a current sense output per track.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32 (Xtensa dual core, 240MHz)
//! - **Boosters**: one H-bridge channel per track, DIR driven by the signal pin
//! - **Current sense**: sense resistor voltage into ADC1
//! - **Tick**: one general purpose hardware timer shared by both tracks
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments.

mod delay;
mod sense;
mod timer;
mod track;

pub use delay::Esp32Delay;
pub use sense::Esp32CurrentSense;
pub use timer::Esp32TickTimer;
pub use track::{Esp32EnablePin, Esp32SignalPin};

/// Pin assignments.
///
/// Sense inputs sit on ADC1, which stays usable while WiFi is up.
pub mod pins {
    // =========================================================================
    // Main Track
    // =========================================================================

    /// Main track signal (booster DIR input)
    pub const MAIN_SIGNAL: i32 = 25;

    /// Main track enable (booster EN input)
    pub const MAIN_ENABLE: i32 = 26;

    /// Main track current sense - ADC1 channel 0
    pub const MAIN_SENSE: i32 = 36;

    // =========================================================================
    // Programming Track
    // =========================================================================

    /// Programming track signal (booster DIR input)
    pub const PROG_SIGNAL: i32 = 27;

    /// Programming track enable (booster EN input)
    pub const PROG_ENABLE: i32 = 14;

    /// Programming track current sense - ADC1 channel 3
    pub const PROG_SENSE: i32 = 39;
}
