//! Hardware abstraction traits for track outputs, current sensing and timing.
//!
//! This module defines the narrow interfaces the signal generator needs from
//! the platform, so the core runs unchanged on the ESP32 and against desktop
//! mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose | Context |
//! |-------|---------|---------|
//! | [`SignalOutput`] | DCC signal line of the H-bridge | tick |
//! | [`PowerOutput`] | Track enable line | normal |
//! | [`CurrentSense`] | Raw current samples | normal |
//! | [`Delay`] | Blocking millisecond delay | normal |
//! | [`TickTimer`] | Periodic hardware interrupt | normal |
//!
//! Output and sense operations are treated as instantaneous and infallible.
//! Implementations that talk to fallible drivers swallow the driver error.
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::traits::{CurrentSense, PowerOutput};
//! use rs_dcc::hal::{MockPower, MockSense};
//!
//! let mut power = MockPower::new();
//! power.set_enabled(true);
//! assert!(power.is_enabled());
//!
//! let mut sense = MockSense::constant(120);
//! assert_eq!(sense.read_average(8), 120);
//! ```

/// Signal line of one track.
///
/// Driven from the tick context, so implementations must be fast and must
/// not block or allocate.
pub trait SignalOutput {
    /// Drives the line high or low.
    fn set_level(&mut self, high: bool);
}

/// Enable line of one track's booster.
///
/// Gating this line cuts track power without stopping the bit stream.
pub trait PowerOutput {
    /// Enables or disables the output stage.
    fn set_enabled(&mut self, on: bool);

    /// Returns the current state of the enable line.
    fn is_enabled(&self) -> bool;
}

/// Current sense input of one track.
///
/// Samples are raw converter counts. The core only compares them against
/// thresholds and never converts units.
pub trait CurrentSense {
    /// Takes one raw sample.
    fn read_current_sample(&mut self) -> u16;

    /// Averages `samples` consecutive readings.
    ///
    /// Returns 0 when `samples` is 0.
    fn read_average(&mut self, samples: u16) -> u16 {
        if samples == 0 {
            return 0;
        }
        let sum: u32 = (0..samples)
            .map(|_| self.read_current_sample() as u32)
            .sum();
        (sum / samples as u32) as u16
    }
}

/// Blocking delay used while waiting on the packet mailbox.
///
/// Only ever called from the normal context.
pub trait Delay {
    /// Sleeps for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Periodic hardware interrupt source.
///
/// The platform wires the interrupt to
/// [`SignalGenerator::on_tick`](crate::SignalGenerator::on_tick); this trait
/// only arms and disarms it.
pub trait TickTimer {
    /// Error type for timer operations.
    type Error;

    /// Starts firing every `period_us` microseconds.
    fn start(&mut self, period_us: u32) -> Result<(), Self::Error>;

    /// Stops firing. Tick state is left as is.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // CurrentSense Default Methods Tests
    // =========================================================================

    struct RampSense {
        next: u16,
        reads: usize,
    }

    impl CurrentSense for RampSense {
        fn read_current_sample(&mut self) -> u16 {
            let v = self.next;
            self.next += 10;
            self.reads += 1;
            v
        }
    }

    #[test]
    fn read_average_default_impl() {
        let mut sense = RampSense { next: 0, reads: 0 };
        // 0, 10, 20, 30 -> 15
        assert_eq!(sense.read_average(4), 15);
        assert_eq!(sense.reads, 4);
    }

    #[test]
    fn read_average_zero_samples() {
        let mut sense = RampSense { next: 100, reads: 0 };
        assert_eq!(sense.read_average(0), 0);
        assert_eq!(sense.reads, 0);
    }

    #[test]
    fn read_average_does_not_overflow() {
        struct Max;
        impl CurrentSense for Max {
            fn read_current_sample(&mut self) -> u16 {
                u16::MAX
            }
        }
        assert_eq!(Max.read_average(1000), u16::MAX);
    }
}
