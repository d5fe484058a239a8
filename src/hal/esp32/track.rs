//! Booster signal and enable lines as GPIO outputs.
//!
//! Pin writes on the ESP32 cannot fail once the driver is set up, so the
//! driver result is dropped.

use crate::traits::{PowerOutput, SignalOutput};
use esp_idf_hal::gpio::{AnyOutputPin, Output, OutputPin, PinDriver};
use esp_idf_hal::peripheral::Peripheral;

/// Booster signal line, driven from the timer interrupt.
///
/// # Example
///
/// ```ignore
/// use rs_dcc::hal::esp32::Esp32SignalPin;
///
/// let peripherals = Peripherals::take()?;
/// let signal = Esp32SignalPin::new(peripherals.pins.gpio25)?;
/// ```
pub struct Esp32SignalPin<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> Esp32SignalPin<'d> {
    /// Configures `pin` as a push-pull output, initially low.
    pub fn new(
        pin: impl Peripheral<P = impl OutputPin> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let mut pin = PinDriver::output(pin.into_ref().map_into::<AnyOutputPin>())?;
        pin.set_low()?;
        Ok(Self { pin })
    }
}

impl SignalOutput for Esp32SignalPin<'_> {
    #[inline(always)]
    fn set_level(&mut self, high: bool) {
        let _ = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

/// Booster enable line. Starts disabled.
pub struct Esp32EnablePin<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> Esp32EnablePin<'d> {
    /// Configures `pin` as a push-pull output with the track switched off.
    pub fn new(
        pin: impl Peripheral<P = impl OutputPin> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let mut pin = PinDriver::output(pin.into_ref().map_into::<AnyOutputPin>())?;
        pin.set_low()?;
        Ok(Self { pin })
    }
}

impl PowerOutput for Esp32EnablePin<'_> {
    fn set_enabled(&mut self, on: bool) {
        let _ = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }

    fn is_enabled(&self) -> bool {
        self.pin.is_set_high()
    }
}
