//! Booster current sensing via the ESP32 ADC.
//!
//! The booster's sense resistor voltage is read raw (0-4095 at 12 bits).
//! Thresholds in [`ChannelConfig`](crate::config::ChannelConfig) and the ack
//! detector work on these raw counts; no conversion to milliamps is done.
//!
//! # Wiring
//!
//! - Main track sense → GPIO36 (ADC1)
//! - Programming track sense → GPIO39 (ADC1)
//!
//! ADC2 is unusable while WiFi is active, so both inputs sit on ADC1.

use crate::traits::CurrentSense;
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::gpio::ADCPin;
use esp_idf_hal::peripheral::Peripheral;

/// Current sense input on one ADC channel.
///
/// # Example
///
/// ```ignore
/// use esp_idf_hal::adc::oneshot::AdcDriver;
/// use rs_dcc::hal::esp32::Esp32CurrentSense;
/// use rs_dcc::traits::CurrentSense;
///
/// let peripherals = Peripherals::take()?;
/// let adc1 = AdcDriver::new(peripherals.adc1)?;
/// let mut sense = Esp32CurrentSense::new(&adc1, peripherals.pins.gpio36)?;
///
/// let raw = sense.read_current_sample();
/// ```
pub struct Esp32CurrentSense<'d, P: ADCPin> {
    channel: AdcChannelDriver<'d, P, &'d AdcDriver<'d, P::Adc>>,
    /// Last successful reading, returned if a conversion fails
    last_raw: u16,
}

impl<'d, P: ADCPin> Esp32CurrentSense<'d, P> {
    /// Creates a sense input on `pin`.
    ///
    /// # Errors
    ///
    /// Returns an error if ADC channel initialization fails.
    pub fn new(
        adc: &'d AdcDriver<'d, P::Adc>,
        pin: impl Peripheral<P = P> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(adc, pin, &config)?;

        Ok(Self {
            channel,
            last_raw: 0,
        })
    }

    /// Returns the last raw reading.
    #[inline]
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }
}

impl<P: ADCPin> CurrentSense for Esp32CurrentSense<'_, P> {
    fn read_current_sample(&mut self) -> u16 {
        if let Ok(raw) = self.channel.read() {
            self.last_raw = raw;
        }
        self.last_raw
    }
}
