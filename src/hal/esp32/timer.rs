//! Periodic tick from an ESP32 general purpose hardware timer.
//!
//! The timer counts at `tick_hz()` and raises an alarm every tick period
//! with auto-reload, so the interrupt fires at a fixed rate regardless of
//! how long the handler runs.

use crate::traits::TickTimer;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::sys::EspError;
use esp_idf_hal::timer::{config::Config as TimerConfig, Timer, TimerDriver};

/// Hardware tick source.
///
/// The interrupt callback is bound at construction; [`TickTimer::start`]
/// only programs the period and arms the alarm.
///
/// # Example
///
/// ```ignore
/// use rs_dcc::hal::esp32::Esp32TickTimer;
/// use rs_dcc::traits::TickTimer;
///
/// let peripherals = Peripherals::take()?;
/// let mut timer = Esp32TickTimer::new(peripherals.timer00, || {
///     // runs in interrupt context every tick
/// })?;
/// timer.start(58)?;
/// ```
pub struct Esp32TickTimer<'d> {
    driver: TimerDriver<'d>,
}

impl<'d> Esp32TickTimer<'d> {
    /// Creates the timer and binds `on_tick` to its alarm interrupt.
    ///
    /// `on_tick` runs in interrupt context: it must not block, allocate or
    /// log.
    pub fn new<F>(timer: impl Peripheral<P = impl Timer> + 'd, on_tick: F) -> Result<Self, EspError>
    where
        F: FnMut() + Send + 'static,
    {
        let mut driver = TimerDriver::new(timer, &TimerConfig::new().auto_reload(true))?;
        // SAFETY: the callback is 'static and owns everything it touches.
        unsafe {
            driver.subscribe(on_tick)?;
        }
        Ok(Self { driver })
    }

    /// Timer counts per `period_us`.
    fn alarm_for(&self, period_us: u32) -> u64 {
        (self.driver.tick_hz() * u64::from(period_us) / 1_000_000).max(1)
    }
}

impl TickTimer for Esp32TickTimer<'_> {
    type Error = EspError;

    fn start(&mut self, period_us: u32) -> Result<(), EspError> {
        let alarm = self.alarm_for(period_us);
        self.driver.set_counter(0)?;
        self.driver.set_alarm(alarm)?;
        self.driver.enable_interrupt()?;
        self.driver.enable_alarm(true)?;
        self.driver.enable(true)
    }

    fn stop(&mut self) -> Result<(), EspError> {
        self.driver.enable(false)?;
        self.driver.enable_alarm(false)
    }
}
