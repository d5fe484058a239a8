//! FreeRTOS backed delay for mailbox polling.

use crate::traits::Delay;
use esp_idf_hal::delay::FreeRtos;

/// Blocking delay that yields to other FreeRTOS tasks.
///
/// Resolution is one RTOS tick (1 ms with the default 1000 Hz tick rate).
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Delay;

impl Delay for Esp32Delay {
    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
