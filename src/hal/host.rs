//! Desktop implementations backed by the standard library.

use std::thread;
use std::time::Duration;

use crate::traits::Delay;

/// Blocking delay on the current thread.
///
/// Use it when the tick side runs on another thread, so mailbox waits take
/// real time.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
