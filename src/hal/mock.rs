//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware traits, enabling
//! development and testing on desktop without a booster or timer interrupt.
//! The tick interrupt is replaced by calling
//! [`TickHandler::tick`](crate::TickHandler::tick) directly.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockSignal`] | [`SignalOutput`] | Current line level and edge count |
//! | [`MockPower`] | [`PowerOutput`] | Enable state and call count |
//! | [`MockSense`] | [`CurrentSense`] | Constant or scripted samples |
//! | [`MockDelay`] | [`Delay`] | Accumulates requested delay, never sleeps |
//! | [`MockTickTimer`] | [`TickTimer`] | Records start/stop |
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::{SlotTable, TickHandler, TrackSignal};
//! use rs_dcc::hal::MockSignal;
//!
//! let mut table: SlotTable<2> = SlotTable::new();
//! let (_publisher, scheduler) = table.split();
//! let mut signal = TrackSignal::new(scheduler, MockSignal::new());
//!
//! // The idle packet starts with preamble "1" bits: one tick high, one low
//! signal.tick();
//! signal.tick();
//! assert!(signal.output().level);
//! signal.tick();
//! assert!(!signal.output().level);
//! ```

use alloc::collections::VecDeque;

use crate::traits::{CurrentSense, Delay, PowerOutput, SignalOutput, TickTimer};

// ============================================================================
// Track Mocks
// ============================================================================

/// Mock signal line.
///
/// Keeps the current level and counts rising edges. Sample `level` after
/// every tick to reconstruct the waveform.
#[derive(Debug, Default)]
pub struct MockSignal {
    /// Current line level.
    pub level: bool,
    /// Number of low to high transitions.
    pub rising_edges: usize,
    /// Number of `set_level` calls.
    pub writes: usize,
}

impl MockSignal {
    /// Creates a low signal line.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalOutput for MockSignal {
    fn set_level(&mut self, high: bool) {
        if high && !self.level {
            self.rising_edges += 1;
        }
        self.level = high;
        self.writes += 1;
    }
}

/// Mock enable line.
///
/// # Example
///
/// ```rust
/// use rs_dcc::hal::MockPower;
/// use rs_dcc::traits::PowerOutput;
///
/// let mut power = MockPower::new();
/// assert!(!power.is_enabled());
///
/// power.set_enabled(true);
/// assert!(power.enabled);
/// assert_eq!(power.set_count, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockPower {
    /// Current enable state.
    pub enabled: bool,
    /// Number of times `set_enabled` was called.
    pub set_count: usize,
}

impl MockPower {
    /// Creates a disabled enable line.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PowerOutput for MockPower {
    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
        self.set_count += 1;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Mock current sense input.
///
/// Returns scripted samples in order, then keeps returning the last one.
///
/// # Example
///
/// ```rust
/// use rs_dcc::hal::MockSense;
/// use rs_dcc::traits::CurrentSense;
///
/// let mut sense = MockSense::with_samples(&[5, 80]);
/// assert_eq!(sense.read_current_sample(), 5);
/// assert_eq!(sense.read_current_sample(), 80);
/// assert_eq!(sense.read_current_sample(), 80); // Sticks at the last value
/// assert_eq!(sense.reads, 3);
/// ```
#[derive(Debug, Default)]
pub struct MockSense {
    queue: VecDeque<u16>,
    last: u16,
    /// Number of samples taken.
    pub reads: usize,
}

impl MockSense {
    /// Sense input that always reads `value`.
    pub fn constant(value: u16) -> Self {
        Self {
            last: value,
            ..Self::default()
        }
    }

    /// Sense input that replays `samples`, then repeats the last one.
    pub fn with_samples(samples: &[u16]) -> Self {
        let mut sense = Self::default();
        sense.push_samples(samples);
        sense
    }

    /// Queues more samples behind the pending ones.
    pub fn push_samples(&mut self, samples: &[u16]) {
        self.queue.extend(samples.iter().copied());
    }

    /// Drops pending samples and reads `value` from now on.
    pub fn set_constant(&mut self, value: u16) {
        self.queue.clear();
        self.last = value;
    }

    /// Number of scripted samples not yet read.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl CurrentSense for MockSense {
    fn read_current_sample(&mut self) -> u16 {
        self.reads += 1;
        if let Some(sample) = self.queue.pop_front() {
            self.last = sample;
        }
        self.last
    }
}

// ============================================================================
// Timing Mocks
// ============================================================================

/// Mock delay. Adds up the requested time and returns at once.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Total milliseconds requested.
    pub total_ms: u64,
    /// Number of `delay_ms` calls.
    pub calls: usize,
}

impl MockDelay {
    /// Creates a delay with nothing accumulated.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Delay for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
        self.calls += 1;
    }
}

/// Error returned by [`MockTickTimer`] when told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockTimerError;

/// Mock tick timer.
///
/// # Example
///
/// ```rust
/// use rs_dcc::hal::MockTickTimer;
/// use rs_dcc::traits::TickTimer;
///
/// let mut timer = MockTickTimer::new();
/// timer.start(58).unwrap();
/// assert_eq!(timer.period_us, Some(58));
///
/// timer.stop().unwrap();
/// assert_eq!(timer.period_us, None);
/// ```
#[derive(Debug, Default)]
pub struct MockTickTimer {
    /// Period while running, `None` while stopped.
    pub period_us: Option<u32>,
    /// Number of successful starts.
    pub starts: usize,
    /// Number of stops.
    pub stops: usize,
    /// Makes the next `start` fail.
    pub fail_start: bool,
}

impl MockTickTimer {
    /// Creates a stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while started.
    pub fn is_running(&self) -> bool {
        self.period_us.is_some()
    }
}

impl TickTimer for MockTickTimer {
    type Error = MockTimerError;

    fn start(&mut self, period_us: u32) -> Result<(), MockTimerError> {
        if self.fail_start {
            return Err(MockTimerError);
        }
        self.period_us = Some(period_us);
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MockTimerError> {
        self.period_us = None;
        self.stops += 1;
        Ok(())
    }
}
