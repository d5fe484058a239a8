//! Dual-track signal generator: one periodic tick shared by two tracks.
//!
//! The generator owns the hardware tick source and up to two
//! [`TickHandler`]s. On every tick the main track runs first, then the
//! programming track. The two tracks share nothing but the tick.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::{SignalGenerator, SlotTable, TrackSignal};
//! use rs_dcc::config::GeneratorConfig;
//! use rs_dcc::hal::{MockSignal, MockTickTimer};
//!
//! let mut table: SlotTable<4> = SlotTable::new();
//! let (_publisher, scheduler) = table.split();
//!
//! let mut generator = SignalGenerator::new(MockTickTimer::new(), GeneratorConfig::default());
//! generator.set_main_channel(TrackSignal::new(scheduler, MockSignal::new()));
//! generator.set_prog_channel(rs_dcc::generator::NoTrack);
//!
//! generator.begin().unwrap();
//! assert_eq!(generator.timer().period_us, Some(58));
//!
//! generator.on_tick();
//! ```

use crate::config::GeneratorConfig;
use crate::signal::TickHandler;
use crate::traits::TickTimer;

/// Placeholder for a track slot that is not wired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoTrack;

impl TickHandler for NoTrack {
    #[inline]
    fn tick(&mut self) {}
}

/// Owns the tick source and fans each tick out to the main and programming
/// tracks, in that order.
pub struct SignalGenerator<T: TickTimer, M: TickHandler, P: TickHandler = NoTrack> {
    timer: T,
    config: GeneratorConfig,
    main: Option<M>,
    prog: Option<P>,
    running: bool,
}

impl<T: TickTimer, M: TickHandler, P: TickHandler> SignalGenerator<T, M, P> {
    /// Creates a stopped generator with no tracks attached.
    pub fn new(timer: T, config: GeneratorConfig) -> Self {
        Self {
            timer,
            config,
            main: None,
            prog: None,
            running: false,
        }
    }

    /// Attaches the main track, replacing any previous one.
    pub fn set_main_channel(&mut self, main: M) {
        self.main = Some(main);
    }

    /// Attaches the programming track, replacing any previous one.
    pub fn set_prog_channel(&mut self, prog: P) {
        self.prog = Some(prog);
    }

    /// Starts the tick source at the configured period.
    pub fn begin(&mut self) -> Result<(), T::Error> {
        self.timer.start(self.config.tick_period_us)?;
        self.running = true;
        log::info!(
            "signal generator started ({} us tick, main: {}, prog: {})",
            self.config.tick_period_us,
            self.main.is_some(),
            self.prog.is_some()
        );
        Ok(())
    }

    /// Stops the tick source. Both tracks freeze where they are; slot
    /// contents are kept.
    pub fn end(&mut self) -> Result<(), T::Error> {
        self.timer.stop()?;
        self.running = false;
        log::info!("signal generator stopped");
        Ok(())
    }

    /// Returns `true` between [`begin`](Self::begin) and [`end`](Self::end).
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Tick entry point, called from the timer interrupt.
    ///
    /// Does nothing while stopped.
    #[inline]
    pub fn on_tick(&mut self) {
        if !self.running {
            return;
        }
        if let Some(main) = self.main.as_mut() {
            main.tick();
        }
        if let Some(prog) = self.prog.as_mut() {
            prog.tick();
        }
    }

    /// The main track, if attached.
    pub fn main_channel(&self) -> Option<&M> {
        self.main.as_ref()
    }

    /// The programming track, if attached.
    pub fn prog_channel(&self) -> Option<&P> {
        self.prog.as_ref()
    }

    /// The tick source.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Generator configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockTickTimer;

    #[derive(Default)]
    struct Counter {
        ticks: u32,
    }

    impl TickHandler for Counter {
        fn tick(&mut self) {
            self.ticks += 1;
        }
    }

    /// Records the global order in which handlers ran.
    struct Ordered<'a> {
        id: u8,
        log: &'a core::cell::RefCell<Vec<u8>>,
    }

    impl TickHandler for Ordered<'_> {
        fn tick(&mut self) {
            self.log.borrow_mut().push(self.id);
        }
    }

    #[test]
    fn begin_and_end_drive_the_timer() {
        let mut gen: SignalGenerator<_, Counter> =
            SignalGenerator::new(MockTickTimer::new(), GeneratorConfig::default());
        assert!(!gen.is_running());

        gen.begin().unwrap();
        assert!(gen.is_running());
        assert_eq!(gen.timer().period_us, Some(58));
        assert_eq!(gen.timer().starts, 1);

        gen.end().unwrap();
        assert!(!gen.is_running());
        assert_eq!(gen.timer().period_us, None);
        assert_eq!(gen.timer().stops, 1);
    }

    #[test]
    fn custom_tick_period() {
        let config = GeneratorConfig::default().with_tick_period_us(100);
        let mut gen: SignalGenerator<_, Counter> =
            SignalGenerator::new(MockTickTimer::new(), config);
        gen.begin().unwrap();
        assert_eq!(gen.timer().period_us, Some(100));
    }

    #[test]
    fn ticks_ignored_while_stopped() {
        let mut gen: SignalGenerator<_, Counter, Counter> =
            SignalGenerator::new(MockTickTimer::new(), GeneratorConfig::default());
        gen.set_main_channel(Counter::default());
        gen.set_prog_channel(Counter::default());

        gen.on_tick();
        assert_eq!(gen.main_channel().unwrap().ticks, 0);

        gen.begin().unwrap();
        gen.on_tick();
        gen.on_tick();
        gen.end().unwrap();
        gen.on_tick();

        assert_eq!(gen.main_channel().unwrap().ticks, 2);
        assert_eq!(gen.prog_channel().unwrap().ticks, 2);
    }

    #[test]
    fn main_runs_before_prog() {
        let log = core::cell::RefCell::new(Vec::new());
        let mut gen = SignalGenerator::new(MockTickTimer::new(), GeneratorConfig::default());
        gen.set_main_channel(Ordered { id: 1, log: &log });
        gen.set_prog_channel(Ordered { id: 2, log: &log });

        gen.begin().unwrap();
        gen.on_tick();
        gen.on_tick();
        assert_eq!(*log.borrow(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn main_only() {
        let mut gen: SignalGenerator<_, Counter> =
            SignalGenerator::new(MockTickTimer::new(), GeneratorConfig::default());
        gen.set_main_channel(Counter::default());
        gen.begin().unwrap();
        gen.on_tick();
        assert_eq!(gen.main_channel().unwrap().ticks, 1);
        assert!(gen.prog_channel().is_none());
    }

    #[test]
    fn timer_error_keeps_generator_stopped() {
        let mut timer = MockTickTimer::new();
        timer.fail_start = true;
        let mut gen: SignalGenerator<_, Counter> =
            SignalGenerator::new(timer, GeneratorConfig::default());
        assert!(gen.begin().is_err());
        assert!(!gen.is_running());
    }
}
