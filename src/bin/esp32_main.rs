//! ESP32 two-track DCC command station.
//!
//! This is the main entry point for the physical hardware. It:
//! - Starts the 58 µs tick on a hardware timer, feeding both tracks
//! - Loads the idle packet on both tracks and powers the main track
//! - Polls both current sense inputs for overcurrent every loop
//!
//! Commands are issued through the [`DccChannel`] API from this loop; front
//! ends (network, CLI) sit on top of it.
//!
//! # Hardware Setup
//!
//! See [`rs_dcc::hal::esp32::pins`] for the wiring.
//!
//! # Build
//!
//! ```bash
//! cargo build --release --features esp32 --bin esp32_main
//! ```

use core::cell::UnsafeCell;
use esp_idf_hal::adc::oneshot::AdcDriver;
use esp_idf_hal::interrupt::IsrCriticalSection;
use esp_idf_hal::peripherals::Peripherals;
use rs_dcc::commands::Direction;
use rs_dcc::config::Config;
use rs_dcc::hal::esp32::{Esp32CurrentSense, Esp32Delay, Esp32EnablePin, Esp32SignalPin, Esp32TickTimer};
use rs_dcc::{Channel, DccChannel, ProgrammingTrack, SignalGenerator, SlotTable, TrackSignal};
use std::thread;
use std::time::Duration;

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 10;

/// Main track slot capacity
const MAIN_SLOTS: usize = 12;

/// Programming track slot capacity
const PROG_SLOTS: usize = 2;

type MainSignal = TrackSignal<'static, Esp32SignalPin<'static>, MAIN_SLOTS>;
type ProgSignal = TrackSignal<'static, Esp32SignalPin<'static>, PROG_SLOTS>;
type Generator = SignalGenerator<Esp32TickTimer<'static>, MainSignal, ProgSignal>;

// ============================================================================
// Interrupt-shared generator
// ============================================================================

/// Cell shared between the timer interrupt and the main task.
///
/// Every access runs inside an interrupt-masking critical section, so the
/// interrupt and the main task never hold `&mut` at the same time.
struct IsrCell<T> {
    cs: IsrCriticalSection,
    inner: UnsafeCell<Option<T>>,
}

// SAFETY: all access goes through `with`, serialized by the critical section.
unsafe impl<T: Send> Sync for IsrCell<T> {}

impl<T> IsrCell<T> {
    const fn new() -> Self {
        Self {
            cs: IsrCriticalSection::new(),
            inner: UnsafeCell::new(None),
        }
    }

    fn set(&self, value: T) {
        let _guard = self.cs.enter();
        // SAFETY: exclusive while the critical section is held.
        unsafe { *self.inner.get() = Some(value) };
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let _guard = self.cs.enter();
        // SAFETY: exclusive while the critical section is held.
        unsafe { (*self.inner.get()).as_mut().map(f) }
    }
}

static GENERATOR: IsrCell<Generator> = IsrCell::new();

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = Config::default();

    println!();
    println!("================================");
    println!("  {} DCC command station", config.name);
    println!("================================");
    println!();

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Slot tables (live for the whole program, shared with the interrupt)
    // =========================================================================
    let main_table: &'static mut SlotTable<MAIN_SLOTS> = Box::leak(Box::new(SlotTable::new()));
    let prog_table: &'static mut SlotTable<PROG_SLOTS> = Box::leak(Box::new(SlotTable::new()));
    let (main_publisher, main_scheduler) = main_table.split();
    let (prog_publisher, prog_scheduler) = prog_table.split();

    // =========================================================================
    // Track outputs (GPIO25/26 main, GPIO27/14 prog)
    // =========================================================================
    let main_signal = TrackSignal::new(main_scheduler, Esp32SignalPin::new(peripherals.pins.gpio25)?);
    let prog_signal = TrackSignal::new(prog_scheduler, Esp32SignalPin::new(peripherals.pins.gpio27)?);
    let main_enable = Esp32EnablePin::new(peripherals.pins.gpio26)?;
    let prog_enable = Esp32EnablePin::new(peripherals.pins.gpio14)?;
    println!("[OK] Track outputs initialized (GPIO25/26, GPIO27/14)");

    // =========================================================================
    // Current sense (ADC1 on GPIO36/39)
    // =========================================================================
    let adc1: &'static AdcDriver<'static, _> = Box::leak(Box::new(AdcDriver::new(peripherals.adc1)?));
    let main_sense = Esp32CurrentSense::new(adc1, peripherals.pins.gpio36)?;
    let prog_sense = Esp32CurrentSense::new(adc1, peripherals.pins.gpio39)?;
    println!("[OK] Current sense initialized (GPIO36/39 ADC)");

    // =========================================================================
    // Tick timer + generator
    // =========================================================================
    let timer = Esp32TickTimer::new(peripherals.timer00, || {
        GENERATOR.with(|generator| generator.on_tick());
    })?;
    let mut generator = SignalGenerator::new(timer, config.generator);
    generator.set_main_channel(main_signal);
    generator.set_prog_channel(prog_signal);

    // Started outside the critical section; the interrupt sees `None` until `set`
    generator.begin()?;
    GENERATOR.set(generator);
    println!(
        "[OK] Signal generator running ({} us tick)",
        config.generator.tick_period_us
    );

    // =========================================================================
    // Channels
    // =========================================================================
    let mut main = Channel::new(main_publisher, main_enable, main_sense, Esp32Delay, config.main);
    let mut prog = ProgrammingTrack::new(
        Channel::new(prog_publisher, prog_enable, prog_sense, Esp32Delay, config.prog),
        config.ack,
    );

    main.begin()?;
    prog.begin()?;
    main.set_power(true);
    println!("[OK] Main track powered, {} slots", MAIN_SLOTS);

    // Park the default loco until a front end takes over
    main.set_throttle(1, 3, 0, Direction::Forward)?;

    println!();
    println!("Ready.");

    // =========================================================================
    // Main loop: overcurrent supervision
    // =========================================================================
    loop {
        if main.power() {
            if let Err(e) = main.check_overcurrent() {
                println!("[FAULT] main track: {}", e);
            }
        }
        if prog.power() {
            if let Err(e) = prog.check_overcurrent() {
                println!("[FAULT] programming track: {}", e);
            }
        }
        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
