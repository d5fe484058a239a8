//! # rs-dcc
//!
//! DCC (Digital Command Control) signal generation for model railways: packet
//! encoding, slot scheduling and microsecond bit timing for a main track and
//! a programming track sharing one timer interrupt.
//!
//! ## Features
//!
//! - **Packet encoder**: preamble, start bits and XOR checksum for 2-5 byte instructions
//! - **Slot table**: logical registers multiplexed onto repeating slots, plus a
//!   priority slot for short bursts
//! - **Lock-free handoff**: one-deep mailbox between command code and the interrupt
//! - **Bit timing**: O(1) per tick, never blocks or allocates
//! - **Command API**: throttle, functions F0-F28, accessories, service mode CV access
//! - **Hardware abstraction**: runs on ESP32 or against desktop mocks
//!
//! ## Architecture
//!
//! Each track is split into a tick side and a command side:
//!
//! ```text
//!                   normal context                    tick context
//!   DccChannel ──▶ Publisher ──▶ [Mailbox] ──▶ Scheduler ──▶ TrackSignal ──▶ line
//!                      │                          ▲
//!                      └──── occupancy bitmask ───┘
//! ```
//!
//! - `packet` - Packet buffer and encoder
//! - `mailbox` - Single-entry producer/consumer handoff
//! - `slots` - Slot table and its [`Publisher`]/[`Scheduler`] halves
//! - `signal` - Bit-timing state machine ([`TrackSignal`])
//! - `generator` - Tick fan-out to both tracks ([`SignalGenerator`])
//! - `commands` - DCC instruction builders
//! - `channel` / `service` - Command API for the main and programming tracks
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_dcc::{Channel, DccChannel, SignalGenerator, SlotTable, TrackSignal};
//! use rs_dcc::commands::Direction;
//! use rs_dcc::config::Config;
//! use rs_dcc::hal::{MockDelay, MockPower, MockSense, MockSignal, MockTickTimer};
//!
//! let config = Config::default();
//! let mut table: SlotTable<8> = SlotTable::new();
//! let (publisher, scheduler) = table.split();
//!
//! // Tick side
//! let mut generator = SignalGenerator::new(MockTickTimer::new(), config.generator);
//! generator.set_main_channel(TrackSignal::new(scheduler, MockSignal::new()));
//! generator.set_prog_channel(rs_dcc::generator::NoTrack);
//! generator.begin().unwrap();
//!
//! // Command side
//! let mut main = Channel::new(
//!     publisher,
//!     MockPower::new(),
//!     MockSense::constant(0),
//!     MockDelay::new(),
//!     config.main,
//! );
//! main.begin().unwrap();
//! main.set_power(true);
//!
//! // The timer interrupt would do this every 58 µs
//! for _ in 0..200 {
//!     generator.on_tick();
//! }
//!
//! main.set_throttle(1, 3, 40, Direction::Forward).unwrap();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Track command API and the main track channel.
pub mod channel;
/// DCC instruction builders.
pub mod commands;
/// Error taxonomy.
pub mod error;
/// Dual-track tick fan-out.
pub mod generator;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Single-entry packet handoff between contexts.
pub mod mailbox;
/// Packet buffer and bitstream encoder.
pub mod packet;
/// Programming track with service mode CV access.
pub mod service;
/// Bit-timing state machine.
pub mod signal;
/// Register to slot multiplexing.
pub mod slots;
/// Hardware collaborator traits.
pub mod traits;

/// Builder-style configuration for desktop and ESP32.
pub mod config;

// Re-exports for convenience
pub use channel::{Channel, DccChannel};
pub use commands::{AccessoryAddress, Direction, FunctionGroup, LocoAddress};
pub use error::DccError;
pub use generator::SignalGenerator;
pub use packet::Packet;
pub use service::ProgrammingTrack;
pub use signal::{TickHandler, TrackSignal};
pub use slots::{Publisher, Register, Scheduler, SlotIndex, SlotTable};
pub use traits::{CurrentSense, Delay, PowerOutput, SignalOutput, TickTimer};

// Config re-exports
pub use config::{AckConfig, ChannelConfig, Config, GeneratorConfig};
