//! Trait definitions for hardware abstraction.
//!
//! This module defines the collaborators the signal generator is built on,
//! so it can:
//! - Run on different hardware (ESP32, desktop mock)
//! - Be tested without a timer interrupt, by calling the tick handler directly
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`SignalOutput`]: DCC signal line, driven from the tick context
//! - [`PowerOutput`]: Track enable line
//! - [`CurrentSense`]: Raw current samples for overcurrent and ack detection
//! - [`Delay`]: Blocking delay for mailbox polling
//! - [`TickTimer`]: Periodic interrupt source

pub mod hardware;

pub use hardware::*;
