//! Configuration for the generator, both tracks and acknowledgment detection.
//!
//! Builder style throughout: start from `Default` and override with the
//! `with_*` methods. Uses `heapless::String` for `no_std` compatibility.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::config::{AckConfig, ChannelConfig, Config};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.generator.tick_period_us, 58);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_main(ChannelConfig::main().with_overcurrent_threshold(2500))
//!     .with_ack(AckConfig::default().with_threshold(40.0));
//! ```

use heapless::String as HString;

use crate::slots::{DEFAULT_PUBLISH_POLL_MS, DEFAULT_PUBLISH_TIMEOUT_MS};

/// Maximum length of the station name.
pub const MAX_NAME: usize = 32;

/// Type alias for short config strings.
pub type ShortString = HString<MAX_NAME>;

/// Tick period giving 58 µs half bits for "1" and 116 µs for "0".
pub const DEFAULT_TICK_PERIOD_US: u32 = 58;

/// Default main track overcurrent threshold, raw sense counts.
pub const DEFAULT_MAIN_THRESHOLD: u16 = 3000;

/// Default programming track overcurrent threshold, raw sense counts.
pub const DEFAULT_PROG_THRESHOLD: u16 = 250;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating at a char boundary if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= MAX_NAME)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete command station configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Station name shown in logs
    pub name: ShortString,
    /// Shared tick source
    pub generator: GeneratorConfig,
    /// Main (operations) track
    pub main: ChannelConfig,
    /// Programming (service mode) track
    pub prog: ChannelConfig,
    /// Acknowledgment detection on the programming track
    pub ack: AckConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: short_string("rs-dcc"),
            generator: GeneratorConfig::default(),
            main: ChannelConfig::main(),
            prog: ChannelConfig::prog(),
            ack: AckConfig::default(),
        }
    }
}

impl Config {
    /// Set the station name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set generator configuration
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Set main track configuration
    pub fn with_main(mut self, main: ChannelConfig) -> Self {
        self.main = main;
        self
    }

    /// Set programming track configuration
    pub fn with_prog(mut self, prog: ChannelConfig) -> Self {
        self.prog = prog;
        self
    }

    /// Set acknowledgment detection configuration
    pub fn with_ack(mut self, ack: AckConfig) -> Self {
        self.ack = ack;
        self
    }
}

// ============================================================================
// Generator Config
// ============================================================================

/// Tick source configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorConfig {
    /// Timer period in microseconds
    pub tick_period_us: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tick_period_us: DEFAULT_TICK_PERIOD_US,
        }
    }
}

impl GeneratorConfig {
    /// Set tick period (minimum 1 µs)
    pub fn with_tick_period_us(mut self, us: u32) -> Self {
        self.tick_period_us = us.max(1);
        self
    }
}

// ============================================================================
// Channel Config
// ============================================================================

/// Per-track configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelConfig {
    /// Upper bound on the mailbox wait in `publish`
    pub publish_timeout_ms: u32,
    /// Mailbox polling interval
    pub publish_poll_ms: u32,
    /// Raw current sample above which the track is shut down
    pub overcurrent_threshold: u16,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::main()
    }
}

impl ChannelConfig {
    /// Defaults for a main (operations) track
    pub fn main() -> Self {
        Self {
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
            publish_poll_ms: DEFAULT_PUBLISH_POLL_MS,
            overcurrent_threshold: DEFAULT_MAIN_THRESHOLD,
        }
    }

    /// Defaults for a programming track
    pub fn prog() -> Self {
        Self {
            overcurrent_threshold: DEFAULT_PROG_THRESHOLD,
            ..Self::main()
        }
    }

    /// Set mailbox wait bound
    pub fn with_publish_timeout_ms(mut self, ms: u32) -> Self {
        self.publish_timeout_ms = ms;
        self
    }

    /// Set mailbox polling interval (minimum 1 ms)
    pub fn with_publish_poll_ms(mut self, ms: u32) -> Self {
        self.publish_poll_ms = ms.max(1);
        self
    }

    /// Set overcurrent threshold
    pub fn with_overcurrent_threshold(mut self, raw: u16) -> Self {
        self.overcurrent_threshold = raw;
        self
    }
}

// ============================================================================
// Ack Config
// ============================================================================

/// Decoder acknowledgment detection on the programming track.
///
/// A baseline is averaged over `base_samples` readings. Each of the following
/// `samples` readings is folded into an exponential average of
/// `sample - baseline` with weight `smoothing`; the ack is seen when that
/// average exceeds `threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AckConfig {
    /// Readings averaged for the baseline
    pub base_samples: u16,
    /// Readings examined for the ack pulse
    pub samples: u16,
    /// Weight of the newest reading, 0.0 to 1.0
    pub smoothing: f32,
    /// Smoothed rise over baseline that counts as an ack
    pub threshold: f32,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            base_samples: 100,
            samples: 500,
            smoothing: 0.2,
            threshold: 30.0,
        }
    }
}

impl AckConfig {
    /// Set baseline sample count
    pub fn with_base_samples(mut self, n: u16) -> Self {
        self.base_samples = n;
        self
    }

    /// Set ack window sample count
    pub fn with_samples(mut self, n: u16) -> Self {
        self.samples = n;
        self
    }

    /// Set smoothing weight (clamped to 0.0-1.0)
    pub fn with_smoothing(mut self, weight: f32) -> Self {
        self.smoothing = weight.clamp(0.0, 1.0);
        self
    }

    /// Set ack threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}
