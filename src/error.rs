//! Error taxonomy for the signal generation core.
//!
//! Every fallible operation in the normal context returns
//! `Result<_, DccError>`. Nothing on the tick path returns an error: broken
//! internal bookkeeping there is a bug and panics instead.

use core::fmt;

/// Errors reported by the encoder, the slot table and the channel API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DccError {
    /// Payload length outside 2..=5 data bytes.
    ///
    /// This is a programming error in the caller; the command builders in
    /// [`crate::commands`] never produce it.
    InvalidPayload {
        /// Number of data bytes that were supplied.
        len: usize,
    },

    /// No free slot for a register that has no mapping yet.
    ///
    /// The command is dropped. Unloading another register frees a slot.
    SlotTableFull,

    /// The mailbox was not drained within the configured bound.
    ///
    /// Either the tick source is stopped or publishers are contending.
    /// The caller may retry.
    PublishTimeout,

    /// Sensed current exceeded the configured threshold.
    ///
    /// The channel output has already been disabled when this is returned.
    /// There is no automatic re-enable.
    Overcurrent {
        /// Raw sample that tripped the check.
        sample: u16,
        /// Threshold in force at the time.
        threshold: u16,
    },

    /// Locomotive or accessory address outside the encodable range.
    InvalidAddress,

    /// CV number outside 1..=1024 or bit position outside 0..=7.
    InvalidCv,
}

impl fmt::Display for DccError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DccError::InvalidPayload { len } => {
                write!(f, "invalid packet payload length {} (expected 2..=5)", len)
            }
            DccError::SlotTableFull => write!(f, "no free packet slot"),
            DccError::PublishTimeout => write!(f, "timed out waiting for packet mailbox"),
            DccError::Overcurrent { sample, threshold } => {
                write!(f, "overcurrent: sample {} above threshold {}", sample, threshold)
            }
            DccError::InvalidAddress => write!(f, "address out of range"),
            DccError::InvalidCv => write!(f, "CV number or bit position out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DccError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            DccError::InvalidPayload { len: 7 }.to_string(),
            "invalid packet payload length 7 (expected 2..=5)"
        );
        assert_eq!(DccError::SlotTableFull.to_string(), "no free packet slot");
        assert_eq!(
            DccError::Overcurrent {
                sample: 4000,
                threshold: 3000
            }
            .to_string(),
            "overcurrent: sample 4000 above threshold 3000"
        );
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(DccError::PublishTimeout, DccError::PublishTimeout);
        assert_ne!(DccError::PublishTimeout, DccError::SlotTableFull);
    }
}
