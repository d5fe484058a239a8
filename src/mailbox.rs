//! Single-entry packet handoff from the normal context to the tick context.
//!
//! The mailbox holds at most one staged packet plus the slot it is destined
//! for. The producer writes the staging buffer only while the mailbox is
//! empty and then raises the `full` flag; the consumer copies the staged
//! packet out and lowers the flag. The flag is the only cross-context
//! signal.
//!
//! ```text
//! normal context ──post()──▶ [ full | slot | packet ] ──take()──▶ tick context
//! ```
//!
//! There is no queue and no coalescing: a second `post` while one is
//! pending is refused and the caller has to wait.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::packet::Packet;

/// One-deep, lock-free packet handoff.
///
/// # Safety
///
/// Uses `UnsafeCell` for the staging buffer. Sound because:
/// - exactly one producer calls [`post`](Self::post) (enforced by the slot
///   table split, which hands out a single producer half)
/// - exactly one consumer calls [`take`](Self::take)
/// - the producer touches the buffer only while `full` is `false`, the
///   consumer only while it is `true`
///
/// # Memory Ordering
///
/// - Producer stores `full = true` with `Release` after writing the buffer
/// - Consumer loads `full` with `Acquire` before reading the buffer, and
///   stores `full = false` with `Release` after copying it out
pub struct Mailbox {
    full: AtomicBool,
    slot: AtomicU8,
    staged: UnsafeCell<Packet>,
}

// SAFETY: single producer, single consumer, buffer ownership handed over by
// the `full` flag.
unsafe impl Sync for Mailbox {}
unsafe impl Send for Mailbox {}

impl Mailbox {
    /// Creates an empty mailbox.
    pub const fn new() -> Self {
        Self {
            full: AtomicBool::new(false),
            slot: AtomicU8::new(0),
            staged: UnsafeCell::new(Packet::IDLE),
        }
    }

    /// Returns `true` while a packet is waiting to be drained.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.full.load(Ordering::Acquire)
    }

    /// Stages `packet` for `slot`. Returns `false` if one is already pending,
    /// in which case the pending packet is left untouched.
    #[inline]
    pub(crate) fn post(&self, slot: u8, packet: &Packet) -> bool {
        if self.full.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: mailbox empty, the consumer does not read the buffer.
        unsafe {
            *self.staged.get() = *packet;
        }
        self.slot.store(slot, Ordering::Relaxed);
        self.full.store(true, Ordering::Release);
        true
    }

    /// Drains the pending packet, if any.
    ///
    /// # Timing
    ///
    /// O(1), a 12 byte copy. Never blocks.
    #[inline]
    pub(crate) fn take(&self) -> Option<(u8, Packet)> {
        if !self.full.load(Ordering::Acquire) {
            return None;
        }

        let slot = self.slot.load(Ordering::Relaxed);
        // SAFETY: mailbox full, the producer does not write the buffer.
        let packet = unsafe { *self.staged.get() };
        self.full.store(false, Ordering::Release);
        Some((slot, packet))
    }

    /// Copy of the staged packet while one is pending.
    pub fn pending(&self) -> Option<(u8, Packet)> {
        if !self.full.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: mailbox full, the producer does not write the buffer and
        // this is a plain read.
        Some((self.slot.load(Ordering::Relaxed), unsafe {
            *self.staged.get()
        }))
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
