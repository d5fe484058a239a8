//! Slot table: multiplexes logical registers onto repeating transmission slots.
//!
//! The table has `N` steady-state slots (1..=N) plus the immediate slot 0.
//! Callers address slots through a [`Register`]: every [`Register::Id`] is
//! lazily mapped to the lowest free slot on first use and keeps it until it
//! is released. [`Register::Immediate`] always targets slot 0, which never
//! joins the round-robin and only carries short bursts of priority traffic.
//!
//! # Split
//!
//! [`SlotTable::split`] hands out exactly one producer and one consumer:
//!
//! - [`Publisher`] lives in the normal context. It owns the register map and
//!   is the only writer of the occupancy set and the mailbox post step.
//! - [`Scheduler`] lives in the tick context. It owns the slot storage and
//!   the current slot, and is the only one draining the mailbox.
//!
//! The occupancy set and the highest occupied index are atomics shared by
//! both halves; the only packet handoff is the one-deep [`Mailbox`].
//!
//! # Example
//!
//! ```rust
//! use rs_dcc::slots::{Register, SlotIndex, SlotTable};
//! use rs_dcc::hal::MockDelay;
//!
//! let mut table: SlotTable<4> = SlotTable::new();
//! let (mut publisher, mut scheduler) = table.split();
//! let mut delay = MockDelay::new();
//!
//! let slot = publisher.publish(Register::Id(5), &[0x03, 0x3F, 0xB3], 0, &mut delay).unwrap();
//! assert_eq!(slot, SlotIndex::new(1));
//!
//! // The tick context picks it up at the next packet boundary
//! assert_eq!(scheduler.consume(), slot);
//! ```

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use heapless::LinearMap;

use crate::error::DccError;
use crate::mailbox::Mailbox;
use crate::packet::Packet;
use crate::traits::Delay;

/// Default bound on the mailbox wait, in milliseconds.
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u32 = 1000;

/// Default mailbox polling interval, in milliseconds.
pub const DEFAULT_PUBLISH_POLL_MS: u32 = 1;

/// Logical command source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Register {
    /// Slot 0: transient priority traffic with a bounded repeat count.
    Immediate,
    /// A steady-state register, refreshed continuously once loaded.
    Id(u16),
}

/// Physical slot handle. Index 0 is the immediate slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// The immediate slot.
    pub const IMMEDIATE: SlotIndex = SlotIndex(0);

    /// Slot that carries the idle packet whenever nothing is loaded.
    pub const IDLE_HOME: SlotIndex = SlotIndex(1);

    /// Wraps a raw index.
    #[inline]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Raw index.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns `true` for slot 0.
    #[inline]
    pub const fn is_immediate(self) -> bool {
        self.0 == 0
    }

    #[inline]
    const fn bit(self) -> u32 {
        1 << self.0
    }
}

/// State shared by the two halves of a slot table.
///
/// Create it once (it can live in a `static`), then [`split`](Self::split)
/// it into a [`Publisher`] and a [`Scheduler`].
pub struct SlotTable<const N: usize> {
    mailbox: Mailbox,
    /// Bit `i` set when slot `i` holds a steady-state register. Bit 0 never set.
    occupied: AtomicU32,
    /// Highest set bit of `occupied`, 0 when empty.
    max_occupied: AtomicU8,
}

impl<const N: usize> SlotTable<N> {
    /// Creates an empty table.
    ///
    /// # Panics
    ///
    /// Panics if `N` is not in 1..=31 (at compile time when used in a const
    /// or static initializer).
    pub const fn new() -> Self {
        assert!(N >= 1 && N <= 31, "slot capacity must be in 1..=31");

        Self {
            mailbox: Mailbox::new(),
            occupied: AtomicU32::new(0),
            max_occupied: AtomicU8::new(0),
        }
    }

    /// Splits the table into its producer and consumer halves.
    pub fn split(&mut self) -> (Publisher<'_, N>, Scheduler<'_, N>) {
        let shared: &Self = self;
        (Publisher::new(shared), Scheduler::new(shared))
    }

    #[inline]
    fn occupied(&self) -> u32 {
        self.occupied.load(Ordering::Acquire)
    }

    #[inline]
    fn max_occupied(&self) -> u8 {
        self.max_occupied.load(Ordering::Acquire)
    }
}

impl<const N: usize> Default for SlotTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Producer half
// ============================================================================

/// Normal-context half of a slot table.
pub struct Publisher<'a, const N: usize> {
    shared: &'a SlotTable<N>,
    registers: LinearMap<u16, SlotIndex, N>,
    poll_ms: u32,
    max_polls: u32,
}

impl<'a, const N: usize> Publisher<'a, N> {
    fn new(shared: &'a SlotTable<N>) -> Self {
        Self {
            shared,
            registers: LinearMap::new(),
            poll_ms: DEFAULT_PUBLISH_POLL_MS,
            max_polls: DEFAULT_PUBLISH_TIMEOUT_MS / DEFAULT_PUBLISH_POLL_MS,
        }
    }

    /// Sets the mailbox wait bound and polling interval.
    pub fn with_timeout(mut self, timeout_ms: u32, poll_ms: u32) -> Self {
        self.set_timeout(timeout_ms, poll_ms);
        self
    }

    /// Sets the mailbox wait bound and polling interval.
    pub fn set_timeout(&mut self, timeout_ms: u32, poll_ms: u32) {
        self.poll_ms = poll_ms.max(1);
        self.max_polls = timeout_ms / self.poll_ms;
    }

    /// Encodes `payload` and stages it for `register`'s slot.
    ///
    /// Waits, polling with `delay`, until the mailbox is vacant. The packet
    /// reaches its slot at the next packet boundary in the tick context.
    ///
    /// # Errors
    ///
    /// - [`DccError::InvalidPayload`] for a payload outside 2..=5 bytes
    /// - [`DccError::SlotTableFull`] if `register` is new and no slot is free
    /// - [`DccError::PublishTimeout`] if the mailbox stayed full; the packet
    ///   already pending is untouched and no slot is allocated
    pub fn publish<D: Delay>(
        &mut self,
        register: Register,
        payload: &[u8],
        repeat: i8,
        delay: &mut D,
    ) -> Result<SlotIndex, DccError> {
        let packet = Packet::encode(payload, repeat)?;
        let (slot, is_new) = self.resolve(register)?;

        self.post_blocking(slot, &packet, delay)?;

        if let (Register::Id(id), true) = (register, is_new) {
            self.registers
                .insert(id, slot)
                .map_err(|_| DccError::SlotTableFull)?;
            log::debug!("register {} allocated slot {}", id, slot.get());
        }
        if !slot.is_immediate() {
            self.mark_occupied(slot);
        }

        log::debug!(
            "loaded {:02x?} into slot {} (repeat {})",
            packet.data_bytes().as_slice(),
            slot.get(),
            repeat
        );
        Ok(slot)
    }

    /// Releases `register`'s slot.
    ///
    /// Returns `Ok(None)` if the register was never loaded; nothing changes
    /// in that case. When the last occupied slot goes away the idle packet is
    /// staged into slot 1 first, so the line keeps carrying a valid stream.
    ///
    /// # Errors
    ///
    /// [`DccError::PublishTimeout`] if the register's own update was still
    /// waiting in the mailbox, or the idle packet could not be staged. The
    /// register stays loaded.
    pub fn release<D: Delay>(
        &mut self,
        register: Register,
        delay: &mut D,
    ) -> Result<Option<SlotIndex>, DccError> {
        let id = match register {
            Register::Id(id) => id,
            Register::Immediate => return Ok(None),
        };
        let slot = match self.registers.get(&id) {
            Some(slot) => *slot,
            None => return Ok(None),
        };

        // A staged update for this slot must reach it while it is still occupied
        self.wait_drained(slot, delay)?;

        let remaining = self.shared.occupied() & !slot.bit();
        if remaining == 0 {
            self.post_blocking(SlotIndex::IDLE_HOME, &Packet::IDLE, delay)?;
        }

        self.registers.remove(&id);
        self.shared.occupied.store(remaining, Ordering::Release);

        let mut max = self.shared.max_occupied();
        while max > 0 && remaining & (1 << max) == 0 {
            max -= 1;
        }
        self.shared.max_occupied.store(max, Ordering::Release);

        log::debug!("register {} released slot {}", id, slot.get());
        Ok(Some(slot))
    }

    /// Stages the idle packet into slot 1 without touching any register.
    pub fn load_idle<D: Delay>(&mut self, delay: &mut D) -> Result<(), DccError> {
        self.post_blocking(SlotIndex::IDLE_HOME, &Packet::IDLE, delay)
    }

    /// Slot currently mapped to `register`.
    pub fn slot_of(&self, register: Register) -> Option<SlotIndex> {
        match register {
            Register::Immediate => Some(SlotIndex::IMMEDIATE),
            Register::Id(id) => self.registers.get(&id).copied(),
        }
    }

    /// Occupancy bitmask (bit `i` for slot `i`).
    pub fn occupied(&self) -> u32 {
        self.shared.occupied()
    }

    /// Highest occupied slot index, 0 when nothing is loaded.
    pub fn max_occupied(&self) -> u8 {
        self.shared.max_occupied()
    }

    /// Number of loaded registers.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` when no register is loaded.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Packet staged in the mailbox and its target, if one is pending.
    pub fn pending(&self) -> Option<(SlotIndex, Packet)> {
        self.shared
            .mailbox
            .pending()
            .map(|(slot, packet)| (SlotIndex(slot), packet))
    }

    /// Finds the slot for `register`, or picks the lowest free one.
    /// Nothing is committed here.
    fn resolve(&self, register: Register) -> Result<(SlotIndex, bool), DccError> {
        let id = match register {
            Register::Immediate => return Ok((SlotIndex::IMMEDIATE, false)),
            Register::Id(id) => id,
        };
        if let Some(slot) = self.registers.get(&id) {
            return Ok((*slot, false));
        }

        let occupied = self.shared.occupied();
        (1..=N as u8)
            .map(SlotIndex)
            .find(|slot| occupied & slot.bit() == 0)
            .map(|slot| (slot, true))
            .ok_or(DccError::SlotTableFull)
    }

    fn mark_occupied(&mut self, slot: SlotIndex) {
        let occupied = self.shared.occupied() | slot.bit();
        self.shared.occupied.store(occupied, Ordering::Release);
        if slot.get() > self.shared.max_occupied() {
            self.shared.max_occupied.store(slot.get(), Ordering::Release);
        }
    }

    fn post_blocking<D: Delay>(
        &mut self,
        slot: SlotIndex,
        packet: &Packet,
        delay: &mut D,
    ) -> Result<(), DccError> {
        self.poll_until(slot, delay, |mailbox| mailbox.post(slot.get(), packet))
    }

    /// Waits until no packet for `slot` is pending.
    fn wait_drained<D: Delay>(&mut self, slot: SlotIndex, delay: &mut D) -> Result<(), DccError> {
        self.poll_until(slot, delay, |mailbox| {
            mailbox
                .pending()
                .map_or(true, |(target, _)| target != slot.get())
        })
    }

    fn poll_until<D: Delay>(
        &self,
        slot: SlotIndex,
        delay: &mut D,
        mut ready: impl FnMut(&Mailbox) -> bool,
    ) -> Result<(), DccError> {
        let mut polls = 0;
        while !ready(&self.shared.mailbox) {
            if polls >= self.max_polls {
                log::warn!(
                    "mailbox still full after {} ms, giving up on slot {}",
                    polls * self.poll_ms,
                    slot.get()
                );
                return Err(DccError::PublishTimeout);
            }
            delay.delay_ms(self.poll_ms);
            polls += 1;
        }
        Ok(())
    }
}

// ============================================================================
// Consumer half
// ============================================================================

/// Tick-context half of a slot table.
///
/// Nothing here blocks or allocates; every method is O(1).
pub struct Scheduler<'a, const N: usize> {
    shared: &'a SlotTable<N>,
    immediate: Packet,
    /// Storage for slots 1..=N.
    slots: [Packet; N],
    current: SlotIndex,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    fn new(shared: &'a SlotTable<N>) -> Self {
        Self {
            shared,
            immediate: Packet::IDLE,
            slots: [Packet::IDLE; N],
            current: SlotIndex::IDLE_HOME,
        }
    }

    /// Slot being transmitted.
    #[inline]
    pub fn current(&self) -> SlotIndex {
        self.current
    }

    /// Packet in the current slot.
    #[inline]
    pub fn current_packet(&self) -> &Packet {
        self.packet(self.current)
    }

    /// Stored packet for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside 0..=N.
    #[inline]
    pub fn packet(&self, slot: SlotIndex) -> &Packet {
        match slot.get() as usize {
            0 => &self.immediate,
            i => &self.slots[i - 1],
        }
    }

    /// Consumes one retransmission of the immediate slot.
    ///
    /// Returns `true` if the immediate packet should go out again.
    #[inline]
    pub fn repeat_immediate(&mut self) -> bool {
        self.current.is_immediate() && self.immediate.take_repeat()
    }

    /// Picks the slot for the next packet.
    ///
    /// A pending publish wins: its packet is copied into the target slot,
    /// which becomes current, and the mailbox is cleared. Otherwise the next
    /// occupied slot above the current one is chosen, wrapping to the lowest
    /// occupied slot. Slot 0 is only ever entered through the mailbox. With
    /// nothing occupied, slot 1 (the idle packet) is used.
    pub fn consume(&mut self) -> SlotIndex {
        match self.shared.mailbox.take() {
            Some((slot, packet)) => {
                let index = slot as usize;
                assert!(index <= N, "mailbox target {} outside slot table", index);
                match index {
                    0 => self.immediate = packet,
                    i => self.slots[i - 1] = packet,
                }
                self.current = SlotIndex(slot);
            }
            None => self.current = self.next_occupied(),
        }
        self.current
    }

    #[inline]
    fn next_occupied(&self) -> SlotIndex {
        let max = self.shared.max_occupied().min(N as u8);
        let in_range = self.shared.occupied() & (u32::MAX >> (31 - max as u32)) & !1;
        let above = in_range & !(2u32 << self.current.get()).wrapping_sub(1);

        match if above != 0 { above } else { in_range } {
            0 => SlotIndex::IDLE_HOME,
            pick => SlotIndex(pick.trailing_zeros() as u8),
        }
    }
}
