//! Typed storage cells.
//!
//! A cell is either empty (`None`) or holds exactly one live value. Taking a
//! value out leaves the cell empty, so "read of an unconstructed slot" is an
//! observable state (checked with `debug_assert_occupied!`) instead of a read
//! of uninitialized memory.

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicUsize;

/// One element cell of an SPSC ring.
///
/// Access is coordinated by the ring's cursors: the producer only touches
/// slots outside `[reader, writer)`, the consumer only slots inside it.
pub(crate) struct Slot<T> {
    value: UnsafeCell<Option<T>>,
}

impl<T> Slot<T> {
    pub(crate) const fn empty() -> Self {
        Self {
            value: UnsafeCell::new(None),
        }
    }

    /// Stores `value`, returning `false` if the slot was unexpectedly occupied.
    ///
    /// # Safety
    ///
    /// The caller must be the only thread accessing this slot.
    #[inline]
    pub(crate) unsafe fn put(&self, value: T) -> bool {
        let cell = &mut *self.value.get();
        let vacant = cell.is_none();
        *cell = Some(value);
        vacant
    }

    /// Moves the value out, leaving the slot empty.
    ///
    /// # Safety
    ///
    /// The caller must be the only thread accessing this slot.
    #[inline]
    pub(crate) unsafe fn take(&self) -> Option<T> {
        (*self.value.get()).take()
    }

    /// Borrows the value in place.
    ///
    /// # Safety
    ///
    /// No other thread may write this slot while the borrow is alive.
    #[inline]
    pub(crate) unsafe fn peek(&self) -> Option<&T> {
        (*self.value.get()).as_ref()
    }

    /// Exclusive access through `&mut`, no synchronization needed.
    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut Option<T> {
        self.value.get_mut()
    }
}

/// One element cell of the MPMC queue, tagged with a sequence number.
///
/// For the slot at index `i` and a ticket `t` with `t % capacity == i`:
/// - `sequence == t`: empty, the producer holding ticket `t` may write it
/// - `sequence == t + 1`: written, the consumer holding ticket `t` may read it
/// - after the read, `sequence = t + capacity` (free for the next lap)
pub(crate) struct SequencedSlot<T> {
    pub(crate) sequence: AtomicUsize,
    pub(crate) slot: Slot<T>,
}

impl<T> SequencedSlot<T> {
    pub(crate) const fn new(sequence: usize) -> Self {
        Self {
            sequence: AtomicUsize::new(sequence),
            slot: Slot::empty(),
        }
    }
}

/// Allocates `capacity` empty slots as a boxed slice.
pub(crate) fn alloc_slots<T>(capacity: usize) -> Box<[Slot<T>]> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, Slot::empty);
    slots.into_boxed_slice()
}

/// Allocates `capacity` sequenced slots, slot `i` starting at sequence `i`.
pub(crate) fn alloc_sequenced_slots<T>(capacity: usize) -> Box<[SequencedSlot<T>]> {
    (0..capacity).map(SequencedSlot::new).collect()
}
