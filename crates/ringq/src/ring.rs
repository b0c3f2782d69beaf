use crate::invariants::{
    debug_assert_len_bounded, debug_assert_occupied, debug_assert_vacant, RoleCheck,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::slot::{alloc_slots, Slot};
use crate::{CapacityError, ConcurrentQueue, Config, PushError};
use crossbeam_utils::CachePadded;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Both cursors are slot indices in `[0, capacity)` that wrap to 0 at the end
// of the array. One slot always stays free: the writer never advances onto
// the reader, so `writer == reader` means empty and `writer + 1 == reader`
// (mod capacity) means full.
//
// **Producer (push):**
// 1. Load `writer` with Relaxed (only the producer writes it)
// 2. Load `reader` with Acquire (pairs with the consumer's Release)
// 3. Store the value into `slots[writer]`
// 4. Store `writer + 1` with Release (publishes the value)
//
// **Consumer (pop / consume_all):**
// 1. Load `reader` with Relaxed (only the consumer writes it)
// 2. Load `writer` with Acquire (pairs with the producer's Release)
// 3. Move values out of `slots[reader..writer]`, leaving the slots empty
// 4. Store the new `reader` with Release (hands the empty slots back)
//
// A moved-out value is dropped after step 4; by then it no longer lives in
// the slot, so the producer may already be reusing that slot.
//
// =============================================================================

/// SPSC ring buffer - the core building block.
///
/// A fixed-capacity single-producer single-consumer queue with wait-free
/// operations. Holds at most `capacity - 1` elements.
///
/// Exactly one thread may act as the producer (`push`, `try_push`) and
/// exactly one as the consumer (`pop`, `try_pop`, `pop_if`, `consume_all`)
/// at any time. Breaking that contract is undefined behavior;
/// debug builds assert on it.
#[repr(C)]
pub struct RingBuffer<T> {
    // === PRODUCER HOT ===
    /// Next slot the producer writes.
    writer: CachePadded<AtomicUsize>,

    // === CONSUMER HOT ===
    /// Next slot the consumer reads.
    reader: CachePadded<AtomicUsize>,

    // === COLD STATE ===
    producer: RoleCheck,
    consumer: RoleCheck,
    metrics: Metrics,
    config: Config,
    /// Leading slots still awaiting migrated content; 0 for plain buffers
    /// and once the reader has been synced.
    reserved: AtomicUsize,

    // === DATA ===
    slots: Box<[Slot<T>]>,
}

// Safety: RingBuffer is Send + Sync as long as T is Send.
// Slots are only touched by the role that currently owns them (see above).
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates a new ring buffer with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity < MIN_CAPACITY`; see [`try_new`](Self::try_new).
    pub fn new(config: Config) -> Self {
        match Self::try_new(config) {
            Ok(ring) => ring,
            Err(err) => panic!("invalid ring buffer config: {err}"),
        }
    }

    /// Creates a new ring buffer, rejecting unusable capacities.
    pub fn try_new(config: Config) -> Result<Self, CapacityError> {
        config.validate()?;
        tracing::debug!(capacity = config.capacity, "ring buffer created");
        Ok(Self::build(config, 0, 0))
    }

    /// Creates a ring buffer with `capacity` slots and default settings.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Config::default().with_capacity(capacity))
    }

    /// Creates a buffer whose first `reserved` slots are left empty for
    /// content migrated in later by [`seed_from`](Self::seed_from); the
    /// producer starts writing at `reserved`.
    pub(crate) fn with_reserved_prefix(config: Config, reserved: usize) -> Self {
        debug_assert!(reserved < config.capacity);
        Self::build(config, reserved, reserved)
    }

    fn build(config: Config, writer: usize, reserved: usize) -> Self {
        Self {
            writer: CachePadded::new(AtomicUsize::new(writer)),
            reader: CachePadded::new(AtomicUsize::new(0)),
            producer: RoleCheck::new(),
            consumer: RoleCheck::new(),
            metrics: Metrics::new(),
            config,
            reserved: AtomicUsize::new(reserved),
            slots: alloc_slots(config.capacity),
        }
    }

    /// Builds a new buffer of `capacity` slots from the live span of `source`.
    ///
    /// The not-yet-consumed elements of `source` (reader up to writer, in
    /// FIFO order, whatever the wrap position) are moved to the front of the
    /// new buffer; the remaining slots start empty. `source` is left empty.
    pub fn from_live_span(source: &mut Self, capacity: usize) -> Result<Self, CapacityError> {
        let config = source.config.with_capacity(capacity);
        config.validate()?;

        let len = source.exclusive_len();
        if len >= capacity {
            return Err(CapacityError::CannotHold { capacity, len });
        }

        let mut target = Self::build(config, len, 0);
        let source_reader = *source.reader.get_mut();
        let source_capacity = source.capacity();
        for (offset, slot) in target.slots[..len].iter_mut().enumerate() {
            let from = (source_reader + offset) % source_capacity;
            let value = source.slots[from].get_mut().take();
            debug_assert_occupied!(value.is_some(), from);
            *slot.get_mut() = value;
        }
        *source.reader.get_mut() = *source.writer.get_mut();

        tracing::debug!(
            from = source_capacity,
            to = capacity,
            moved = len,
            "ring buffer rebuilt from live span"
        );
        Ok(target)
    }

    /// Replaces the storage with `capacity` slots, keeping the live elements.
    pub fn resize(&mut self, capacity: usize) -> Result<(), CapacityError> {
        let resized = Self::from_live_span(self, capacity)?;
        *self = resized;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // CONSTANTS & STATUS
    // ---------------------------------------------------------------------

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the maximum number of elements the buffer holds (`capacity - 1`).
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.capacity() - 1
    }

    /// Returns the current number of elements.
    ///
    /// Computed from the two cursors without locking; under concurrent use
    /// it is a momentary value, always within `[0, capacity - 1]`.
    #[inline]
    pub fn len(&self) -> usize {
        let writer = self.writer.load(Ordering::Acquire);
        let reader = self.reader.load(Ordering::Acquire);
        self.distance(reader, writer)
    }

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.writer.load(Ordering::Acquire) == self.reader.load(Ordering::Acquire)
    }

    /// Returns true if the buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.usable_capacity()
    }

    /// Get a snapshot of metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }

    #[inline]
    fn next_position(&self, position: usize) -> usize {
        let next = position + 1;
        if next == self.capacity() {
            0
        } else {
            next
        }
    }

    /// Number of steps from `from` forward to `to`, modulo capacity.
    #[inline]
    fn distance(&self, from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            to + self.capacity() - from
        }
    }

    fn exclusive_len(&mut self) -> usize {
        let reader = *self.reader.get_mut();
        let writer = *self.writer.get_mut();
        self.distance(reader, writer)
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Appends `value`, handing it back if the buffer is full.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let _role = self.producer.enter("producer");
        self.push_inner(value)
    }

    /// Appends `value`.
    ///
    /// Returns `true` if the item was enqueued, `false` if the buffer is full
    /// (the value is dropped). Never blocks.
    ///
    /// # Example
    /// ```
    /// let ring = ringq::RingBuffer::<u32>::with_capacity(2);
    /// assert!(ring.push(1));
    /// assert!(!ring.push(2)); // one slot always stays free
    /// ```
    #[inline]
    pub fn push(&self, value: T) -> bool {
        let _role = self.producer.enter("producer");
        self.push_inner(value).is_ok()
    }

    fn push_inner(&self, value: T) -> Result<(), PushError<T>> {
        let writer = self.writer.load(Ordering::Relaxed);
        let next = self.next_position(writer);
        let reader = self.reader.load(Ordering::Acquire);

        if next == reader {
            if self.config.enable_metrics {
                self.metrics.add_full_rejections(1);
            }
            return Err(PushError(value));
        }

        debug_assert_len_bounded!(self.distance(reader, next), self.capacity());

        // SAFETY: `slots[writer]` is outside `[reader, writer)`, so the
        // consumer does not access it, and only the producer writes slots.
        let vacant = unsafe { self.slots[writer].put(value) };
        debug_assert_vacant!(vacant, writer);

        self.writer.store(next, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_sent(1);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Removes and returns the front element, or `None` if empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let _role = self.consumer.enter("consumer");
        self.take_front()
    }

    /// Removes and drops the front element. Returns `false` if empty.
    #[inline]
    pub fn pop(&self) -> bool {
        let _role = self.consumer.enter("consumer");
        self.take_front().is_some()
    }

    fn take_front(&self) -> Option<T> {
        let reader = self.reader.load(Ordering::Relaxed);
        let writer = self.writer.load(Ordering::Acquire);
        if reader == writer {
            return None;
        }

        // SAFETY: `slots[reader]` is inside `[reader, writer)`; the Acquire
        // load of `writer` synchronizes with the producer's Release store,
        // and the producer won't touch the slot until `reader` moves past it.
        let value = unsafe { self.slots[reader].take() };
        debug_assert_occupied!(value.is_some(), reader);

        self.reader.store(self.next_position(reader), Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_received(1);
            self.metrics.add_batches_received(1);
        }
        value
    }

    /// Removes the front element only if `predicate` accepts it.
    ///
    /// The predicate sees the element in place. Returns `false` without
    /// touching the buffer when it is empty or the predicate rejects the
    /// element.
    pub fn pop_if<P>(&self, predicate: P) -> bool
    where
        P: FnOnce(&T) -> bool,
    {
        let _role = self.consumer.enter("consumer");

        let reader = self.reader.load(Ordering::Relaxed);
        let writer = self.writer.load(Ordering::Acquire);
        if reader == writer {
            return false;
        }

        // SAFETY: same reasoning as `take_front`; the shared borrow ends
        // before the slot is emptied below.
        let accepted = match unsafe { self.slots[reader].peek() } {
            Some(front) => predicate(front),
            None => {
                debug_assert_occupied!(false, reader);
                return false;
            }
        };
        if !accepted {
            return false;
        }

        // SAFETY: as above.
        let value = unsafe { self.slots[reader].take() };
        self.reader.store(self.next_position(reader), Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_received(1);
            self.metrics.add_batches_received(1);
        }
        drop(value);
        true
    }

    /// Process all elements available at entry with a single reader update.
    ///
    /// The writer cursor is read once, so elements the producer appends
    /// meanwhile are left for the next call. Each element is dropped right
    /// after `handler` returns. Returns the number of elements consumed.
    ///
    /// If `handler` panics, the elements consumed so far (including the one
    /// being handled) are still released.
    pub fn consume_all<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(&T),
    {
        let _role = self.consumer.enter("consumer");
        self.consume_inner(|value| handler(&value))
    }

    /// Like [`consume_all`](Self::consume_all), transferring ownership.
    ///
    /// # Example
    ///
    /// ```
    /// let ring = ringq::RingBuffer::<String>::with_capacity(8);
    /// ring.push("a".to_string());
    /// ring.push("b".to_string());
    ///
    /// let mut batch = Vec::new();
    /// ring.consume_all_owned(|item| batch.push(item));
    /// assert_eq!(batch, ["a", "b"]);
    /// ```
    pub fn consume_all_owned<F>(&self, handler: F) -> usize
    where
        F: FnMut(T),
    {
        let _role = self.consumer.enter("consumer");
        self.consume_inner(handler)
    }

    fn consume_inner<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let reader = self.reader.load(Ordering::Relaxed);
        let writer = self.writer.load(Ordering::Acquire);
        let available = self.distance(reader, writer);
        if available == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let end = reader + available;
        let mut advance = ReaderAdvance {
            ring: self,
            position: reader,
            consumed: 0,
        };

        // A span crossing the end of the array is drained as
        // `[reader, capacity)` followed by `[0, remainder)`.
        if end > capacity {
            advance.consume_range(reader..capacity, &mut handler);
            advance.consume_range(0..end - capacity, &mut handler);
        } else {
            advance.consume_range(reader..end, &mut handler);
        }

        advance.consumed
    }

    /// Moves this buffer's reader past the elements `other` already consumed.
    ///
    /// Used during growth handoff: this buffer reserved `other.capacity() - 1`
    /// leading slots for `other`'s content, and only the `other.len()`
    /// elements still unread belong in front of the reader.
    ///
    /// Returns `false` and leaves the reader alone unless this buffer was
    /// built by `with_reserved_prefix` with exactly `other.usable_capacity()`
    /// reserved slots and has not been synced or read from yet. Must be
    /// called with the consumer role held.
    pub(crate) fn sync_reader(&self, other: &Self) -> bool {
        let reserved = self.reserved.load(Ordering::Relaxed);
        if reserved == 0
            || reserved != other.usable_capacity()
            || self.reader.load(Ordering::Relaxed) != 0
        {
            return false;
        }

        let position = reserved - other.len();
        debug_assert!(position < self.capacity());
        self.reader.store(position, Ordering::Release);
        self.reserved.store(0, Ordering::Relaxed);
        true
    }

    /// Takes over the live span of a retired buffer.
    ///
    /// `self` must have been created by `with_reserved_prefix(_,
    /// source.usable_capacity())` and not read from yet. The reader is synced
    /// to the first slot of the span, then the remaining elements of `source`
    /// are moved into the tail of the reserved prefix, so they end exactly
    /// where the producer started writing. Runs on the consumer thread while
    /// the producer may keep pushing into `self`.
    ///
    /// Returns the number of elements moved, or `None` (moving nothing) if
    /// `self` does not hold an unsynced prefix sized for `source`.
    pub(crate) fn seed_from(&self, source: &mut Self) -> Option<usize> {
        let _role = self.consumer.enter("consumer");

        let reserved = source.usable_capacity();
        let span = source.exclusive_len();
        if !self.sync_reader(source) {
            return None;
        }

        let start = reserved - span;
        let source_reader = *source.reader.get_mut();
        let source_capacity = source.capacity();
        for offset in 0..span {
            let from = (source_reader + offset) % source_capacity;
            let value = source.slots[from].get_mut().take();
            debug_assert_occupied!(value.is_some(), from);
            if let Some(value) = value {
                // SAFETY: `[start, reserved)` lies in the reserved prefix and
                // inside `[reader, writer)` after the sync above, so the
                // producer never touches it; only this thread reads it.
                let vacant = unsafe { self.slots[start + offset].put(value) };
                debug_assert_vacant!(vacant, start + offset);
            }
        }
        *source.reader.get_mut() = *source.writer.get_mut();
        Some(span)
    }
}

/// Releases consumed slots to the producer when dropped, so a panicking
/// handler never leaves emptied slots inside `[reader, writer)`.
struct ReaderAdvance<'a, T> {
    ring: &'a RingBuffer<T>,
    position: usize,
    consumed: usize,
}

impl<T> ReaderAdvance<'_, T> {
    fn consume_range<F>(&mut self, range: Range<usize>, handler: &mut F)
    where
        F: FnMut(T),
    {
        for index in range {
            // SAFETY: every index handed in lies inside the snapshot
            // `[reader, writer)`; see `RingBuffer::take_front`.
            let value = unsafe { self.ring.slots[index].take() };
            debug_assert_occupied!(value.is_some(), index);
            self.position = self.ring.next_position(index);
            self.consumed += 1;
            if let Some(value) = value {
                handler(value);
            }
        }
    }
}

impl<T> Drop for ReaderAdvance<'_, T> {
    fn drop(&mut self) {
        if self.consumed == 0 {
            return;
        }
        // Single atomic update for the entire batch
        self.ring.reader.store(self.position, Ordering::Release);

        if self.ring.config.enable_metrics {
            self.ring.metrics.add_messages_received(self.consumed as u64);
            self.ring.metrics.add_batches_received(1);
        }
    }
}

impl<T> ConcurrentQueue<T> for RingBuffer<T> {
    #[inline]
    fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        RingBuffer::try_push(self, value)
    }

    #[inline]
    fn push(&self, value: T) -> bool {
        RingBuffer::push(self, value)
    }

    #[inline]
    fn try_pop(&self) -> Option<T> {
        RingBuffer::try_pop(self)
    }

    #[inline]
    fn pop(&self) -> bool {
        RingBuffer::pop(self)
    }

    fn consume_all<F>(&self, handler: F) -> usize
    where
        F: FnMut(&T),
    {
        RingBuffer::consume_all(self, handler)
    }

    fn consume_all_owned<F>(&self, handler: F) -> usize
    where
        F: FnMut(T),
    {
        RingBuffer::consume_all_owned(self, handler)
    }

    #[inline]
    fn len(&self) -> usize {
        RingBuffer::len(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        RingBuffer::is_empty(self)
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn collect(ring: &RingBuffer<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        ring.consume_all(|item| out.push(*item));
        out
    }

    #[test]
    fn test_ring_capacity_four_walkthrough() {
        let ring = RingBuffer::<u32>::with_capacity(4);

        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        // Usable capacity is 3
        assert!(!ring.push(4));
        assert!(ring.is_full());

        assert_eq!(ring.try_pop(), Some(1));
        assert!(ring.push(4));

        assert_eq!(collect(&ring), vec![2, 3, 4]);
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_wrap_around_pattern() {
        let ring = RingBuffer::<u32>::with_capacity(4);
        let mut next = 0;

        for round in 0..10 {
            for _ in 0..3 {
                assert!(ring.push(next), "push failed in round {}", round);
                next += 1;
            }
            assert_eq!(ring.len(), 3);
            if round % 2 == 0 {
                for offset in (1..=3).rev() {
                    assert_eq!(ring.try_pop(), Some(next - offset));
                }
            } else {
                assert_eq!(collect(&ring), vec![next - 3, next - 2, next - 1]);
            }
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn test_consume_all_stitches_wrapped_span() {
        let ring = RingBuffer::<u32>::with_capacity(5);

        for i in 0..4 {
            assert!(ring.push(i));
        }
        for _ in 0..3 {
            assert!(ring.pop());
        }
        // reader = 3, live span [3, 5) + [0, 2)
        for i in 4..7 {
            assert!(ring.push(i));
        }

        assert_eq!(collect(&ring), vec![3, 4, 5, 6]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_pop_if() {
        let ring = RingBuffer::<u32>::with_capacity(8);
        assert!(!ring.pop_if(|_| true));

        ring.push(10);
        ring.push(11);

        assert!(!ring.pop_if(|v| *v == 11));
        assert_eq!(ring.len(), 2);

        assert!(ring.pop_if(|v| *v == 10));
        assert_eq!(ring.try_pop(), Some(11));
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn test_pop_on_empty() {
        let ring = RingBuffer::<u32>::with_capacity(2);
        assert!(!ring.pop());
        assert!(ring.try_pop().is_none());
        assert_eq!(ring.consume_all(|_| {}), 0);
    }

    #[test]
    fn test_try_new_rejects_tiny_capacity() {
        let err = RingBuffer::<u32>::try_new(Config::new(1, false)).unwrap_err();
        assert_eq!(err, CapacityError::TooSmall { capacity: 1, min: 2 });
    }

    #[test]
    #[should_panic(expected = "invalid ring buffer config")]
    fn test_new_panics_on_tiny_capacity() {
        let _ = RingBuffer::<u32>::new(Config::new(0, false));
    }

    #[test]
    fn test_from_live_span_with_wrapped_reader() {
        let mut source = RingBuffer::<u32>::with_capacity(4);
        for i in 0..3 {
            source.push(i);
        }
        source.pop();
        source.pop();
        source.push(3);
        source.push(4);
        // reader = 2, writer = 1: live span [2, 3, 4] wraps

        let target = RingBuffer::from_live_span(&mut source, 8).unwrap();
        assert!(source.is_empty());
        assert_eq!(target.capacity(), 8);
        assert_eq!(target.len(), 3);

        for i in 5..9 {
            assert!(target.push(i));
        }
        assert_eq!(collect(&target), vec![2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_from_live_span_rejects_small_target() {
        let mut source = RingBuffer::<u32>::with_capacity(8);
        for i in 0..5 {
            source.push(i);
        }
        let err = RingBuffer::from_live_span(&mut source, 5).unwrap_err();
        assert_eq!(err, CapacityError::CannotHold { capacity: 5, len: 5 });
        // Nothing moved on failure
        assert_eq!(collect(&source), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_resize_keeps_order() {
        let mut ring = RingBuffer::<u32>::with_capacity(3);
        ring.push(1);
        ring.push(2);
        assert!(!ring.push(3));

        ring.resize(16).unwrap();
        assert_eq!(ring.capacity(), 16);
        assert!(ring.push(3));
        assert_eq!(collect(&ring), vec![1, 2, 3]);
    }

    #[test]
    fn test_sync_reader_skips_consumed_prefix() {
        let old = RingBuffer::<u32>::with_capacity(4);
        for i in 0..3 {
            old.push(i);
        }
        old.pop();

        let grown = RingBuffer::<u32>::with_reserved_prefix(Config::default().with_capacity(8), 3);
        assert!(grown.sync_reader(&old));
        // 3 reserved slots, 2 still unread in `old`: reader starts at 1
        assert_eq!(grown.reader.load(Ordering::Relaxed), 1);
        assert_eq!(grown.len(), 2);

        // A synced prefix cannot be synced again
        assert!(!grown.sync_reader(&old));
        assert_eq!(grown.reader.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_sync_reader_rejects_plain_buffer() {
        let ring = RingBuffer::<u32>::with_capacity(4);
        assert!(ring.push(1));
        assert!(ring.push(2));

        let empty = RingBuffer::<u32>::with_capacity(4);
        assert!(!ring.sync_reader(&empty));

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.try_pop(), Some(1));
        assert_eq!(ring.try_pop(), Some(2));
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn test_sync_reader_rejects_mismatched_prefix() {
        let old = RingBuffer::<u32>::with_capacity(8);
        old.push(1);

        // Prefix sized for a 4-slot predecessor, not an 8-slot one
        let grown = RingBuffer::<u32>::with_reserved_prefix(Config::default().with_capacity(16), 3);
        assert!(!grown.sync_reader(&old));
        assert_eq!(grown.reader.load(Ordering::Relaxed), 0);

        // Nothing is moved out of a source the prefix was not sized for
        let mut old = old;
        assert!(grown.seed_from(&mut old).is_none());
        assert_eq!(old.try_pop(), Some(1));
    }

    #[test]
    fn test_seed_from_places_span_before_new_writes() {
        let mut old = RingBuffer::<u32>::with_capacity(4);
        for i in 0..3 {
            old.push(i);
        }
        assert_eq!(old.try_pop(), Some(0));

        let grown = RingBuffer::<u32>::with_reserved_prefix(Config::default().with_capacity(8), 3);
        assert!(grown.push(3));
        assert!(grown.push(4));

        assert_eq!(grown.seed_from(&mut old), Some(2));
        assert!(old.is_empty());
        assert_eq!(collect(&grown), vec![1, 2, 3, 4]);

        // Freed prefix slots are reusable after wrap-around
        for i in 5..12 {
            assert!(grown.push(i));
        }
        assert!(!grown.push(12));
        assert_eq!(collect(&grown), (5..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_consume_all_drops_items() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropTracker {
            _id: u64,
        }

        impl Drop for DropTracker {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);
        let ring = RingBuffer::<DropTracker>::with_capacity(16);

        for i in 0..5 {
            assert!(ring.push(DropTracker { _id: i }));
        }
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 0);

        // Rejected by pop_if: stays alive
        assert!(!ring.pop_if(|_| false));
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 0);

        let consumed = ring.consume_all(|_item| {
            // Item is still alive here
        });
        assert_eq!(consumed, 5);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 5);

        for i in 0..3 {
            assert!(ring.push(DropTracker { _id: i }));
        }
        drop(ring);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_consume_all_panicking_handler_releases_consumed() {
        let ring = RingBuffer::<u32>::with_capacity(8);
        for i in 0..5 {
            ring.push(i);
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ring.consume_all(|item| {
                if *item == 1 {
                    panic!("handler failure");
                }
            });
        }));
        assert!(result.is_err());

        // 0 and 1 were consumed; the rest is intact
        assert_eq!(ring.len(), 3);
        assert_eq!(collect(&ring), vec![2, 3, 4]);
    }

    #[test]
    fn test_metrics_enabled() {
        let ring = RingBuffer::<u32>::new(Config::new(4, true));
        for i in 0..4 {
            ring.push(i);
        }
        ring.pop();
        ring.consume_all(|_| {});

        let m = ring.metrics();
        assert_eq!(m.messages_sent, 3);
        assert_eq!(m.full_rejections, 1);
        assert_eq!(m.messages_received, 3);
        assert_eq!(m.batches_received, 2);
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let ring = RingBuffer::<u32>::with_capacity(4);
        ring.push(1);
        assert_eq!(ring.metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn test_spsc_threads_fifo() {
        const N: u32 = 100_000;
        let ring = Arc::new(RingBuffer::<u32>::with_capacity(64));

        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for i in 0..N {
                    while !ring.push(i) {
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut expected = 0;
        while expected < N {
            ring.consume_all(|item| {
                assert_eq!(*item, expected);
                expected += 1;
            });
        }
        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}
