use crate::invariants::{debug_assert_len_bounded, debug_assert_occupied, debug_assert_vacant};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::slot::{alloc_sequenced_slots, SequencedSlot};
use crate::{CapacityError, ConcurrentQueue, Config, PushError};
use crossbeam_utils::CachePadded;
use std::fmt;
use std::hint;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// TICKETS & SLOT SEQUENCES
// =============================================================================
//
// `tail` and `head` are ever-increasing tickets; ticket `t` maps to slot
// `t % capacity`. Winning the CAS on a ticket only reserves the slot. Whether
// the slot may be touched is decided by its sequence number:
//
// - `seq == t`      the slot is free for the producer holding ticket `t`
// - `seq == t + 1`  the value of ticket `t` is written and may be taken
// - `seq == t + capacity` after the take; free for ticket `t + capacity`
//
// The producer writes the value *then* stores `seq = t + 1` (Release), so a
// consumer can never take a slot whose ticket was reserved but whose value
// is still being written. Ticket CASes are Relaxed; the sequence numbers
// carry all the synchronization for slot contents.
//
// =============================================================================

/// Bounded lock-free multi-producer multi-consumer queue.
///
/// Holds at most `capacity - 1` elements. Any number of threads may push and
/// pop concurrently. Full and empty are reported immediately; contended
/// operations retry their CAS with a spin hint.
///
/// # Example
///
/// ```
/// use ringq::BoundedMpmcQueue;
/// use std::sync::Arc;
///
/// let queue = Arc::new(BoundedMpmcQueue::with_capacity(128));
/// let producers: Vec<_> = (0..4)
///     .map(|p| {
///         let queue = Arc::clone(&queue);
///         std::thread::spawn(move || {
///             for i in 0..10u64 {
///                 while !queue.push(p * 100 + i) {
///                     std::hint::spin_loop();
///                 }
///             }
///         })
///     })
///     .collect();
/// for handle in producers {
///     handle.join().unwrap();
/// }
/// assert_eq!(queue.len(), 40);
/// ```
pub struct BoundedMpmcQueue<T> {
    /// Next ticket handed to a producer.
    tail: CachePadded<AtomicUsize>,
    /// Next ticket handed to a consumer.
    head: CachePadded<AtomicUsize>,
    metrics: Metrics,
    config: Config,
    slots: Box<[SequencedSlot<T>]>,
}

// Safety: a slot's value is only accessed by the single thread whose ticket
// currently owns it, as established by the sequence protocol above.
unsafe impl<T: Send> Send for BoundedMpmcQueue<T> {}
unsafe impl<T: Send> Sync for BoundedMpmcQueue<T> {}

/// Signed distance of a slot's sequence from the expected one.
#[inline]
#[allow(clippy::cast_possible_wrap)]
fn sequence_lag(sequence: usize, expected: usize) -> isize {
    sequence.wrapping_sub(expected) as isize
}

impl<T> BoundedMpmcQueue<T> {
    /// Creates a queue with `config.capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity < MIN_CAPACITY`.
    pub fn new(config: Config) -> Self {
        match Self::try_new(config) {
            Ok(queue) => queue,
            Err(err) => panic!("invalid mpmc queue config: {err}"),
        }
    }

    pub fn try_new(config: Config) -> Result<Self, CapacityError> {
        config.validate()?;
        tracing::debug!(capacity = config.capacity, "mpmc queue created");
        Ok(Self {
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
            metrics: Metrics::new(),
            config,
            slots: alloc_sequenced_slots(config.capacity),
        })
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Config::default().with_capacity(capacity))
    }

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Best-effort element count, clamped to `[0, capacity - 1]`.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity() - 1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity() - 1
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
    fn slot(&self, ticket: usize) -> &SequencedSlot<T> {
        &self.slots[ticket % self.capacity()]
    }

    #[cold]
    fn reject(&self, value: T) -> Result<(), PushError<T>> {
        if self.config.enable_metrics {
            self.metrics.add_full_rejections(1);
        }
        Err(PushError(value))
    }

    #[inline]
    fn contended(&self) {
        if self.config.enable_metrics {
            self.metrics.add_cas_retries(1);
        }
        hint::spin_loop();
    }

    /// Appends `value`, handing it back if the queue is full.
    ///
    /// A slot whose previous-lap element is still being taken out by a
    /// consumer is also reported as full, even when `len() < capacity - 1`.
    /// The condition clears as soon as that consumer finishes.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let usable = self.capacity() - 1;
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            let head = self.head.load(Ordering::Acquire);
            let occupied = tail.wrapping_sub(head);
            if occupied == usable {
                return self.reject(value);
            }
            if occupied > usable {
                // Consumers moved past our stale tail snapshot.
                tail = self.tail.load(Ordering::Relaxed);
                continue;
            }

            let slot = self.slot(tail);
            let lag = sequence_lag(slot.sequence.load(Ordering::Acquire), tail);

            if lag == 0 {
                match self.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        debug_assert_len_bounded!(occupied + 1, self.capacity());
                        // SAFETY: the CAS made us the only holder of ticket
                        // `tail`, and `seq == tail` means its slot is empty.
                        let vacant = unsafe { slot.slot.put(value) };
                        debug_assert_vacant!(vacant, tail % self.capacity());
                        slot.sequence.store(tail.wrapping_add(1), Ordering::Release);

                        if self.config.enable_metrics {
                            self.metrics.add_messages_sent(1);
                        }
                        return Ok(());
                    }
                    Err(current) => {
                        tail = current;
                        self.contended();
                    }
                }
            } else if lag < 0 {
                // The previous lap's value is still being taken out.
                return self.reject(value);
            } else {
                // Another producer already filled this ticket.
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Appends `value`. Returns `false` (dropping `value`) if the queue is full
    /// or the next slot is still being emptied; see [`try_push`](Self::try_push).
    #[inline]
    pub fn push(&self, value: T) -> bool {
        self.try_push(value).is_ok()
    }

    /// Removes and returns the front element, or `None` if no element is ready.
    pub fn try_pop(&self) -> Option<T> {
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            let slot = self.slot(head);
            let lag = sequence_lag(slot.sequence.load(Ordering::Acquire), head.wrapping_add(1));

            if lag == 0 {
                match self.head.compare_exchange_weak(
                    head,
                    head.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS made us the only holder of ticket
                        // `head`, and `seq == head + 1` means its value is
                        // fully written.
                        let value = unsafe { slot.slot.take() };
                        debug_assert_occupied!(value.is_some(), head % self.capacity());
                        slot.sequence
                            .store(head.wrapping_add(self.capacity()), Ordering::Release);

                        if self.config.enable_metrics {
                            self.metrics.add_messages_received(1);
                            self.metrics.add_batches_received(1);
                        }
                        return value;
                    }
                    Err(current) => {
                        head = current;
                        self.contended();
                    }
                }
            } else if lag < 0 {
                // Empty, or the producer of this ticket has not finished.
                return None;
            } else {
                head = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Removes and drops the front element. Returns `false` if empty.
    #[inline]
    pub fn pop(&self) -> bool {
        self.try_pop().is_some()
    }

    /// Pops up to the number of elements queued at entry, in ticket order.
    ///
    /// Other consumers may take some of them concurrently; the call returns
    /// early once nothing is ready.
    pub fn consume_all<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(&T),
    {
        self.consume_all_owned(|value| handler(&value))
    }

    /// Like [`consume_all`](Self::consume_all), transferring ownership.
    pub fn consume_all_owned<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let snapshot = self.len();
        let mut consumed = 0;
        while consumed < snapshot {
            let Some(value) = self.try_pop() else {
                break;
            };
            consumed += 1;
            handler(value);
        }
        consumed
    }
}

impl<T> ConcurrentQueue<T> for BoundedMpmcQueue<T> {
    #[inline]
    fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        BoundedMpmcQueue::try_push(self, value)
    }

    #[inline]
    fn try_pop(&self) -> Option<T> {
        BoundedMpmcQueue::try_pop(self)
    }

    fn consume_all<F>(&self, handler: F) -> usize
    where
        F: FnMut(&T),
    {
        BoundedMpmcQueue::consume_all(self, handler)
    }

    fn consume_all_owned<F>(&self, handler: F) -> usize
    where
        F: FnMut(T),
    {
        BoundedMpmcQueue::consume_all_owned(self, handler)
    }

    #[inline]
    fn len(&self) -> usize {
        BoundedMpmcQueue::len(self)
    }
}

impl<T> fmt::Debug for BoundedMpmcQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMpmcQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
