//! Unbounded SPSC queue built from a chain of ring buffers.
//!
//! The producer always writes into the tail segment. When it is full, the
//! producer allocates a segment of twice the size, links it as `next` of the
//! full one and keeps writing there; the first `old_capacity - 1` slots of the
//! new segment stay empty, reserved for the old segment's leftovers.
//!
//! The consumer, before each operation, walks forward: for every segment
//! with a published `next` it takes the segment over, moves the elements it
//! has not consumed yet into the tail of the successor's reserved prefix
//! (see `RingBuffer::seed_from`), frees it and continues with the successor.
//! Neither side ever waits for the other; the only hand-off is the `next`
//! pointer.

use crate::invariants::{debug_assert_reserved_prefix, RoleCheck};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::{CapacityError, ConcurrentQueue, Config, PushError, RingBuffer};
use crossbeam_utils::CachePadded;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

struct Segment<T> {
    ring: RingBuffer<T>,
    /// Successor, published once by the producer when `ring` is full.
    next: AtomicPtr<Segment<T>>,
}

impl<T> Segment<T> {
    fn boxed(ring: RingBuffer<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            ring,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Unbounded single-producer single-consumer queue.
///
/// `push` never fails: a full segment is replaced by one twice as large
/// without stopping either thread. Elements come out in push order across
/// any number of growths.
///
/// # Example
///
/// ```
/// use ringq::GrowingQueue;
///
/// let queue = GrowingQueue::with_capacity(4);
/// for i in 0..100 {
///     assert!(queue.push(i));
/// }
/// assert!(queue.capacity() >= 100);
///
/// let mut next = 0;
/// queue.consume_all(|item| {
///     assert_eq!(*item, next);
///     next += 1;
/// });
/// assert_eq!(next, 100);
/// ```
pub struct GrowingQueue<T> {
    // === PRODUCER HOT ===
    write_segment: CachePadded<AtomicPtr<Segment<T>>>,
    pushed: CachePadded<AtomicUsize>,

    // === CONSUMER HOT ===
    read_segment: CachePadded<AtomicPtr<Segment<T>>>,
    popped: CachePadded<AtomicUsize>,

    // === COLD STATE ===
    /// Usable capacity of the tail segment.
    capacity: AtomicUsize,
    producer: RoleCheck,
    consumer: RoleCheck,
    metrics: Metrics,
    config: Config,
    _owns: PhantomData<Box<Segment<T>>>,
}

// Safety: segments are only dereferenced by the producer (tail) and the
// consumer (head); ownership of a segment moves to the consumer through the
// Release/Acquire pair on `next`.
unsafe impl<T: Send> Send for GrowingQueue<T> {}
unsafe impl<T: Send> Sync for GrowingQueue<T> {}

impl<T> GrowingQueue<T> {
    /// Creates a queue whose first segment has `config.capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity < MIN_CAPACITY`.
    pub fn new(config: Config) -> Self {
        match Self::try_new(config) {
            Ok(queue) => queue,
            Err(err) => panic!("invalid growing queue config: {err}"),
        }
    }

    /// Creates a queue, rejecting unusable initial capacities.
    pub fn try_new(config: Config) -> Result<Self, CapacityError> {
        config.validate()?;
        let first = Segment::boxed(RingBuffer::with_reserved_prefix(
            Config::new(config.capacity, false),
            0,
        ));
        tracing::debug!(capacity = config.capacity, "growing queue created");
        Ok(Self {
            write_segment: CachePadded::new(AtomicPtr::new(first)),
            pushed: CachePadded::new(AtomicUsize::new(0)),
            read_segment: CachePadded::new(AtomicPtr::new(first)),
            popped: CachePadded::new(AtomicUsize::new(0)),
            capacity: AtomicUsize::new(config.usable_capacity()),
            producer: RoleCheck::new(),
            consumer: RoleCheck::new(),
            metrics: Metrics::new(),
            config,
            _owns: PhantomData,
        })
    }

    /// Creates a queue whose first segment has `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Config::default().with_capacity(capacity))
    }

    /// Usable capacity of the newest segment.
    ///
    /// Once the consumer has caught up with all growths this is the total
    /// capacity reachable without growing again.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Number of queued elements, estimated from push/pop counters.
    #[inline]
    pub fn len(&self) -> usize {
        let popped = self.popped.load(Ordering::Acquire);
        let pushed = self.pushed.load(Ordering::Acquire);
        pushed.saturating_sub(popped)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a snapshot of metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Appends `value`, growing if needed. Always returns `Ok`.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let _role = self.producer.enter("producer");
        let mut value = value;
        loop {
            let tail = self.write_segment.load(Ordering::Relaxed);
            // SAFETY: `tail` is the write segment; the consumer frees a
            // segment only after its `next` is published, which `grow`
            // does after the last use of `tail`.
            let result = unsafe { (*tail).ring.try_push(value) };
            match result {
                Ok(()) => {
                    self.pushed.fetch_add(1, Ordering::Release);
                    if self.config.enable_metrics {
                        self.metrics.add_messages_sent(1);
                    }
                    return Ok(());
                }
                Err(PushError(rejected)) => {
                    value = rejected;
                    self.grow(tail);
                }
            }
        }
    }

    /// Appends `value`, growing if needed. Always returns `true`.
    #[inline]
    pub fn push(&self, value: T) -> bool {
        self.try_push(value).is_ok()
    }

    #[cold]
    fn grow(&self, full: *mut Segment<T>) {
        // SAFETY: see `try_push`; `full` is still the write segment.
        let old_capacity = unsafe { (*full).ring.capacity() };
        let Some(new_capacity) = old_capacity.checked_mul(2) else {
            tracing::error!(capacity = old_capacity, "growing queue capacity overflow");
            panic!("growing queue cannot grow past {old_capacity} slots");
        };

        let successor = Segment::boxed(RingBuffer::with_reserved_prefix(
            Config::new(new_capacity, false),
            old_capacity - 1,
        ));

        // Hand-off. This is the producer's last access to `full`; from here
        // on the consumer owns it.
        // SAFETY: as above.
        unsafe { (*full).next.store(successor, Ordering::Release) };

        self.write_segment.store(successor, Ordering::Relaxed);
        self.capacity.store(new_capacity - 1, Ordering::Relaxed);

        if self.config.enable_metrics {
            self.metrics.add_growths(1);
        }
        tracing::debug!(from = old_capacity, to = new_capacity, "growing queue segment added");
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Advances the read segment past every retired segment and returns it.
    ///
    /// Must be called with the consumer role held.
    fn sync_read_segment(&self) -> &Segment<T> {
        let mut current = self.read_segment.load(Ordering::Relaxed);
        loop {
            // SAFETY: the read segment stays allocated until the consumer
            // (this thread) retires it below.
            let next = unsafe { (*current).next.load(Ordering::Acquire) };
            if next.is_null() {
                break;
            }

            // SAFETY: `next` is published, so the producer no longer touches
            // `current`, and nothing else references it.
            let mut retired = unsafe { Box::from_raw(current) };
            // SAFETY: `next` stays allocated at least until it is retired by
            // a later iteration of this loop.
            let successor = unsafe { &*next };
            let seeded = successor.ring.seed_from(&mut retired.ring);
            debug_assert_reserved_prefix!(seeded.is_some(), retired.ring.usable_capacity());
            let moved = seeded.unwrap_or(0);
            tracing::trace!(
                moved,
                retired = retired.ring.capacity(),
                successor = successor.ring.capacity(),
                "growing queue segment retired"
            );
            drop(retired);

            current = next;
            self.read_segment.store(current, Ordering::Relaxed);
        }
        // SAFETY: as above.
        unsafe { &*current }
    }

    fn record_consumed(&self, n: usize) {
        self.popped.fetch_add(n, Ordering::Release);
        if self.config.enable_metrics {
            self.metrics.add_messages_received(n as u64);
            self.metrics.add_batches_received(1);
        }
    }

    /// Removes and returns the front element, or `None` if empty.
    pub fn try_pop(&self) -> Option<T> {
        let _role = self.consumer.enter("consumer");
        let value = self.sync_read_segment().ring.try_pop();
        if value.is_some() {
            self.record_consumed(1);
        }
        value
    }

    /// Removes and drops the front element. Returns `false` if empty.
    #[inline]
    pub fn pop(&self) -> bool {
        self.try_pop().is_some()
    }

    /// Removes the front element only if `predicate` accepts it.
    pub fn pop_if<P>(&self, predicate: P) -> bool
    where
        P: FnOnce(&T) -> bool,
    {
        let _role = self.consumer.enter("consumer");
        let popped = self.sync_read_segment().ring.pop_if(predicate);
        if popped {
            self.record_consumed(1);
        }
        popped
    }

    /// Drains the elements available at entry, in FIFO order.
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
        let _role = self.consumer.enter("consumer");
        let tally = ConsumedTally {
            queue: self,
            count: Cell::new(0),
        };
        self.sync_read_segment().ring.consume_all_owned(|value| {
            tally.count.set(tally.count.get() + 1);
            handler(value);
        });
        tally.count.get()
    }
}

/// Publishes the number of consumed elements, also when a handler panics.
struct ConsumedTally<'a, T> {
    queue: &'a GrowingQueue<T>,
    count: Cell<usize>,
}

impl<T> Drop for ConsumedTally<'_, T> {
    fn drop(&mut self) {
        let count = self.count.get();
        if count > 0 {
            self.queue.record_consumed(count);
        }
    }
}

impl<T> Default for GrowingQueue<T> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<T> Drop for GrowingQueue<T> {
    fn drop(&mut self) {
        let mut current = *self.read_segment.get_mut();
        while !current.is_null() {
            // SAFETY: every segment from the read segment onwards is owned by
            // the chain exactly once, and `&mut self` rules out other users.
            let mut segment = unsafe { Box::from_raw(current) };
            current = *segment.next.get_mut();
        }
    }
}

impl<T> ConcurrentQueue<T> for GrowingQueue<T> {
    #[inline]
    fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        GrowingQueue::try_push(self, value)
    }

    #[inline]
    fn try_pop(&self) -> Option<T> {
        GrowingQueue::try_pop(self)
    }

    fn consume_all<F>(&self, handler: F) -> usize
    where
        F: FnMut(&T),
    {
        GrowingQueue::consume_all(self, handler)
    }

    fn consume_all_owned<F>(&self, handler: F) -> usize
    where
        F: FnMut(T),
    {
        GrowingQueue::consume_all_owned(self, handler)
    }

    #[inline]
    fn len(&self) -> usize {
        GrowingQueue::len(self)
    }
}

impl<T> fmt::Debug for GrowingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowingQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
