use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use thiserror::Error;

/// Error returned by `try_push` when the queue is full.
///
/// Carries the rejected value so the caller can retry or drop it.
#[derive(Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is full")]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Returns the value that could not be pushed.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PushError").finish_non_exhaustive()
    }
}

/// Operations shared by every queue in this crate.
///
/// Full and empty are ordinary outcomes reported through `bool`, `Option`
/// and [`PushError`]; none of these methods block.
///
/// For the SPSC engines ([`RingBuffer`](crate::RingBuffer),
/// [`GrowingQueue`](crate::GrowingQueue)) producer methods (`push`,
/// `try_push`) must only ever be called from one thread at a time, and
/// consumer methods (everything else except `len`/`is_empty`) from one
/// thread at a time.
pub trait ConcurrentQueue<T> {
    /// Appends `value`, handing it back if the queue is full.
    fn try_push(&self, value: T) -> Result<(), PushError<T>>;

    /// Appends `value`. Returns `false` (and drops `value`) if the queue is full.
    #[inline]
    fn push(&self, value: T) -> bool {
        self.try_push(value).is_ok()
    }

    /// Removes and returns the front element, or `None` if empty.
    fn try_pop(&self) -> Option<T>;

    /// Removes and drops the front element. Returns `false` if empty.
    #[inline]
    fn pop(&self) -> bool {
        self.try_pop().is_some()
    }

    /// Drains the elements available at the time of the call, in FIFO order.
    ///
    /// Each element is dropped right after `handler` returns. Returns the
    /// number of elements consumed.
    fn consume_all<F>(&self, handler: F) -> usize
    where
        F: FnMut(&T);

    /// Like [`consume_all`](Self::consume_all), but `handler` takes ownership.
    fn consume_all_owned<F>(&self, handler: F) -> usize
    where
        F: FnMut(T);

    /// Number of elements currently queued; an estimate under concurrency.
    fn len(&self) -> usize;

    /// Returns true if no elements are queued.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterator that pops the elements present when it was created.
    #[inline]
    fn drain(&self) -> Drain<'_, T, Self>
    where
        Self: Sized,
    {
        Drain::new(self)
    }
}

/// Pull-based draining view over a queue.
///
/// Yields at most the number of elements that were queued when the iterator
/// was created; stops early if the queue runs dry.
pub struct Drain<'a, T, Q: ?Sized> {
    queue: &'a Q,
    remaining: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, Q> Drain<'a, T, Q>
where
    Q: ConcurrentQueue<T> + ?Sized,
{
    pub(crate) fn new(queue: &'a Q) -> Self {
        Self {
            remaining: queue.len(),
            queue,
            _marker: PhantomData,
        }
    }
}

impl<T, Q> Iterator for Drain<'_, T, Q>
where
    Q: ConcurrentQueue<T> + ?Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        match self.queue.try_pop() {
            Some(value) => {
                self.remaining -= 1;
                Some(value)
            }
            None => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<T, Q> FusedIterator for Drain<'_, T, Q> where Q: ConcurrentQueue<T> + ?Sized {}
