//! Blocking decorator over any [`ConcurrentQueue`].
//!
//! Producers push without ever blocking; a push that leaves the queue at or
//! above the watermark wakes one waiting consumer. Consumers park on a
//! condition variable until the watermark is reached or the queue is shut
//! down, then drain everything present.

use crate::invariants::{debug_assert_watermark_notified, debug_assert_woken_ready};
use crate::shutdown::{ShutdownSignal, ShutdownState};
use crate::{BlockingConfig, BlockingError};
use ringq::{ConcurrentQueue, PushError};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

/// A queue whose consumers can wait for data instead of polling.
///
/// `BlockingQueue` owns the wrapped queue and forwards every non-blocking
/// operation to it, so the wrapped queue's thread-role rules still apply:
/// a wrapped [`RingBuffer`](ringq::RingBuffer) still takes one producer and
/// one consumer.
#[derive(Debug)]
pub struct BlockingQueue<Q> {
    queue: Q,
    config: BlockingConfig,
    state: Arc<ShutdownState>,
}

impl<Q> BlockingQueue<Q> {
    /// Wraps `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockingError::InvalidWatermark`] if `config.watermark` is 0.
    pub fn new(queue: Q, config: BlockingConfig) -> Result<Self, BlockingError> {
        config.validate()?;
        Ok(Self::build(queue, config))
    }

    /// Wraps `queue` with the default configuration (wake on every element).
    pub fn with_default_config(queue: Q) -> Self {
        Self::build(queue, BlockingConfig::default())
    }

    fn build(queue: Q, config: BlockingConfig) -> Self {
        tracing::debug!(
            watermark = config.watermark,
            wait_timeout = ?config.wait_timeout,
            "blocking queue created"
        );
        Self {
            queue,
            config,
            state: Arc::new(ShutdownState::new()),
        }
    }

    /// Returns the wrapped queue.
    #[inline]
    pub fn inner(&self) -> &Q {
        &self.queue
    }

    /// Unwraps the queue. Waiters cannot exist at this point.
    pub fn into_inner(self) -> Q {
        self.queue
    }

    #[inline]
    pub fn config(&self) -> &BlockingConfig {
        &self.config
    }

    /// Returns a handle that can shut the queue down from anywhere.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(Arc::clone(&self.state))
    }

    /// Shuts the queue down and wakes every blocked consumer.
    ///
    /// From then on blocking calls no longer wait. Pushing is still allowed.
    /// Idempotent.
    pub fn notify_readers(&self) {
        self.state.trigger();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.is_shut_down()
    }

    // =========================================================================
    // PRODUCER
    // =========================================================================

    /// Appends `value` and wakes a consumer if the watermark is reached.
    ///
    /// # Errors
    ///
    /// Hands the value back in a [`PushError`] if the wrapped queue is full.
    pub fn try_push<T>(&self, value: T) -> Result<(), PushError<T>>
    where
        Q: ConcurrentQueue<T>,
    {
        self.queue.try_push(value)?;

        let len = self.queue.len();
        let notified = len >= self.config.watermark;
        if notified {
            self.state.notify_one();
        }
        debug_assert_watermark_notified!(len, self.config.watermark, notified);
        Ok(())
    }

    /// Appends `value`. Returns `false` (and drops `value`) if the queue is full.
    #[inline]
    pub fn push<T>(&self, value: T) -> bool
    where
        Q: ConcurrentQueue<T>,
    {
        self.try_push(value).is_ok()
    }

    // =========================================================================
    // CONSUMER
    // =========================================================================

    /// Waits until the queue holds at least `watermark` elements or is shut
    /// down, then drains everything present.
    ///
    /// If [`BlockingConfig::wait_timeout`] is set and elapses first, returns 0
    /// without draining. Returns the number of elements consumed, which is 0
    /// when woken by shutdown on an empty queue.
    pub fn blocking_consume_all<T, F>(&self, handler: F) -> usize
    where
        Q: ConcurrentQueue<T>,
        F: FnMut(&T),
    {
        if self.wait_until_ready::<T>(self.config.wait_timeout) {
            self.queue.consume_all(handler)
        } else {
            0
        }
    }

    /// Like [`blocking_consume_all`](Self::blocking_consume_all) with an
    /// explicit bound on the wait, overriding the configured one.
    pub fn blocking_consume_all_timeout<T, F>(&self, timeout: Duration, handler: F) -> usize
    where
        Q: ConcurrentQueue<T>,
        F: FnMut(&T),
    {
        if self.wait_until_ready::<T>(Some(timeout)) {
            self.queue.consume_all(handler)
        } else {
            0
        }
    }

    /// Like [`blocking_consume_all`](Self::blocking_consume_all), but `handler`
    /// takes ownership of each element.
    pub fn blocking_consume_all_owned<T, F>(&self, handler: F) -> usize
    where
        Q: ConcurrentQueue<T>,
        F: FnMut(T),
    {
        if self.wait_until_ready::<T>(self.config.wait_timeout) {
            self.queue.consume_all_owned(handler)
        } else {
            0
        }
    }

    /// Parks until ready. Returns `false` only if `timeout` elapsed first.
    ///
    /// The readiness check runs under the monitor lock, and producers notify
    /// under the same lock, so a notification cannot slip in between the
    /// check and the wait. The lock is released before the caller drains.
    fn wait_until_ready<T>(&self, timeout: Option<Duration>) -> bool
    where
        Q: ConcurrentQueue<T>,
    {
        let watermark = self.config.watermark;
        let guard = self.state.lock();

        match timeout {
            None => {
                let mut ready = false;
                let guard = self
                    .state
                    .condvar()
                    .wait_while(guard, |shut_down| {
                        ready = *shut_down || self.queue.len() >= watermark;
                        !ready
                    })
                    .unwrap_or_else(PoisonError::into_inner);
                drop(guard);

                debug_assert_woken_ready!(ready);
                true
            }
            Some(timeout) => {
                let (guard, wait) = self
                    .state
                    .condvar()
                    .wait_timeout_while(guard, timeout, |shut_down| {
                        !*shut_down && self.queue.len() < watermark
                    })
                    .unwrap_or_else(PoisonError::into_inner);
                drop(guard);

                if wait.timed_out() {
                    tracing::trace!(?timeout, watermark, "blocking consume timed out");
                    return false;
                }
                true
            }
        }
    }
}

impl<T, Q> ConcurrentQueue<T> for BlockingQueue<Q>
where
    Q: ConcurrentQueue<T>,
{
    #[inline]
    fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        BlockingQueue::try_push(self, value)
    }

    #[inline]
    fn try_pop(&self) -> Option<T> {
        self.queue.try_pop()
    }

    #[inline]
    fn consume_all<F>(&self, handler: F) -> usize
    where
        F: FnMut(&T),
    {
        self.queue.consume_all(handler)
    }

    #[inline]
    fn consume_all_owned<F>(&self, handler: F) -> usize
    where
        F: FnMut(T),
    {
        self.queue.consume_all_owned(handler)
    }

    #[inline]
    fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringq::{BoundedMpmcQueue, GrowingQueue, RingBuffer};
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_rejects_zero_watermark() {
        let config = BlockingConfig::default().with_watermark(0);
        let err = BlockingQueue::new(RingBuffer::<u32>::with_capacity(4), config).unwrap_err();
        assert_eq!(err, BlockingError::InvalidWatermark { watermark: 0 });
    }

    #[test]
    fn test_default_config_matches_new() {
        let wrapped = BlockingQueue::with_default_config(RingBuffer::<u32>::with_capacity(4));
        let built =
            BlockingQueue::new(RingBuffer::<u32>::with_capacity(4), BlockingConfig::default())
                .unwrap();
        assert_eq!(wrapped.config(), built.config());
        assert_eq!(wrapped.config().watermark, 1);
        assert!(!wrapped.is_shutdown());

        // Watermark 1: a single element is enough to drain without waiting
        wrapped.push(5);
        assert_eq!(wrapped.blocking_consume_all(|v: &u32| assert_eq!(*v, 5)), 1);
    }

    #[test]
    fn test_non_blocking_forwarding() {
        let queue = BlockingQueue::with_default_config(RingBuffer::<u32>::with_capacity(4));

        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(queue.push(3));
        assert_eq!(queue.try_push(4).unwrap_err().into_inner(), 4);
        assert_eq!(queue.len(), 3);

        assert_eq!(ConcurrentQueue::try_pop(&queue), Some(1));
        assert_eq!(queue.inner().len(), 2);

        let ring = queue.into_inner();
        assert_eq!(ring.try_pop(), Some(2));
    }

    #[test]
    fn test_ready_queue_drains_without_waiting() {
        let config = BlockingConfig::default().with_watermark(2);
        let queue = BlockingQueue::new(GrowingQueue::<u32>::with_capacity(2), config).unwrap();
        queue.push(10);
        queue.push(20);
        queue.push(30);

        let mut seen = Vec::new();
        assert_eq!(queue.blocking_consume_all(|v: &u32| seen.push(*v)), 3);
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn test_timeout_leaves_elements_queued() {
        let config = BlockingConfig::default().with_watermark(3);
        let queue = BlockingQueue::new(BoundedMpmcQueue::<u32>::with_capacity(8), config).unwrap();
        queue.push(1);

        let consumed = queue.blocking_consume_all_timeout(Duration::from_millis(10), |_| {
            panic!("handler must not run on timeout");
        });
        assert_eq!(consumed, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_configured_timeout_applies() {
        let config = BlockingConfig::default().with_wait_timeout(Duration::from_millis(5));
        let queue = BlockingQueue::new(RingBuffer::<u32>::with_capacity(4), config).unwrap();
        assert_eq!(queue.blocking_consume_all(|_: &u32| {}), 0);
        assert!(!queue.is_shutdown());
    }

    #[test]
    fn test_shutdown_returns_immediately() {
        let queue = BlockingQueue::with_default_config(RingBuffer::<String>::with_capacity(8));
        queue.notify_readers();
        queue.notify_readers();
        assert!(queue.is_shutdown());

        assert_eq!(queue.blocking_consume_all(|_: &String| {}), 0);

        queue.push("late".to_string());
        let mut owned = Vec::new();
        assert_eq!(queue.blocking_consume_all_owned(|s: String| owned.push(s)), 1);
        assert_eq!(owned, vec!["late".to_string()]);
    }

    #[test]
    fn test_push_wakes_waiting_consumer() {
        let queue = Arc::new(BlockingQueue::with_default_config(
            RingBuffer::<u64>::with_capacity(16),
        ));
        let (done_tx, done_rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                queue.blocking_consume_all(|v: &u64| seen.push(*v));
                done_tx.send(seen).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(queue.push(7));

        let seen = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, vec![7]);
        consumer.join().unwrap();
    }
}
