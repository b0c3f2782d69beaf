//! Integration tests for ringq-blocking.

use ringq::{BoundedMpmcQueue, GrowingQueue, RingBuffer};
use ringq_blocking::{BlockingConfig, BlockingError, BlockingQueue, ConcurrentQueue};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Long enough that a consumer which should be blocked has had every
/// chance to run.
const STILL_BLOCKED: Duration = Duration::from_millis(100);
/// Upper bound for a wake-up that should happen.
const WAKE_DEADLINE: Duration = Duration::from_secs(5);

fn spawn_consumer<Q>(
    queue: &Arc<BlockingQueue<Q>>,
) -> (thread::JoinHandle<()>, mpsc::Receiver<Vec<u64>>)
where
    Q: ConcurrentQueue<u64> + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel();
    let queue = Arc::clone(queue);
    let handle = thread::spawn(move || {
        let mut batch = Vec::new();
        queue.blocking_consume_all(|v: &u64| batch.push(*v));
        tx.send(batch).unwrap();
    });
    (handle, rx)
}

#[test]
fn test_consumer_wakes_at_watermark() {
    let config = BlockingConfig::default().with_watermark(3);
    let queue = Arc::new(BlockingQueue::new(RingBuffer::<u64>::with_capacity(16), config).unwrap());
    let (consumer, done) = spawn_consumer(&queue);

    queue.push(1);
    queue.push(2);
    assert!(
        done.recv_timeout(STILL_BLOCKED).is_err(),
        "woke below the watermark"
    );

    queue.push(3);
    let batch = done.recv_timeout(WAKE_DEADLINE).expect("consumer not woken");
    assert_eq!(batch, vec![1, 2, 3]);
    consumer.join().unwrap();
}

#[test]
fn test_shutdown_releases_blocked_consumer() {
    let queue = Arc::new(BlockingQueue::with_default_config(
        RingBuffer::<u64>::with_capacity(8),
    ));
    let (consumer, done) = spawn_consumer(&queue);

    assert!(done.recv_timeout(STILL_BLOCKED).is_err());
    queue.notify_readers();

    let batch = done.recv_timeout(WAKE_DEADLINE).expect("consumer not released");
    assert!(batch.is_empty());
    consumer.join().unwrap();
}

#[test]
fn test_shutdown_drains_partial_batch() {
    let config = BlockingConfig::default().with_watermark(100);
    let queue = Arc::new(BlockingQueue::new(GrowingQueue::<u64>::with_capacity(4), config).unwrap());
    let (consumer, done) = spawn_consumer(&queue);

    for i in 0..10 {
        queue.push(i);
    }
    assert!(done.recv_timeout(STILL_BLOCKED).is_err());

    queue.shutdown_signal().shutdown();
    let batch = done.recv_timeout(WAKE_DEADLINE).expect("consumer not released");
    assert_eq!(batch, (0..10).collect::<Vec<_>>());
    consumer.join().unwrap();
}

#[test]
fn test_calls_after_shutdown_do_not_wait() {
    let config = BlockingConfig::default().with_watermark(50);
    let queue = BlockingQueue::new(RingBuffer::<u64>::with_capacity(8), config).unwrap();
    queue.notify_readers();

    for _ in 0..3 {
        assert_eq!(queue.blocking_consume_all(|_: &u64| {}), 0);
    }

    queue.push(5);
    queue.push(6);
    let mut seen = Vec::new();
    assert_eq!(queue.blocking_consume_all(|v: &u64| seen.push(*v)), 2);
    assert_eq!(seen, vec![5, 6]);
}

#[test]
fn test_timeout_returns_zero_without_draining() {
    let config = BlockingConfig::default().with_watermark(4);
    let queue = BlockingQueue::new(RingBuffer::<u64>::with_capacity(8), config).unwrap();
    queue.push(1);
    queue.push(2);

    let consumed = queue.blocking_consume_all_timeout(Duration::from_millis(20), |_: &u64| {
        panic!("handler ran after a timeout");
    });
    assert_eq!(consumed, 0);
    assert_eq!(queue.len(), 2);

    queue.push(3);
    queue.push(4);
    let consumed = queue.blocking_consume_all_timeout(Duration::from_millis(20), |_: &u64| {});
    assert_eq!(consumed, 4);
}

#[test]
fn test_shutdown_is_idempotent_across_signals() {
    let queue = BlockingQueue::with_default_config(BoundedMpmcQueue::<u64>::with_capacity(8));
    let first = queue.shutdown_signal();
    let second = first.clone();

    assert!(!queue.is_shutdown());
    first.shutdown();
    second.shutdown();
    queue.notify_readers();
    assert!(queue.is_shutdown());
    assert!(second.is_shutdown());
}

#[test]
fn test_invalid_watermark_rejected() {
    let err = BlockingQueue::new(
        GrowingQueue::<u64>::default(),
        BlockingConfig::default().with_watermark(0),
    )
    .unwrap_err();
    assert_eq!(err, BlockingError::InvalidWatermark { watermark: 0 });
    assert_eq!(err.to_string(), "invalid watermark 0 (must be at least 1)");
}

#[test]
fn test_full_bounded_queue_hands_value_back() {
    let queue = BlockingQueue::with_default_config(RingBuffer::<String>::with_capacity(2));
    assert!(queue.push("a".to_string()));

    let err = queue.try_push("b".to_string()).unwrap_err();
    assert_eq!(err.into_inner(), "b");
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_spsc_stream_through_blocking_ring() {
    const COUNT: u64 = 50_000;
    let config = BlockingConfig::default().with_watermark(8);
    let queue = Arc::new(BlockingQueue::new(RingBuffer::<u64>::with_capacity(256), config).unwrap());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut received = Vec::with_capacity(COUNT as usize);
            loop {
                let n = queue.blocking_consume_all(|v: &u64| received.push(*v));
                if n == 0 && queue.is_shutdown() && queue.is_empty() {
                    break;
                }
            }
            received
        })
    };

    for i in 0..COUNT {
        let mut value = i;
        while let Err(err) = queue.try_push(value) {
            value = err.into_inner();
            thread::yield_now();
        }
    }
    queue.notify_readers();

    let received = consumer.join().unwrap();
    assert_eq!(received, (0..COUNT).collect::<Vec<_>>());
}

#[test]
fn test_mpmc_consumers_share_work() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 5_000;
    const CONSUMERS: usize = 3;

    let queue = Arc::new(BlockingQueue::with_default_config(
        BoundedMpmcQueue::<u64>::with_capacity(128),
    ));

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut sum = 0u64;
                let mut count = 0u64;
                loop {
                    let n = queue.blocking_consume_all(|v: &u64| {
                        sum += *v;
                        count += 1;
                    });
                    if n == 0 && queue.is_shutdown() && queue.is_empty() {
                        break;
                    }
                }
                (sum, count)
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut value = p * PER_PRODUCER + i;
                    while let Err(err) = queue.try_push(value) {
                        value = err.into_inner();
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    queue.notify_readers();

    let (sum, count) = consumers
        .into_iter()
        .map(|c| c.join().unwrap())
        .fold((0, 0), |(s, c), (sum, count)| (s + sum, c + count));

    let total = PRODUCERS * PER_PRODUCER;
    assert_eq!(count, total);
    assert_eq!(sum, total * (total - 1) / 2);
}

#[test]
fn test_generic_drain_through_wrapper() {
    fn drain_all<Q: ConcurrentQueue<u64>>(queue: &Q) -> Vec<u64> {
        queue.drain().collect()
    }

    let queue = BlockingQueue::with_default_config(GrowingQueue::<u64>::with_capacity(2));
    for i in 0..20 {
        queue.push(i);
    }
    assert_eq!(drain_all(&queue), (0..20).collect::<Vec<_>>());
    assert!(queue.inner().is_empty());
}
