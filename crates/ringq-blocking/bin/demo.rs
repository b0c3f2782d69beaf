//! Demonstration of ringq-blocking features.
//!
//! Run with: `cargo run -p ringq-blocking --bin demo`

use ringq::{BoundedMpmcQueue, GrowingQueue, RingBuffer};
use ringq_blocking::{BlockingConfig, BlockingQueue, ConcurrentQueue};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ringq-blocking Demo ===\n");

    demo_basic_usage()?;
    demo_watermark_batching()?;
    demo_timeouts()?;
    demo_graceful_shutdown()?;
    demo_mpmc_workers();

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: one producer, one blocked consumer
fn demo_basic_usage() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 1: Basic Usage ---");

    let queue = Arc::new(BlockingQueue::new(
        RingBuffer::<u64>::with_capacity(256),
        BlockingConfig::low_latency(),
    )?);

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut received = Vec::new();
            while received.len() < 5 {
                queue.blocking_consume_all(|v: &u64| received.push(*v));
            }
            received
        })
    };

    for i in 1..=5 {
        queue.push(i * 10);
    }

    let received = consumer.join().map_err(|_| "consumer panicked")?;
    println!("  Received: {received:?}");
    Ok(())
}

/// Demo 2: consumer wakes only once a batch is ready
fn demo_watermark_batching() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Demo 2: Watermark Batching ---");

    let config = BlockingConfig::default().with_watermark(100);
    let queue = Arc::new(BlockingQueue::new(GrowingQueue::<u64>::default(), config)?);

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut batches = Vec::new();
            let mut total = 0;
            while total < 1_000 {
                let n = queue.blocking_consume_all(|_: &u64| {});
                if n > 0 {
                    batches.push(n);
                    total += n;
                }
            }
            batches
        })
    };

    for i in 0..1_000 {
        queue.push(i);
    }
    // Flush the tail batch that may sit below the watermark.
    queue.notify_readers();

    let batches = consumer.join().map_err(|_| "consumer panicked")?;
    println!("  {} wake-ups, batch sizes: {batches:?}", batches.len());
    Ok(())
}

/// Demo 3: bounded waits
fn demo_timeouts() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Demo 3: Timeouts ---");

    let config = BlockingConfig::default().with_watermark(10);
    let queue = BlockingQueue::new(RingBuffer::<u64>::with_capacity(64), config)?;
    queue.push(1);

    let start = Instant::now();
    let n = queue.blocking_consume_all_timeout(Duration::from_millis(50), |_: &u64| {});
    println!(
        "  Below watermark: consumed {n} after {:?}, {} still queued",
        start.elapsed(),
        queue.len()
    );

    let preset = BlockingConfig::high_throughput();
    println!(
        "  high_throughput preset: watermark {}, wait_timeout {:?}",
        preset.watermark, preset.wait_timeout
    );
    Ok(())
}

/// Demo 4: shutdown releases a consumer waiting on an unreachable watermark
fn demo_graceful_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Demo 4: Graceful Shutdown ---");

    let config = BlockingConfig::default().with_watermark(1_000);
    let queue = Arc::new(BlockingQueue::new(RingBuffer::<u64>::with_capacity(64), config)?);
    let signal = queue.shutdown_signal();

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.blocking_consume_all(|_: &u64| {}))
    };

    for i in 0..3 {
        queue.push(i);
    }
    thread::sleep(Duration::from_millis(50));
    signal.shutdown();
    signal.shutdown();

    let drained = consumer.join().map_err(|_| "consumer panicked")?;
    println!(
        "  Consumer released with {drained} elements (shutdown: {})",
        queue.is_shutdown()
    );
    Ok(())
}

/// Demo 5: several consumers draining one MPMC queue
fn demo_mpmc_workers() {
    println!("\n--- Demo 5: MPMC Workers ---");

    let queue = Arc::new(BlockingQueue::with_default_config(
        BoundedMpmcQueue::<u64>::with_capacity(128),
    ));

    let workers: Vec<_> = (0..3)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut handled = 0usize;
                loop {
                    let n = queue.blocking_consume_all(|_: &u64| {});
                    handled += n;
                    if n == 0 && queue.is_shutdown() && queue.is_empty() {
                        return (id, handled);
                    }
                }
            })
        })
        .collect();

    for i in 0..10_000 {
        let mut value = i;
        while let Err(err) = queue.try_push(value) {
            value = err.into_inner();
            thread::yield_now();
        }
    }
    queue.notify_readers();

    for worker in workers {
        if let Ok((id, handled)) = worker.join() {
            println!("  Worker {id} handled {handled} elements");
        }
    }
}
