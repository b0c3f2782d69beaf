//! Writer/reader benchmark over every queue engine.
//!
//! Run with: `cargo run -p ringq --release --features bench-bin --bin queue_bench [count]`
//!
//! A writer thread pushes `count` pseudo-random values (retrying while the
//! queue is full), a reader thread drains them with `consume_all`. The reader
//! checks that it received exactly the pushed sequence, then the average time
//! per element is reported. Set `RUST_LOG=ringq=debug` to watch growth.

use ringq::{BoundedMpmcQueue, ConcurrentQueue, GrowingQueue, RingBuffer};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const DEFAULT_COUNT: usize = 200_000;

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ringq=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

/// Deterministic scrambled values so a reordering would be visible.
fn values(count: usize) -> Vec<u64> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % count as u64
        })
        .collect()
}

fn benchmark<Q>(name: &str, queue: Q, pushed: &Arc<Vec<u64>>)
where
    Q: ConcurrentQueue<u64> + Send + Sync + 'static,
{
    println!("\n{name}");
    println!("{}", "=".repeat(50));

    let queue = Arc::new(queue);
    let count = pushed.len();
    let start = Instant::now();

    let writer = {
        let queue = Arc::clone(&queue);
        let pushed = Arc::clone(pushed);
        thread::Builder::new()
            .name("writer".into())
            .spawn(move || {
                for &value in pushed.iter() {
                    let mut value = value;
                    while let Err(err) = queue.try_push(value) {
                        value = err.into_inner();
                        thread::yield_now();
                    }
                }
            })
            .expect("spawn writer thread")
    };

    let reader = {
        let queue = Arc::clone(&queue);
        thread::Builder::new()
            .name("reader".into())
            .spawn(move || {
                let mut received = Vec::with_capacity(count);
                while received.len() < count {
                    if queue.consume_all(|item| received.push(*item)) == 0 {
                        thread::yield_now();
                    }
                }
                received
            })
            .expect("spawn reader thread")
    };

    writer.join().expect("writer panicked");
    let received = reader.join().expect("reader panicked");
    let duration = start.elapsed();

    let mismatches = pushed
        .iter()
        .zip(&received)
        .filter(|(sent, got)| sent != got)
        .count();
    if mismatches == 0 {
        tracing::info!(queue = name, count, "order verified");
    } else {
        tracing::error!(queue = name, mismatches, "received sequence differs from pushed");
    }

    println!("  Elements:         {count}");
    println!("  Duration:         {duration:.2?}");
    println!(
        "  Per element:      {} ns",
        duration.as_nanos() / count.max(1) as u128
    );
    println!("  Order preserved:  {}", mismatches == 0);
}

fn main() {
    init_tracing();

    let count = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_COUNT);
    let pushed = Arc::new(values(count));

    benchmark(
        "RingBuffer (capacity = count + 1)",
        RingBuffer::<u64>::with_capacity((count + 1).max(2)),
        &pushed,
    );
    benchmark(
        "RingBuffer (capacity 1024)",
        RingBuffer::<u64>::with_capacity(1024),
        &pushed,
    );
    benchmark("GrowingQueue (from 1024)", GrowingQueue::<u64>::default(), &pushed);
    benchmark(
        "BoundedMpmcQueue (capacity 1024)",
        BoundedMpmcQueue::<u64>::with_capacity(1024),
        &pushed,
    );
}
