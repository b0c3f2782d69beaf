//! ringq - Lock-Free Concurrent Queues
//!
//! Three queue engines for producer/consumer pipelines:
//!
//! - [`RingBuffer`]: fixed-capacity, wait-free single-producer single-consumer
//!   ring buffer.
//! - [`GrowingQueue`]: unbounded SPSC queue that chains ring buffers, doubling
//!   the capacity whenever the producer runs out of room, without stopping
//!   either side.
//! - [`BoundedMpmcQueue`]: fixed-capacity multi-producer multi-consumer queue
//!   with CAS ticket reservation and per-slot sequence numbers.
//!
//! All three implement [`ConcurrentQueue`], so code that only needs
//! `push`/`consume_all` (such as the blocking wrapper in `ringq-blocking`)
//! can work with any of them.
//!
//! # Key Features
//!
//! - Cache-line padded cursors (`crossbeam_utils::CachePadded`)
//! - Batch consumption API (single reader update for N items)
//! - Full/empty reported as values, never by blocking
//! - Optional per-queue metrics
//!
//! # Example
//!
//! ```
//! use ringq::{ConcurrentQueue, RingBuffer};
//!
//! let ring = RingBuffer::<u64>::with_capacity(4);
//! assert!(ring.push(1));
//! assert!(ring.push(2));
//! assert!(ring.push(3));
//! assert!(!ring.push(4)); // full: capacity - 1 usable slots
//!
//! assert_eq!(ring.try_pop(), Some(1));
//!
//! let drained: Vec<u64> = ring.drain().collect();
//! assert_eq!(drained, [2, 3]);
//! ```

mod config;
mod growing;
mod invariants;
mod metrics;
mod mpmc;
mod queue;
mod ring;
mod slot;

pub use config::{
    CapacityError, Config, DEFAULT_CAPACITY, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG,
    MIN_CAPACITY,
};
pub use growing::GrowingQueue;
pub use metrics::MetricsSnapshot;
pub use mpmc::BoundedMpmcQueue;
pub use queue::{ConcurrentQueue, Drain, PushError};
pub use ring::RingBuffer;
