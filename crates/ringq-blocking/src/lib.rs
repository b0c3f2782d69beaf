//! Blocking consumers for ringq queues
//!
//! This crate wraps any [`ringq::ConcurrentQueue`] in a [`BlockingQueue`]
//! whose consumers can sleep until data is ready instead of spinning on
//! `consume_all`.
//!
//! # Features
//!
//! - **Watermark wake-up**: a push that leaves at least `watermark` elements queued wakes one waiting consumer
//! - **Graceful shutdown**: [`BlockingQueue::notify_readers`] or a cloned [`ShutdownSignal`] releases every waiter
//! - **Bounded waits**: per-call or configured timeouts that return 0 without draining
//! - **Non-blocking producers**: pushing never waits; a full bounded queue still hands the value back
//!
//! # Example
//!
//! ```
//! use ringq::RingBuffer;
//! use ringq_blocking::{BlockingConfig, BlockingQueue};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let config = BlockingConfig::default().with_watermark(2);
//! let queue = Arc::new(BlockingQueue::new(RingBuffer::<u64>::with_capacity(64), config).unwrap());
//!
//! let consumer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         let mut total = 0;
//!         while total < 4 {
//!             total += queue.blocking_consume_all(|v: &u64| assert!(*v < 4));
//!         }
//!         total
//!     })
//! };
//!
//! for i in 0..4 {
//!     queue.push(i);
//! }
//! // Release the consumer even if the last batch stayed under the watermark.
//! queue.notify_readers();
//! assert_eq!(consumer.join().unwrap(), 4);
//! ```

mod blocking;
mod config;
mod error;
mod invariants;
mod shutdown;

pub use blocking::BlockingQueue;
pub use config::BlockingConfig;
pub use error::BlockingError;
pub use shutdown::ShutdownSignal;

// Re-export the queue trait so callers can use the forwarding impl directly
pub use ringq::ConcurrentQueue;
