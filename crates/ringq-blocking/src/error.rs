//! Error types for ringq-blocking.

use thiserror::Error;

/// Errors that can occur when building a blocking queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockingError {
    /// The watermark can never be reached.
    #[error("invalid watermark {watermark} (must be at least 1)")]
    InvalidWatermark {
        /// The rejected watermark.
        watermark: usize,
    },
}
