//! Configuration for blocking consumers.

use crate::BlockingError;
use std::time::Duration;

/// Configuration for [`BlockingQueue`](crate::BlockingQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingConfig {
    /// Queue length at which a blocked consumer is woken.
    ///
    /// Must be at least 1, and reachable by the wrapped queue (at most
    /// `capacity - 1` for a bounded queue), otherwise only shutdown wakes
    /// the consumer.
    ///
    /// Default: 1
    pub watermark: usize,

    /// Upper bound on a single wait in `blocking_consume_all`.
    ///
    /// When the wait times out before the watermark is reached, the call
    /// returns 0 without draining.
    ///
    /// Default: `None` (wait until woken)
    pub wait_timeout: Option<Duration>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            watermark: 1,
            wait_timeout: None,
        }
    }
}

impl BlockingConfig {
    /// Wakes the consumer for every element.
    pub fn low_latency() -> Self {
        Self::default()
    }

    /// Wakes the consumer once a batch of 256 elements is ready, checking
    /// back at least every 50ms.
    pub fn high_throughput() -> Self {
        Self {
            watermark: 256,
            wait_timeout: Some(Duration::from_millis(50)),
        }
    }

    /// Sets the watermark.
    pub fn with_watermark(mut self, watermark: usize) -> Self {
        self.watermark = watermark;
        self
    }

    /// Sets the wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BlockingError> {
        if self.watermark == 0 {
            return Err(BlockingError::InvalidWatermark {
                watermark: self.watermark,
            });
        }
        Ok(())
    }
}
