use thiserror::Error;

/// Smallest slot count a queue can be built with (one usable slot plus the
/// slot that separates "full" from "empty").
pub const MIN_CAPACITY: usize = 2;

/// Default slot count (1024 slots, 1023 usable).
pub const DEFAULT_CAPACITY: usize = 1024;

/// Error returned when a capacity cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    /// Capacity is below [`MIN_CAPACITY`].
    #[error("capacity {capacity} is too small (min: {min})")]
    TooSmall {
        /// The rejected capacity.
        capacity: usize,
        /// The minimum accepted capacity.
        min: usize,
    },
    /// The target buffer cannot hold the live elements of the source.
    #[error("capacity {capacity} cannot hold {len} live elements")]
    CannotHold {
        /// The rejected capacity (slot count).
        capacity: usize,
        /// Number of live elements that had to fit.
        len: usize,
    },
}

/// Configuration for [`RingBuffer`](crate::RingBuffer),
/// [`GrowingQueue`](crate::GrowingQueue) and
/// [`BoundedMpmcQueue`](crate::BoundedMpmcQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of slots. One slot is always kept free, so a queue holds at
    /// most `capacity - 1` elements. For a growing queue this is the size of
    /// the first segment.
    pub capacity: usize,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(capacity: usize, enable_metrics: bool) -> Self {
        Self {
            capacity,
            enable_metrics,
        }
    }

    /// Returns a copy of this configuration with a different slot count.
    #[inline]
    pub const fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Returns the number of elements a queue built from this config can hold.
    #[inline]
    pub const fn usable_capacity(&self) -> usize {
        self.capacity.saturating_sub(1)
    }

    /// Checks that the capacity is usable.
    pub fn validate(&self) -> Result<(), CapacityError> {
        if self.capacity < MIN_CAPACITY {
            return Err(CapacityError::TooSmall {
                capacity: self.capacity,
                min: MIN_CAPACITY,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            enable_metrics: false,
        }
    }
}

/// Low latency configuration (4K slots, fits in L1 cache for small `T`)
pub const LOW_LATENCY_CONFIG: Config = Config::new(4096, false);

/// High throughput configuration (256K slots)
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(1 << 18, false);
