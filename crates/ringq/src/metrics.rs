use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters shared by producers and consumers.
///
/// All updates are `Relaxed`: the counters are statistics, they never order
/// access to queue slots.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    batches_received: AtomicU64,
    full_rejections: AtomicU64,
    growths: AtomicU64,
    cas_retries: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_messages_sent(&self, n: u64) {
        self.messages_sent.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_messages_received(&self, n: u64) {
        self.messages_received.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_batches_received(&self, n: u64) {
        self.batches_received.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_full_rejections(&self, n: u64) {
        self.full_rejections.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_growths(&self, n: u64) {
        self.growths.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_cas_retries(&self, n: u64) {
        self.cas_retries.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            batches_received: self.batches_received.load(Ordering::Relaxed),
            full_rejections: self.full_rejections.load(Ordering::Relaxed),
            growths: self.growths.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a queue's metrics.
///
/// All fields stay zero unless [`Config::enable_metrics`](crate::Config) is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Elements successfully pushed.
    pub messages_sent: u64,
    /// Elements consumed (popped, drained or taken by `consume_all`).
    pub messages_received: u64,
    /// Consumer operations that took at least one element.
    pub batches_received: u64,
    /// Pushes rejected because the queue was full.
    pub full_rejections: u64,
    /// Segment growths (`GrowingQueue` only).
    pub growths: u64,
    /// Failed compare-and-swap attempts (`BoundedMpmcQueue` only).
    pub cas_retries: u64,
}
