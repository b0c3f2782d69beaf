//! Debug assertion macros for blocking-queue invariants.
//!
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so
//! there is zero overhead in release builds.

// =============================================================================
// Watermark notification
// =============================================================================

/// Assert that a push reaching the watermark notified a waiter.
///
/// **Invariant**: `len_after_push >= watermark → notify`
///
/// Used in: `BlockingQueue::try_push()`
macro_rules! debug_assert_watermark_notified {
    ($len:expr, $watermark:expr, $notified:expr) => {
        debug_assert!(
            $len < $watermark || $notified,
            "push reached watermark {} (len {}) without notifying",
            $watermark,
            $len
        )
    };
}

// =============================================================================
// Wake-up reason
// =============================================================================

/// Assert that an untimed wait only ended for a valid reason.
///
/// **Invariant**: `wait returns → shut_down ∨ len >= watermark`
///
/// Used in: `BlockingQueue::blocking_consume_all()`
macro_rules! debug_assert_woken_ready {
    ($ready:expr) => {
        debug_assert!(
            $ready,
            "consumer woke with queue below watermark and no shutdown"
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_watermark_notified;
pub(crate) use debug_assert_woken_ready;
