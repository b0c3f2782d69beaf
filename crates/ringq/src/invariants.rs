//! Debug assertion macros for queue invariants.
//!
//! These are only active in debug builds (`#[cfg(debug_assertions)]`), so
//! there is zero overhead in release builds.
//!
//! Used by `RingBuffer<T>`, `GrowingQueue<T>` and `BoundedMpmcQueue<T>`.

#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Bounded length
// =============================================================================

/// Assert that a queue never holds more than `capacity - 1` elements.
///
/// **Invariant**: `0 ≤ (writer - reader) mod capacity ≤ capacity - 1`
///
/// Used in: `RingBuffer::push_inner()` after computing the next writer
macro_rules! debug_assert_len_bounded {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len < $capacity,
            "length {} exceeds usable capacity {}",
            $len,
            $capacity - 1
        )
    };
}

// =============================================================================
// Slot state
// =============================================================================

/// Assert that a slot about to be consumed holds a value.
///
/// **Invariant**: every slot in `[reader, writer)` is occupied
///
/// Used in: every consumer path before taking a value out of a slot
macro_rules! debug_assert_occupied {
    ($occupied:expr, $pos:expr) => {
        debug_assert!($occupied, "reading empty slot at position {}", $pos)
    };
}

/// Assert that a slot about to be written is empty.
///
/// **Invariant**: every slot outside `[reader, writer)` is empty
///
/// Used in: every producer path before storing a value into a slot
macro_rules! debug_assert_vacant {
    ($vacant:expr, $pos:expr) => {
        debug_assert!($vacant, "overwriting live slot at position {}", $pos)
    };
}

// =============================================================================
// Growth handoff
// =============================================================================

/// Assert that a retired segment's content was taken over by its successor.
///
/// **Invariant**: a freshly grown segment reserves exactly
/// `predecessor.usable_capacity()` leading slots, is not read from before
/// the handoff, and is seeded exactly once.
///
/// Used in: `GrowingQueue::sync_read_segment()` after `RingBuffer::seed_from()`
macro_rules! debug_assert_reserved_prefix {
    ($seeded:expr, $reserved:expr) => {
        debug_assert!(
            $seeded,
            "successor segment has no unsynced prefix of {} slots",
            $reserved
        )
    };
}

// =============================================================================
// Single-role discipline
// =============================================================================

/// Detects two threads acting as the same role (producer or consumer) of an
/// SPSC queue at the same time.
///
/// Zero-sized in release builds; calling a single-role operation from two
/// threads is undefined behavior by contract, this only catches it early in
/// debug builds.
#[derive(Debug, Default)]
pub(crate) struct RoleCheck {
    #[cfg(debug_assertions)]
    active: AtomicBool,
}

impl RoleCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: AtomicBool::new(false),
        }
    }

    /// Marks the role as active until the returned guard is dropped.
    #[inline]
    pub(crate) fn enter(&self, role: &'static str) -> RoleGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let was_active = self.active.swap(true, Ordering::Acquire);
            debug_assert!(!was_active, "two threads entered the {role} role concurrently");
            RoleGuard {
                active: &self.active,
            }
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = role;
            RoleGuard {
                _role: std::marker::PhantomData,
            }
        }
    }
}

pub(crate) struct RoleGuard<'a> {
    #[cfg(debug_assertions)]
    active: &'a AtomicBool,
    #[cfg(not(debug_assertions))]
    _role: std::marker::PhantomData<&'a RoleCheck>,
}

#[cfg(debug_assertions)]
impl Drop for RoleGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_len_bounded;
pub(crate) use debug_assert_occupied;
pub(crate) use debug_assert_reserved_prefix;
pub(crate) use debug_assert_vacant;
