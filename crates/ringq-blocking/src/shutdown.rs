//! Shutdown utilities for releasing blocked consumers.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Monitor shared by a blocking queue and its shutdown signals.
///
/// The mutex guards only the shutdown flag; every wait and every
/// notification happens with it held, so a wake-up sent between a
/// consumer's check and its wait cannot be lost.
#[derive(Debug, Default)]
pub(crate) struct ShutdownState {
    shut_down: Mutex<bool>,
    ready: Condvar,
}

impl ShutdownState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Locks the monitor. A poisoned lock is recovered: the guarded state
    /// is a plain flag that cannot be left half-updated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, bool> {
        self.shut_down.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn condvar(&self) -> &Condvar {
        &self.ready
    }

    /// Wakes one waiter so it can re-check the watermark.
    pub(crate) fn notify_one(&self) {
        let _monitor = self.lock();
        self.ready.notify_one();
    }

    /// Marks the queue shut down and wakes every waiter.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub(crate) fn trigger(&self) -> bool {
        let mut shut_down = self.lock();
        if *shut_down {
            return false;
        }
        *shut_down = true;
        self.ready.notify_all();
        drop(shut_down);

        tracing::info!("blocking queue shut down, readers released");
        true
    }

    #[inline]
    pub(crate) fn is_shut_down(&self) -> bool {
        *self.lock()
    }
}

/// A cloneable signal for triggering shutdown externally.
///
/// Multiple clones of this handle can trigger shutdown - only the first
/// one has effect, subsequent calls are no-ops.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    state: Arc<ShutdownState>,
}

impl ShutdownSignal {
    pub(crate) fn new(state: Arc<ShutdownState>) -> Self {
        Self { state }
    }

    /// Marks the queue shut down and wakes every blocked consumer.
    ///
    /// After this, blocking calls return immediately, draining whatever is
    /// queued (possibly nothing). Idempotent.
    pub fn shutdown(&self) {
        self.state.trigger();
    }

    /// Returns `true` if shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.state.is_shut_down()
    }
}
