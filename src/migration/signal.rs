//! Set-once completion signal shared by a migration's owner and joiners.

use crate::context::OperationContext;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// A value that is set exactly once and can be read by any number of waiters.
///
/// Waiters that start before [`set`](Self::set) block until it happens;
/// waiters that start after it return the stored value immediately.
#[derive(Debug)]
pub struct CompletionSignal<T> {
    value: Mutex<Option<T>>,
    cond: Condvar,
    check_interval: Duration,
}

impl<T> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionSignal<T> {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::with_check_interval(DEFAULT_CHECK_INTERVAL)
    }

    /// Create an unset signal whose waiters re-check for interruption at
    /// least every `check_interval`.
    pub fn with_check_interval(check_interval: Duration) -> Self {
        Self {
            value: Mutex::new(None),
            cond: Condvar::new(),
            check_interval,
        }
    }

    /// Check if the value has been set.
    pub fn is_set(&self) -> bool {
        self.value.lock().is_some()
    }

    /// Set the value and wake every waiter.
    ///
    /// # Panics
    ///
    /// Panics if the signal was already set.
    pub fn set(&self, value: T) {
        let mut slot = self.value.lock();
        if slot.is_some() {
            tracing::error!("Completion signal set twice");
            panic!("completion signal set twice");
        }
        *slot = Some(value);
        self.cond.notify_all();
    }
}

impl<T: Clone> CompletionSignal<T> {
    /// Get the value if it has been set.
    pub fn try_get(&self) -> Option<T> {
        self.value.lock().clone()
    }

    /// Block until the value is set and return a copy of it.
    ///
    /// Fails with `Interrupted` or `DeadlineExceeded` if `ctx` is killed or
    /// times out first.
    pub fn get(&self, ctx: &OperationContext) -> Result<T> {
        let mut slot = self.value.lock();
        ctx.wait_for_condition_or_interrupt(&self.cond, &mut slot, self.check_interval, |v| {
            v.is_some()
        })?;

        slot.clone()
            .ok_or_else(|| Error::Internal("completion signal woke unset".to_string()))
    }
}
