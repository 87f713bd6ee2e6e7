//! Per-operation cancellation context.
//!
//! Every blocking registry call takes an [`OperationContext`]. The context
//! carries the caller's cancellation token and an optional deadline, and
//! provides the one wait primitive the registry uses:
//! [`OperationContext::wait_for_condition_or_interrupt`].
//!
//! ```rust,ignore
//! let ctx = OperationContext::new().with_timeout(Duration::from_secs(30));
//! let killer = ctx.clone();
//!
//! // From another thread: makes every wait on `ctx` fail with `Interrupted`.
//! killer.kill();
//! ```

use crate::error::{Error, Result};
use parking_lot::{Condvar, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

static NEXT_OP_ID: AtomicU64 = AtomicU64::new(1);

/// Shortest slice a blocked wait sleeps before re-checking for interruption.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Longest slice a blocked wait sleeps before re-checking for interruption.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Bound an interrupt check interval to
/// [`MIN_CHECK_INTERVAL`]..=[`MAX_CHECK_INTERVAL`].
pub fn clamp_check_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_CHECK_INTERVAL, MAX_CHECK_INTERVAL)
}

/// Cancellation and deadline state of one client operation.
///
/// Clones share the same cancellation token, so killing any clone
/// interrupts waits on all of them.
#[derive(Debug, Clone)]
pub struct OperationContext {
    op_id: u64,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationContext {
    /// Create a context with a fresh operation id and no deadline.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a context driven by an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            op_id: NEXT_OP_ID.fetch_add(1, Ordering::Relaxed),
            cancellation,
            deadline: None,
        }
    }

    /// Set a deadline `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Derive a sub-operation.
    ///
    /// The child gets its own id, is killed when the parent is killed, and
    /// inherits the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            op_id: NEXT_OP_ID.fetch_add(1, Ordering::Relaxed),
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
        }
    }

    /// Unique id of this operation.
    pub fn op_id(&self) -> u64 {
        self.op_id
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Get the underlying cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Kill the operation.
    pub fn kill(&self) {
        self.cancellation.cancel();
    }

    /// Check if the operation was killed.
    pub fn is_killed(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail if the operation was killed or its deadline has passed.
    pub fn check_for_interrupt(&self) -> Result<()> {
        if self.is_killed() {
            return Err(Error::Interrupted { op_id: self.op_id });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded { op_id: self.op_id });
            }
        }
        Ok(())
    }

    /// Wait on `cond` until `predicate` holds, or the operation is interrupted.
    ///
    /// The predicate is evaluated under the lock before every wait, so a
    /// predicate that already holds returns `Ok` even for a killed
    /// operation. Each wait lasts at most `check_interval` (and never past
    /// the deadline) so a kill is observed within one interval even if
    /// nobody notifies `cond`. The interval is bounded by
    /// [`clamp_check_interval`].
    pub fn wait_for_condition_or_interrupt<T, F>(
        &self,
        cond: &Condvar,
        guard: &mut MutexGuard<'_, T>,
        check_interval: Duration,
        mut predicate: F,
    ) -> Result<()>
    where
        F: FnMut(&mut T) -> bool,
    {
        let check_interval = clamp_check_interval(check_interval);
        loop {
            if predicate(&mut **guard) {
                return Ok(());
            }

            self.check_for_interrupt()?;

            let slice = match self.remaining() {
                Some(remaining) => check_interval.min(remaining),
                None => check_interval,
            };
            cond.wait_for(guard, slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use test_log::test;

    #[test]
    fn test_unrepresentable_timeout_means_no_deadline() {
        let ctx = OperationContext::new().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert!(ctx.check_for_interrupt().is_ok());

        let ctx = OperationContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.deadline().is_some());
    }

    #[test]
    fn test_check_interval_is_clamped() {
        assert_eq!(clamp_check_interval(Duration::ZERO), MIN_CHECK_INTERVAL);
        assert_eq!(clamp_check_interval(Duration::MAX), MAX_CHECK_INTERVAL);
        let interval = Duration::from_millis(10);
        assert_eq!(clamp_check_interval(interval), interval);
    }

    #[test]
    fn test_wait_with_huge_check_interval_still_times_out() {
        let lock = Mutex::new(false);
        let cond = Condvar::new();
        let ctx = OperationContext::new().with_timeout(Duration::from_millis(20));

        let mut guard = lock.lock();
        let result =
            ctx.wait_for_condition_or_interrupt(&cond, &mut guard, Duration::MAX, |ready| *ready);
        assert_eq!(result, Err(Error::DeadlineExceeded { op_id: ctx.op_id() }));
    }

    #[test]
    fn test_wait_with_zero_check_interval_observes_kill() {
        let lock = Arc::new(Mutex::new(false));
        let cond = Condvar::new();
        let ctx = OperationContext::new().with_timeout(Duration::MAX);
        let killer = ctx.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            killer.kill();
        });

        let mut guard = lock.lock();
        let result =
            ctx.wait_for_condition_or_interrupt(&cond, &mut guard, Duration::ZERO, |ready| *ready);
        drop(guard);
        handle.join().unwrap();

        assert_eq!(result, Err(Error::Interrupted { op_id: ctx.op_id() }));
    }

    #[test]
    fn test_op_ids_are_unique() {
        let a = OperationContext::new();
        let b = OperationContext::new();
        assert_ne!(a.op_id(), b.op_id());
        assert_ne!(a.op_id(), a.child().op_id());
    }

    #[test]
    fn test_kill_is_shared_by_clones() {
        let ctx = OperationContext::new();
        let killer = ctx.clone();
        assert!(ctx.check_for_interrupt().is_ok());

        killer.kill();
        assert_eq!(
            ctx.check_for_interrupt(),
            Err(Error::Interrupted { op_id: ctx.op_id() })
        );
    }

    #[test]
    fn test_child_killed_with_parent() {
        let parent = OperationContext::new().with_timeout(Duration::from_secs(60));
        let child = parent.child();
        assert_eq!(child.deadline(), parent.deadline());

        parent.kill();
        assert!(child.is_killed());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = OperationContext::new().with_deadline(Instant::now());
        assert_eq!(
            ctx.check_for_interrupt(),
            Err(Error::DeadlineExceeded { op_id: ctx.op_id() })
        );
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_satisfied_predicate_wins_over_kill() {
        let lock = Mutex::new(true);
        let cond = Condvar::new();
        let ctx = OperationContext::new();
        ctx.kill();

        let mut guard = lock.lock();
        let result = ctx.wait_for_condition_or_interrupt(
            &cond,
            &mut guard,
            Duration::from_millis(1),
            |ready| *ready,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_wait_times_out() {
        let lock = Mutex::new(false);
        let cond = Condvar::new();
        let ctx = OperationContext::new().with_timeout(Duration::from_millis(30));

        let mut guard = lock.lock();
        let result = ctx.wait_for_condition_or_interrupt(
            &cond,
            &mut guard,
            Duration::from_millis(5),
            |ready| *ready,
        );
        assert_eq!(result, Err(Error::DeadlineExceeded { op_id: ctx.op_id() }));
        assert!(Instant::now() >= ctx.deadline().unwrap());
    }

    #[test]
    fn test_wait_observes_kill_without_notify() {
        let lock = Arc::new(Mutex::new(false));
        let cond = Arc::new(Condvar::new());
        let ctx = OperationContext::new();
        let killer = ctx.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            killer.kill();
        });

        let mut guard = lock.lock();
        let result = ctx.wait_for_condition_or_interrupt(
            &cond,
            &mut guard,
            Duration::from_millis(5),
            |ready| *ready,
        );
        drop(guard);
        handle.join().unwrap();

        assert_eq!(result, Err(Error::Interrupted { op_id: ctx.op_id() }));
    }

    #[test]
    fn test_wait_wakes_on_notify() {
        let lock = Arc::new(Mutex::new(false));
        let cond = Arc::new(Condvar::new());
        let ctx = OperationContext::new().with_timeout(Duration::from_secs(10));

        let (lock2, cond2) = (lock.clone(), cond.clone());
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            *lock2.lock() = true;
            cond2.notify_all();
        });

        let mut guard = lock.lock();
        let result = ctx.wait_for_condition_or_interrupt(
            &cond,
            &mut guard,
            Duration::from_millis(50),
            |ready| *ready,
        );
        assert!(result.is_ok());
        assert!(*guard);
        drop(guard);
        handle.join().unwrap();
    }
}
