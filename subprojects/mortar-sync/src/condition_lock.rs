//! # ConditionLock
//!
//! A mutex and condition variable fused around one integer condition.

use std::{
    fmt,
    sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError},
    time::{Duration, Instant},
};

/// A lock gated on an integer condition.
///
/// The lock can be acquired unconditionally with [`lock`], or the caller can
/// block until the condition holds a target value with [`lock_when`] and its
/// bounded variants. Releasing through [`ConditionGuard::unlock_with`]
/// publishes a new condition and wakes every waiter; dropping the guard
/// releases the lock with the condition unchanged.
///
/// All waiters are woken on every condition change, whatever value they wait
/// for. Each re-checks its own target and goes back to sleep if it is not
/// satisfied, so distinct targets can be awaited on one lock concurrently.
///
/// A release that publishes a value happens-before the return of any
/// acquisition that observed it, so data written before `unlock_with` is
/// visible to the woken waiters.
///
/// [`lock`]: ConditionLock::lock
/// [`lock_when`]: ConditionLock::lock_when
pub struct ConditionLock {
    state: Mutex<i32>,
    cond: Condvar,
}

impl ConditionLock {
    /// Creates a new lock holding `condition`.
    pub const fn new(condition: i32) -> Self {
        Self {
            state: Mutex::new(condition),
            cond: Condvar::new(),
        }
    }

    /// Acquires the lock unconditionally, blocking until it is available.
    pub fn lock(&self) -> ConditionGuard<'_> {
        ConditionGuard {
            lock: self,
            state: self.state_guard(),
        }
    }

    /// Blocks until the condition equals `condition`, then returns holding
    /// the lock.
    ///
    /// Wakeups are re-checked in a loop, so a return guarantees the
    /// condition was equal to the target at the moment of acquisition.
    pub fn lock_when(&self, condition: i32) -> ConditionGuard<'_> {
        let mut state = self.state_guard();
        while *state != condition {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        ConditionGuard { lock: self, state }
    }

    /// Bounded [`lock_when`]: gives up after `timeout`.
    ///
    /// Returns `None` on expiry with the lock released and the condition
    /// unchanged. Expiry is a normal outcome, not an error.
    ///
    /// [`lock_when`]: ConditionLock::lock_when
    pub fn lock_when_timeout(
        &self,
        condition: i32,
        timeout: Duration,
    ) -> Option<ConditionGuard<'_>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.lock_when_deadline(condition, deadline),
            // A timeout too large to represent is as good as unbounded.
            None => Some(self.lock_when(condition)),
        }
    }

    /// Bounded [`lock_when`] against an absolute deadline.
    ///
    /// A deadline already in the past still succeeds when the condition is
    /// at the target; otherwise the call fails fast without sleeping. The
    /// remaining time is recomputed after every wakeup, so spurious wakeups
    /// never extend the bound.
    ///
    /// [`lock_when`]: ConditionLock::lock_when
    pub fn lock_when_deadline(
        &self,
        condition: i32,
        deadline: Instant,
    ) -> Option<ConditionGuard<'_>> {
        let mut state = self.state_guard();
        while *state != condition {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (next, _) = match self.cond.wait_timeout(state, remaining) {
                Ok(woken) => woken,
                Err(poisoned) => poisoned.into_inner(),
            };
            state = next;
        }
        Some(ConditionGuard { lock: self, state })
    }

    /// Non-blocking [`lock_when`]: succeeds only if the condition already
    /// equals `condition`.
    ///
    /// [`lock_when`]: ConditionLock::lock_when
    pub fn try_lock_when(&self, condition: i32) -> Option<ConditionGuard<'_>> {
        let state = self.state_guard();
        if *state == condition {
            Some(ConditionGuard { lock: self, state })
        } else {
            None
        }
    }

    /// Returns the current condition.
    ///
    /// The lock is held only for the read; the value may be stale by the
    /// time the caller looks at it. Intended for fast-path status queries.
    pub fn condition(&self) -> i32 {
        *self.state_guard()
    }

    fn state_guard(&self) -> MutexGuard<'_, i32> {
        // The protected state is a plain integer, so a panic while the lock
        // was held cannot have left it logically corrupt.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConditionLock {
    /// Creates a lock holding condition `0`.
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for ConditionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ConditionLock");
        match self.state.try_lock() {
            Ok(state) => {
                d.field("condition", &*state);
            }
            Err(TryLockError::Poisoned(err)) => {
                d.field("condition", &*err.into_inner());
            }
            Err(TryLockError::WouldBlock) => {
                d.field("condition", &format_args!("<locked>"));
            }
        }
        d.finish_non_exhaustive()
    }
}

/// RAII guard over an acquired [`ConditionLock`].
///
/// Dropping the guard releases the lock with the condition unchanged.
#[must_use = "if unused the ConditionLock will immediately unlock"]
#[clippy::has_significant_drop]
pub struct ConditionGuard<'a> {
    lock: &'a ConditionLock,
    state: MutexGuard<'a, i32>,
}

impl ConditionGuard<'_> {
    /// Returns the condition as seen while the lock is held.
    pub fn condition(&self) -> i32 {
        *self.state
    }

    /// Replaces the condition while keeping the lock held.
    ///
    /// Every waiter is woken; each will re-check its target once the guard
    /// releases the lock.
    pub fn set_condition(&mut self, condition: i32) {
        *self.state = condition;
        self.lock.cond.notify_all();
    }

    /// Publishes `condition`, wakes every waiter and releases the lock.
    pub fn unlock_with(mut self, condition: i32) {
        self.set_condition(condition);
    }
}

impl fmt::Debug for ConditionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionGuard")
            .field("condition", &self.condition())
            .finish()
    }
}
