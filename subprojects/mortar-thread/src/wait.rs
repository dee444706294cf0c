//! Waiting for thread termination.
//!
//! All four forms funnel through the status gate: the worker's exit hook
//! publishes `Stopped`, a waiter blocks (or polls) until it observes that,
//! then reaps the join handle. The first waiter to reach the handle joins
//! the OS thread; everyone else finds it already claimed and returns as
//! soon as the gate says `Stopped`. Join failures are surfaced, never
//! retried.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{current, handle::Thread, status::ThreadStatus};

impl Thread {
    /// Blocks until the thread has stopped, then reaps it.
    ///
    /// Idempotent: waiting on an already-reaped thread returns `Ok`
    /// immediately. A delegate panic is reported as
    /// [`WaitError::Panicked`] by the waiter that reaps the thread.
    /// Any wait form called from the thread itself fails with
    /// [`WaitError::WouldDeadlock`]: only that thread's own exit could
    /// satisfy the wait.
    pub fn wait(&self) -> Result<(), WaitError> {
        self.check_waitable()?;
        drop(
            self.inner
                .status
                .lock_when(ThreadStatus::Stopped.as_condition()),
        );
        self.reap()
    }

    /// Bounded [`wait`]: gives up after `timeout`.
    ///
    /// Returns `Ok(true)` once the thread has stopped and been reaped,
    /// `Ok(false)` on expiry with the thread still running. Expiry is a
    /// normal outcome, not an error.
    ///
    /// [`wait`]: Thread::wait
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, WaitError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_deadline(deadline),
            // A timeout too large to represent is as good as unbounded.
            None => self.wait().map(|()| true),
        }
    }

    /// Bounded [`wait`] against an absolute deadline.
    ///
    /// [`wait`]: Thread::wait
    pub fn wait_deadline(&self, deadline: Instant) -> Result<bool, WaitError> {
        self.check_waitable()?;
        match self
            .inner
            .status
            .lock_when_deadline(ThreadStatus::Stopped.as_condition(), deadline)
        {
            Some(guard) => {
                drop(guard);
                self.reap()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Non-blocking [`wait`]: `Ok(true)` iff the thread had stopped at the
    /// moment of the call (the thread is then reaped).
    ///
    /// [`wait`]: Thread::wait
    pub fn try_wait(&self) -> Result<bool, WaitError> {
        self.check_waitable()?;
        match self
            .inner
            .status
            .try_lock_when(ThreadStatus::Stopped.as_condition())
        {
            Some(guard) => {
                drop(guard);
                self.reap()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn check_waitable(&self) -> Result<(), WaitError> {
        if !self.inner.owned {
            return Err(WaitError::NotOwned);
        }
        // The gate is only flipped by this thread's own exit hook, so a
        // self-wait could never return. Catches every clone of the handle.
        if current::with_current(|thread| Arc::ptr_eq(&thread.inner, &self.inner)) == Some(true) {
            return Err(WaitError::WouldDeadlock);
        }
        if !self.inner.native().spawned {
            return Err(WaitError::NotStarted);
        }
        Ok(())
    }

    /// Joins the stopped thread if its handle is still held, clearing the
    /// cached native id. Callers have already observed `Stopped`, so the
    /// join returns promptly.
    fn reap(&self) -> Result<(), WaitError> {
        let join = self.inner.native().join.take();
        let Some(handle) = join else {
            // Claimed by a concurrent waiter or reaped earlier.
            return Ok(());
        };
        let outcome = handle.join();
        self.inner.native().id = None;
        outcome.map_err(|_payload| WaitError::Panicked)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The thread was never started, so there is nothing to wait for.
    #[error("Thread is not started")]
    NotStarted,
    /// Waiting is only meaningful for threads this object started itself.
    #[error("Thread is not owned by this handle")]
    NotOwned,
    /// The wait came from the thread itself and could never be satisfied.
    #[error("Thread cannot wait on itself")]
    WouldDeadlock,
    /// The delegate panicked; the thread still reached `Stopped`.
    #[error("Thread panicked")]
    Panicked,
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Barrier,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        thread as os_thread,
    };

    use super::*;
    use crate::current;

    #[test]
    fn wait_reaps_and_is_idempotent() {
        let thread = Thread::new(|| {});
        thread.start().unwrap();
        thread.wait().unwrap();
        thread.wait().unwrap();
        assert_eq!(thread.status(), ThreadStatus::Stopped);
        assert_eq!(thread.id(), None);
    }

    #[test]
    fn wait_before_start_is_an_invalid_operation() {
        let thread = Thread::new(|| {});
        assert!(matches!(thread.wait(), Err(WaitError::NotStarted)));
        assert!(matches!(thread.try_wait(), Err(WaitError::NotStarted)));
        assert!(matches!(
            thread.wait_timeout(Duration::from_millis(1)),
            Err(WaitError::NotStarted)
        ));
    }

    #[test]
    fn waits_on_a_non_owned_wrapper_fail_fast() {
        let wrapper = current();
        assert!(!wrapper.owns_thread());
        assert!(matches!(wrapper.wait(), Err(WaitError::NotOwned)));
        assert!(matches!(wrapper.try_wait(), Err(WaitError::NotOwned)));
        assert!(matches!(
            wrapper.wait_timeout(Duration::from_millis(1)),
            Err(WaitError::NotOwned)
        ));
        assert!(matches!(
            wrapper.wait_deadline(Instant::now()),
            Err(WaitError::NotOwned)
        ));
    }

    #[test]
    fn a_thread_waiting_on_itself_fails_fast() {
        let thread = Thread::new(|| {
            let own = current();
            assert!(own.owns_thread());
            assert!(matches!(own.wait(), Err(WaitError::WouldDeadlock)));
            assert!(matches!(own.try_wait(), Err(WaitError::WouldDeadlock)));
            assert!(matches!(
                own.wait_timeout(Duration::from_secs(10)),
                Err(WaitError::WouldDeadlock)
            ));
            assert!(matches!(
                own.wait_deadline(Instant::now()),
                Err(WaitError::WouldDeadlock)
            ));
        });
        thread.start().unwrap();
        // The delegate returns promptly instead of hanging on itself; a
        // failed assertion inside it would surface here as `Panicked`.
        assert!(thread.wait_timeout(Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn a_bounded_wait_expires_while_the_thread_runs() {
        let release = Arc::new(AtomicBool::new(false));
        let thread = {
            let release = Arc::clone(&release);
            Thread::new(move || {
                while !release.load(Ordering::SeqCst) {
                    os_thread::yield_now();
                }
            })
        };

        thread.start().unwrap();
        assert!(!thread.wait_timeout(Duration::from_millis(50)).unwrap());
        assert_eq!(thread.status(), ThreadStatus::Started);

        release.store(true, Ordering::SeqCst);
        assert!(thread.wait_timeout(Duration::from_secs(10)).unwrap());
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn try_wait_reports_the_instantaneous_state() {
        let release = Arc::new(AtomicBool::new(false));
        let thread = {
            let release = Arc::clone(&release);
            Thread::new(move || {
                while !release.load(Ordering::SeqCst) {
                    os_thread::yield_now();
                }
            })
        };

        thread.start().unwrap();
        assert!(!thread.try_wait().unwrap());

        release.store(true, Ordering::SeqCst);
        thread.wait().unwrap();
        assert!(thread.try_wait().unwrap());
    }

    #[test]
    fn concurrent_waiters_all_unblock() {
        const WAITERS: usize = 4;

        let release = Arc::new(AtomicBool::new(false));
        let thread = {
            let release = Arc::clone(&release);
            Thread::new(move || {
                while !release.load(Ordering::SeqCst) {
                    os_thread::yield_now();
                }
            })
        };
        thread.start().unwrap();

        let ready = Arc::new(Barrier::new(WAITERS + 1));
        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..WAITERS)
            .map(|_| {
                let thread = thread.clone();
                let ready = Arc::clone(&ready);
                let done = Arc::clone(&done);
                os_thread::spawn(move || {
                    ready.wait();
                    thread.wait().unwrap();
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        ready.wait();
        release.store(true, Ordering::SeqCst);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), WAITERS);
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn a_panicking_delegate_is_reported_once_and_still_stops() {
        let thread = Thread::new(|| panic!("delegate failure"));
        thread.start().unwrap();

        assert!(matches!(thread.wait(), Err(WaitError::Panicked)));
        assert_eq!(thread.status(), ThreadStatus::Stopped);
        // The reaping wait consumed the panic; later waits see a clean stop.
        thread.wait().unwrap();
    }

    #[test]
    fn wait_deadline_in_the_past_expires_immediately_on_a_live_thread() {
        let release = Arc::new(AtomicBool::new(false));
        let thread = {
            let release = Arc::clone(&release);
            Thread::new(move || {
                while !release.load(Ordering::SeqCst) {
                    os_thread::yield_now();
                }
            })
        };
        thread.start().unwrap();

        assert!(!thread.wait_deadline(Instant::now()).unwrap());

        release.store(true, Ordering::SeqCst);
        thread.wait().unwrap();
    }
}
