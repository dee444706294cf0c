//! Cooperative cancellation and explicit thread exit.
//!
//! Stopping is a request, not an interruption: [`Thread::stop`] raises a
//! flag, and the target thread acts on it the next time it passes a
//! [`yield_stop`] checkpoint. Acting on it means unwinding to the exit hook
//! with a private sentinel payload, which terminates the thread cleanly
//! without touching the panic hook. [`exit`] uses the same mechanism
//! unconditionally. There is no forced OS-level cancellation: tearing
//! through stack frames from outside cannot be reconciled with
//! destructor-based cleanup, so the checkpoint model is the only stop.

use std::{panic, sync::atomic::Ordering, thread};

use crate::{current, handle::Thread, status::ThreadStatus};

/// Unwind payload of a granted stop request.
pub(crate) struct StopRequested;

/// Unwind payload of an explicit [`exit`].
pub(crate) struct ExitRequested;

impl Thread {
    /// Requests that the thread stop at its next [`yield_stop`] checkpoint.
    ///
    /// Returns immediately; the target has not necessarily acted yet, so a
    /// caller that needs the thread gone still follows up with one of the
    /// `wait` forms. Requests to threads that are not `Started` are simply
    /// dropped, and a request to a thread that never polls a checkpoint has
    /// no effect.
    ///
    /// Works on non-owned wrappers too: their thread polls the shared flag
    /// through its own current-thread handle.
    pub fn stop(&self) {
        if self.status() == ThreadStatus::Started {
            // The flag is the only datum communicated; ordering beyond the
            // store itself is provided by the status gate.
            self.inner.cancel.store(true, Ordering::Relaxed);
        }
    }
}

/// Cancellation checkpoint: honors a pending [`stop`] request.
///
/// When a request is pending for the calling thread, unwinds to the
/// thread's exit hook and never returns; otherwise returns immediately.
/// On a thread this crate did not spawn there is no exit hook, and the
/// unwind propagates like a panic.
///
/// A checkpoint reached while the stack is already unwinding is inert, so
/// destructors that run as part of a granted stop (or any panic) can poll
/// without starting a second unwind.
///
/// [`stop`]: Thread::stop
pub fn yield_stop() {
    // Already unwinding: the stop or panic in flight keeps going.
    if thread::panicking() {
        return;
    }
    let pending = current::with_current(|thread| thread.inner.cancel.load(Ordering::Relaxed));
    if pending == Some(true) {
        panic::resume_unwind(Box::new(StopRequested));
    }
}

/// Terminates the calling thread immediately.
///
/// Unwinds to the thread's exit hook; code after the call never runs, and
/// the thread still publishes `Stopped` to its waiters. On a thread this
/// crate did not spawn there is no exit hook, and the unwind propagates
/// like a panic.
pub fn exit() -> ! {
    panic::resume_unwind(Box::new(ExitRequested))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::yield_now;

    #[test]
    fn a_stopped_worker_leaves_its_loop_at_a_checkpoint() {
        let iterations = Arc::new(AtomicUsize::new(0));
        let thread = {
            let iterations = Arc::clone(&iterations);
            Thread::new(move || {
                loop {
                    yield_stop();
                    iterations.fetch_add(1, Ordering::SeqCst);
                    yield_now();
                }
            })
        };

        thread.start().unwrap();
        // Let the loop make progress before asking it to stop.
        while iterations.load(Ordering::SeqCst) == 0 {
            yield_now();
        }

        thread.stop();
        thread.wait().unwrap();
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn a_request_before_the_first_checkpoint_still_stops() {
        let gate = Arc::new(AtomicBool::new(false));
        let past_checkpoint = Arc::new(AtomicBool::new(false));
        let thread = {
            let gate = Arc::clone(&gate);
            let past_checkpoint = Arc::clone(&past_checkpoint);
            Thread::new(move || {
                while !gate.load(Ordering::SeqCst) {
                    yield_now();
                }
                yield_stop();
                past_checkpoint.store(true, Ordering::SeqCst);
            })
        };

        thread.start().unwrap();
        thread.stop();
        gate.store(true, Ordering::SeqCst);
        thread.wait().unwrap();

        assert!(!past_checkpoint.load(Ordering::SeqCst));
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn a_destructor_checkpoint_does_not_disturb_a_granted_stop() {
        struct Checkpointing(Arc<AtomicBool>);
        impl Drop for Checkpointing {
            fn drop(&mut self) {
                // Runs while the stop is unwinding; must not unwind again.
                yield_stop();
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let cleaned_up = Arc::new(AtomicBool::new(false));
        let thread = {
            let cleaned_up = Arc::clone(&cleaned_up);
            Thread::new(move || {
                let _guard = Checkpointing(cleaned_up);
                loop {
                    yield_stop();
                    yield_now();
                }
            })
        };

        thread.start().unwrap();
        thread.stop();
        assert!(thread.wait_timeout(Duration::from_secs(10)).unwrap());
        assert!(cleaned_up.load(Ordering::SeqCst));
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn stop_after_the_thread_finished_is_a_no_op() {
        let thread = Thread::new(|| {});
        thread.start().unwrap();
        thread.wait().unwrap();
        thread.stop();
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn yield_stop_outside_any_request_returns() {
        yield_stop();
    }

    #[test]
    fn exit_skips_the_rest_of_the_delegate() {
        let after_exit = Arc::new(AtomicBool::new(false));
        let thread = {
            let after_exit = Arc::clone(&after_exit);
            Thread::new(move || {
                exit();
                #[allow(unreachable_code)]
                after_exit.store(true, Ordering::SeqCst);
            })
        };

        thread.start().unwrap();
        thread.wait().unwrap();
        assert!(!after_exit.load(Ordering::SeqCst));
        assert_eq!(thread.status(), ThreadStatus::Stopped);
    }

    #[test]
    fn a_cooperative_stop_completes_within_a_bound() {
        let thread = Thread::new(|| {
            loop {
                yield_stop();
                crate::sleep(Duration::from_millis(1));
            }
        });

        thread.start().unwrap();
        thread.stop();
        assert!(thread.wait_timeout(Duration::from_secs(10)).unwrap());
    }
}
