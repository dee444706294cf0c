//! Spawning the OS thread.

use std::{
    io,
    panic::{self, AssertUnwindSafe},
    thread,
};

use mortar_sys as sys;

use crate::{
    cancel::{ExitRequested, StopRequested},
    current,
    handle::Thread,
    status::ThreadStatus,
};

impl Thread {
    /// Spawns the OS thread and runs the configured delegate on it.
    ///
    /// The status gate reads `Started` from the moment this call commits to
    /// spawning. On an OS-level spawn failure the status reverts to
    /// `Initialized` and the delegate stays configured, so the caller may
    /// retry. A successful start is permanent: a `Thread` can only ever be
    /// started once, and a fresh instance is needed to run the work again.
    pub fn start(&self) -> Result<(), StartError> {
        let mut native = self.inner.native();
        if native.spawned || native.id.is_some() {
            return Err(StartError::AlreadyStarted);
        }
        if self.inner.delegate_slot().is_none() {
            return Err(StartError::NoDelegate);
        }

        // Published before the OS thread exists; reverted on failure. The
        // native lock is held throughout, so no waiter can act on the
        // transient value.
        self.inner
            .status
            .lock()
            .unlock_with(ThreadStatus::Started.as_condition());

        let mut builder = thread::Builder::new();
        if native.stack_size != 0 {
            builder = builder.stack_size(native.stack_size);
        }

        let worker = self.clone();
        match builder.spawn(move || trampoline(worker)) {
            Ok(handle) => {
                native.id = native_id(&handle);
                native.join = Some(handle);
                native.spawned = true;
                Ok(())
            }
            Err(err) => {
                self.inner
                    .status
                    .lock()
                    .unlock_with(ThreadStatus::Initialized.as_condition());
                Err(StartError::Os(err))
            }
        }
    }
}

/// Body of every spawned thread.
///
/// Registers the worker-side handle as the current thread object, runs the
/// delegate, and publishes `Stopped` through the exit hook on every
/// termination path: normal return, cooperative stop, [`exit`], and panic.
/// A genuine panic is re-raised afterwards so joining observes it.
///
/// [`exit`]: crate::exit
fn trampoline(thread: Thread) {
    current::register(thread.clone());

    let delegate = thread.inner.delegate_slot().take();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(delegate) = delegate {
            delegate();
        }
    }));

    // The exit hook. Unblocks every waiter, whatever got us here.
    thread
        .inner
        .status
        .lock()
        .unlock_with(ThreadStatus::Stopped.as_condition());

    if let Err(payload) = outcome {
        if payload.is::<StopRequested>() || payload.is::<ExitRequested>() {
            // Clean cooperative termination.
            return;
        }
        panic::resume_unwind(payload);
    }
}

#[cfg(unix)]
fn native_id(handle: &thread::JoinHandle<()>) -> Option<sys::ThreadId> {
    use std::os::unix::thread::JoinHandleExt;

    Some(sys::ThreadId::from_raw(handle.as_pthread_t()))
}

#[cfg(not(unix))]
fn native_id(_handle: &thread::JoinHandle<()>) -> Option<sys::ThreadId> {
    None
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The thread has already been started; a `Thread` runs exactly once.
    #[error("Thread already started")]
    AlreadyStarted,
    /// No unit of work is configured.
    #[error("No delegate configured")]
    NoDelegate,
    /// The OS refused to spawn the thread.
    #[error("OS error: {0}")]
    Os(io::Error),
}
