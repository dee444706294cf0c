//! Delivering POSIX signals to an owned thread.

use std::io;

use mortar_sys as sys;

use crate::handle::Thread;

impl Thread {
    /// Sends `signal` to the running thread.
    ///
    /// Only threads started by this object can be signalled, and only
    /// while their join handle is still held: the native lock is kept
    /// across the send so the thread cannot be reaped mid-call, which
    /// keeps its id valid. Signal `0` probes for existence without
    /// delivering anything.
    pub fn signal(&self, signal: i32) -> Result<(), SignalError> {
        if !self.inner.owned {
            return Err(SignalError::NotOwned);
        }
        let native = self.inner.native();
        let id = match native.id {
            Some(id) if native.join.is_some() => id,
            _ => return Err(SignalError::NotStarted),
        };
        // SAFETY: `id` belongs to a joinable thread and the held lock
        // prevents any concurrent `wait` from joining it.
        unsafe { sys::kill(id, signal) }?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Signalling is only allowed for threads this object started itself.
    #[error("Thread is not owned by this handle")]
    NotOwned,
    /// The thread is not running, so there is no target to signal.
    #[error("Thread is not running")]
    NotStarted,
    /// The thread terminated between status check and delivery.
    #[error("Thread no longer exists")]
    NoSuchThread,
    /// The signal number is not valid on this system.
    #[error("Invalid signal number")]
    InvalidSignal,
    /// The platform cannot deliver signals to threads.
    #[error("Thread signals are not supported on this platform")]
    NotSupported,
    /// Some other error reported by the OS.
    #[error("Signal delivery failed: {0}")]
    Os(io::Error),
}

impl From<sys::KillError> for SignalError {
    fn from(err: sys::KillError) -> Self {
        match err {
            sys::KillError::NoSuchThread => Self::NoSuchThread,
            sys::KillError::InvalidSignal => Self::InvalidSignal,
            sys::KillError::NotSupported => Self::NotSupported,
            sys::KillError::Os(err) => Self::Os(err),
        }
    }
}
