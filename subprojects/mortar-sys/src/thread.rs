//! Native thread identity, signal delivery, and scheduling parameters.

use std::io;

#[cfg(unix)]
type RawId = libc::pthread_t;
#[cfg(not(unix))]
type RawId = u64;

/// Identifier of a native OS thread.
///
/// A `ThreadId` is a plain value: copying it duplicates the handle and every
/// copy refers to the same thread. The OS may recycle the id of a reaped
/// thread, so a `ThreadId` on its own proves nothing about liveness.
#[derive(Clone, Copy, Debug)]
pub struct ThreadId(RawId);

impl ThreadId {
    /// Wraps a raw OS-level id obtained elsewhere (for instance from a
    /// join handle).
    pub fn from_raw(raw: RawId) -> Self {
        Self(raw)
    }

    /// Returns the raw OS-level id.
    pub fn as_raw(self) -> RawId {
        self.0
    }
}

// `pthread_t` is a pointer type on some platforms; the id is only ever
// handed back to the OS, never dereferenced.
unsafe impl Send for ThreadId {}
unsafe impl Sync for ThreadId {}

impl PartialEq for ThreadId {
    #[cfg(unix)]
    fn eq(&self, other: &Self) -> bool {
        // POSIX only guarantees comparison through pthread_equal.
        unsafe { libc::pthread_equal(self.0, other.0) != 0 }
    }

    #[cfg(not(unix))]
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for ThreadId {}

impl std::hash::Hash for ThreadId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // On every supported target the raw id is an integral type whose
        // `==` agrees with `pthread_equal`, so hashing the bits is
        // consistent with `Eq`.
        (self.0 as u64).hash(state);
    }
}

/// Returns the identifier of the calling thread.
pub fn current() -> ThreadId {
    #[cfg(unix)]
    {
        ThreadId(unsafe { libc::pthread_self() })
    }
    #[cfg(not(unix))]
    {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        thread_local! {
            static SELF_ID: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
        }
        ThreadId(SELF_ID.with(|id| *id))
    }
}

/// Delivers `signal` to the thread identified by `id`.
///
/// Signal `0` performs the usual existence probe: nothing is delivered but
/// error checking still takes place.
///
/// # Safety
///
/// The caller must guarantee the target thread is alive, or joinable and
/// not yet joined, for the whole duration of the call. Passing the id of a
/// reaped thread is undefined behavior per POSIX.
#[cfg(unix)]
pub unsafe fn kill(id: ThreadId, signal: i32) -> Result<(), KillError> {
    // pthread functions return the error code directly, not via errno.
    match unsafe { libc::pthread_kill(id.0, signal) } {
        0 => Ok(()),
        libc::ESRCH => Err(KillError::NoSuchThread),
        libc::EINVAL => Err(KillError::InvalidSignal),
        code => Err(KillError::Os(io::Error::from_raw_os_error(code))),
    }
}

/// Delivers `signal` to the thread identified by `id`.
///
/// # Safety
///
/// See the unix implementation; this fallback has no requirements and
/// always fails with [`KillError::NotSupported`].
#[cfg(not(unix))]
pub unsafe fn kill(_id: ThreadId, _signal: i32) -> Result<(), KillError> {
    Err(KillError::NotSupported)
}

#[derive(Debug, thiserror::Error)]
pub enum KillError {
    /// No thread with the given id could be found — `ESRCH`.
    #[error("No such thread")]
    NoSuchThread,
    /// The signal number is invalid — `EINVAL`.
    #[error("Invalid signal number")]
    InvalidSignal,
    /// The target platform has no per-thread signal delivery.
    #[error("Not supported on this platform")]
    NotSupported,
    /// Any unforeseen OS error, preserved for diagnostics.
    #[error("OS error: {0}")]
    Os(io::Error),
}

/// Replaces the scheduling priority of the thread identified by `id`.
///
/// Reads the thread's live scheduling parameters, substitutes the priority
/// and writes them back, leaving the scheduling policy itself unchanged.
/// Valid priority values depend on the active policy (under `SCHED_OTHER`
/// on Linux only `0` is accepted); out-of-range values surface as
/// [`SetPriorityError::InvalidPriority`].
///
/// # Safety
///
/// Same liveness contract as [`kill`]: the target thread must be alive, or
/// joinable and not yet joined, for the whole duration of the call.
#[cfg(unix)]
pub unsafe fn set_priority(id: ThreadId, priority: i32) -> Result<(), SetPriorityError> {
    let mut policy = 0;
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    match unsafe { libc::pthread_getschedparam(id.0, &mut policy, &mut param) } {
        0 => {}
        libc::ESRCH => return Err(SetPriorityError::NoSuchThread),
        code => return Err(SetPriorityError::Os(io::Error::from_raw_os_error(code))),
    }

    param.sched_priority = priority;
    match unsafe { libc::pthread_setschedparam(id.0, policy, &param) } {
        0 => Ok(()),
        libc::ESRCH => Err(SetPriorityError::NoSuchThread),
        libc::EINVAL => Err(SetPriorityError::InvalidPriority),
        libc::EPERM => Err(SetPriorityError::PermissionDenied),
        code => Err(SetPriorityError::Os(io::Error::from_raw_os_error(code))),
    }
}

/// Replaces the scheduling priority of the thread identified by `id`.
///
/// # Safety
///
/// See the unix implementation; this fallback has no requirements and
/// always fails with [`SetPriorityError::NotSupported`].
#[cfg(not(unix))]
pub unsafe fn set_priority(_id: ThreadId, _priority: i32) -> Result<(), SetPriorityError> {
    Err(SetPriorityError::NotSupported)
}

#[derive(Debug, thiserror::Error)]
pub enum SetPriorityError {
    /// No thread with the given id could be found — `ESRCH`.
    #[error("No such thread")]
    NoSuchThread,
    /// The priority is outside the range of the thread's scheduling policy —
    /// `EINVAL`.
    #[error("Invalid priority for the active scheduling policy")]
    InvalidPriority,
    /// The process lacks the privilege to apply the parameters — `EPERM`.
    #[error("Permission denied")]
    PermissionDenied,
    /// The target platform exposes no per-thread scheduling control.
    #[error("Not supported on this platform")]
    NotSupported,
    /// Any unforeseen OS error, preserved for diagnostics.
    #[error("OS error: {0}")]
    Os(io::Error),
}
