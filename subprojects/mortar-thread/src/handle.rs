//! The thread handle and its shared inner state.

use std::{
    fmt, io,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::AtomicBool,
    },
    thread::JoinHandle,
};

use mortar_sync::ConditionLock;
use mortar_sys as sys;

use crate::status::ThreadStatus;

/// The unit of work a thread runs.
pub type ThreadDelegate = Box<dyn FnOnce() + Send + 'static>;

/// Handle to one logical thread.
///
/// Cloning is cheap and every clone refers to the same thread: the clone
/// moved into the worker, the handle kept by the spawner, and the handle
/// returned by [`current()`](crate::current()) on the worker all share one
/// inner state. Dropping the last handle of a running thread detaches it;
/// the OS thread keeps running and cleans up after itself.
#[derive(Clone)]
pub struct Thread {
    pub(crate) inner: Arc<ThreadInner>,
}

pub(crate) struct ThreadInner {
    /// Unit of work; present until the worker takes it at startup.
    pub(crate) delegate: Mutex<Option<ThreadDelegate>>,
    /// Lifecycle gate holding a [`ThreadStatus`] condition.
    pub(crate) status: ConditionLock,
    pub(crate) native: Mutex<NativeState>,
    /// Cooperative stop request, polled at `yield_stop` checkpoints.
    pub(crate) cancel: AtomicBool,
    /// True when this object created and controls the OS thread.
    pub(crate) owned: bool,
}

pub(crate) struct NativeState {
    pub(crate) join: Option<JoinHandle<()>>,
    pub(crate) id: Option<sys::ThreadId>,
    /// Set once a spawn has succeeded; never cleared.
    pub(crate) spawned: bool,
    /// Requested stack size in bytes; `0` keeps the platform default.
    pub(crate) stack_size: usize,
    /// Last requested scheduling priority.
    pub(crate) priority: i32,
}

impl ThreadInner {
    /// Locks the native state. Acquired before the delegate slot wherever
    /// both are needed; never acquired while a status-gate guard is held.
    pub(crate) fn native(&self) -> MutexGuard<'_, NativeState> {
        self.native.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn delegate_slot(&self) -> MutexGuard<'_, Option<ThreadDelegate>> {
        self.delegate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Thread {
    /// Creates a thread that will run `delegate` once [`start`]ed.
    ///
    /// [`start`]: Thread::start
    pub fn new(delegate: impl FnOnce() + Send + 'static) -> Self {
        Self::with_parts(Some(Box::new(delegate)), true, None)
    }

    /// Creates a thread with no unit of work yet; supply one with
    /// [`set_delegate`] before starting.
    ///
    /// [`set_delegate`]: Thread::set_delegate
    pub fn unconfigured() -> Self {
        Self::with_parts(None, true, None)
    }

    /// Wraps a thread this crate did not spawn. Carries no lifecycle
    /// control; it reports `Started` while its native id is known.
    pub(crate) fn observed(id: sys::ThreadId) -> Self {
        Self::with_parts(None, false, Some(id))
    }

    fn with_parts(
        delegate: Option<ThreadDelegate>,
        owned: bool,
        id: Option<sys::ThreadId>,
    ) -> Self {
        Self {
            inner: Arc::new(ThreadInner {
                delegate: Mutex::new(delegate),
                status: ConditionLock::new(ThreadStatus::Initialized.as_condition()),
                native: Mutex::new(NativeState {
                    join: None,
                    id,
                    spawned: false,
                    stack_size: 0,
                    priority: 0,
                }),
                cancel: AtomicBool::new(false),
                owned,
            }),
        }
    }

    /// Replaces the unit of work. Fails once the thread has started.
    pub fn set_delegate(
        &self,
        delegate: impl FnOnce() + Send + 'static,
    ) -> Result<(), ConfigError> {
        let native = self.inner.native();
        if native.spawned || native.id.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        *self.inner.delegate_slot() = Some(Box::new(delegate));
        Ok(())
    }

    /// Requests a stack size for the future OS thread. `0` restores the
    /// platform default. Fails once the thread has started.
    pub fn set_stack_size(&self, bytes: usize) -> Result<(), ConfigError> {
        let mut native = self.inner.native();
        if native.spawned || native.id.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        native.stack_size = bytes;
        Ok(())
    }

    /// The configured stack size request (`0` means platform default).
    pub fn stack_size(&self) -> usize {
        self.inner.native().stack_size
    }

    /// The last requested scheduling priority.
    pub fn priority(&self) -> i32 {
        self.inner.native().priority
    }

    /// Records `priority` and, when the thread is live, reconfigures the
    /// OS-level scheduling parameters immediately.
    ///
    /// The live reconfiguration is only performed where it is sound: on a
    /// thread this handle owns and has not yet reaped, or by a thread
    /// adjusting itself. A non-owned wrapper for another live thread fails
    /// with [`PriorityError::NotOwned`] instead. OS rejections (priority out
    /// of range for the active policy, missing privilege) are surfaced, not
    /// swallowed.
    pub fn set_priority(&self, priority: i32) -> Result<(), PriorityError> {
        let mut native = self.inner.native();
        native.priority = priority;

        let Some(id) = native.id else {
            // Not live anywhere; the request is recorded only.
            return Ok(());
        };

        // Holding the native lock keeps the join handle in place, so an
        // owned thread cannot be reaped out from under the call.
        let pinned = self.inner.owned && native.join.is_some();
        if pinned || id == sys::current() {
            unsafe { sys::set_priority(id, priority) }?;
            Ok(())
        } else if self.inner.owned {
            // Already finished (or mid-join elsewhere): recorded only.
            Ok(())
        } else {
            Err(PriorityError::NotOwned)
        }
    }

    /// Returns `true` when this object created and controls the OS thread.
    pub fn owns_thread(&self) -> bool {
        self.inner.owned
    }

    /// The native id, while one is known.
    ///
    /// Owned threads report an id from spawn until they are reaped by one
    /// of the `wait` forms; non-owned wrappers keep theirs forever.
    pub fn id(&self) -> Option<sys::ThreadId> {
        self.inner.native().id
    }

    /// The current lifecycle status.
    ///
    /// Owned threads report `None`/`Initialized` before the spawn depending
    /// on whether a delegate is configured, then track the status gate.
    /// Non-owned wrappers report `Started` while their native id is known
    /// and `Stopped` otherwise; the gate is not consulted.
    pub fn status(&self) -> ThreadStatus {
        if self.inner.owned {
            let native = self.inner.native();
            if !native.spawned {
                if self.inner.delegate_slot().is_some() {
                    ThreadStatus::Initialized
                } else {
                    ThreadStatus::None
                }
            } else {
                ThreadStatus::from_condition(self.inner.status.condition())
            }
        } else if self.inner.native().id.is_some() {
            ThreadStatus::Started
        } else {
            ThreadStatus::Stopped
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("status", &self.status())
            .field("owned", &self.inner.owned)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Launch-time configuration is frozen once the thread has started.
    #[error("Thread already started")]
    AlreadyStarted,
}

#[derive(Debug, thiserror::Error)]
pub enum PriorityError {
    /// Live reconfiguration of somebody else's thread is not permitted.
    #[error("Thread is not owned by this handle")]
    NotOwned,
    /// No thread with the stored id could be found.
    #[error("No such thread")]
    NoSuchThread,
    /// The priority is outside the range of the active scheduling policy.
    #[error("Invalid priority for the active scheduling policy")]
    InvalidPriority,
    /// The process lacks the privilege to apply the parameters.
    #[error("Permission denied")]
    PermissionDenied,
    /// The target platform exposes no per-thread scheduling control.
    #[error("Not supported on this platform")]
    NotSupported,
    /// Any unforeseen OS error, preserved for diagnostics.
    #[error("OS error: {0}")]
    Os(io::Error),
}

impl From<sys::SetPriorityError> for PriorityError {
    fn from(err: sys::SetPriorityError) -> Self {
        match err {
            sys::SetPriorityError::NoSuchThread => Self::NoSuchThread,
            sys::SetPriorityError::InvalidPriority => Self::InvalidPriority,
            sys::SetPriorityError::PermissionDenied => Self::PermissionDenied,
            sys::SetPriorityError::NotSupported => Self::NotSupported,
            sys::SetPriorityError::Os(err) => Self::Os(err),
        }
    }
}
