//! Per-thread registry mapping the calling thread to its [`Thread`] object.
//!
//! Threads started through [`Thread::start`] register themselves before the
//! delegate runs, so [`current`] hands back the same shared state the
//! spawner holds. Any other thread gets a lazily created non-owned wrapper
//! around its native id, cached for subsequent calls.

use std::sync::LazyLock;

use mortar_sys as sys;
use mortar_tls::ThreadLocalStorage;

use crate::handle::Thread;

static CURRENT: LazyLock<ThreadLocalStorage<Thread>> = LazyLock::new(ThreadLocalStorage::new);

/// Returns the [`Thread`] object for the calling thread.
///
/// Calls from the same thread always observe the same underlying state.
pub fn current() -> Thread {
    if let Some(thread) = CURRENT.get() {
        return thread;
    }
    let wrapper = Thread::observed(sys::current());
    CURRENT.set(wrapper.clone());
    wrapper
}

/// Binds `thread` to the calling thread. Runs on the new thread itself,
/// before its delegate.
pub(crate) fn register(thread: Thread) {
    CURRENT.set(thread);
}

/// Applies `f` to the calling thread's registered [`Thread`] without
/// cloning, or returns `None` if nothing is registered yet.
pub(crate) fn with_current<R>(f: impl FnOnce(&Thread) -> R) -> Option<R> {
    CURRENT.with(f)
}
