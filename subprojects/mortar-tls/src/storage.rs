//! Dynamic per-thread storage slots.
//!
//! ## Design highlights
//! 1. **Process-wide registry** — one mutex-guarded map from thread identity
//!    to that thread's slot values. Thread identity is
//!    [`std::thread::ThreadId`], which is never reused for the lifetime of
//!    the process, so a dead thread's key can never be mistaken for a live
//!    one.
//! 2. **Slot identity** — every [`ThreadLocalStorage`] instance claims an id
//!    from a global atomic counter. Ids are never recycled, so a stale
//!    storage handle cannot alias a newer instance's values.
//! 3. **Teardown** — a thread's values are released by the drop of a
//!    `thread_local!` guard, the language-native per-thread finalizer. It
//!    runs on normal return, on panic, and on cooperative cancellation. The
//!    guard captures the thread's identity when it is created; the identity
//!    is not re-queried during destruction.
//! 4. **Re-entrancy** — values are detached from the registry under the lock
//!    and dropped only after it is released, so a value whose destructor
//!    uses another storage cannot deadlock.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{
        LazyLock, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

type SlotValues = HashMap<u64, Box<dyn Any + Send>>;

/// Map from thread identity to that thread's slot values.
static REGISTRY: LazyLock<Mutex<HashMap<thread::ThreadId, SlotValues>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Next unclaimed slot id. Ids are never recycled.
static NEXT_SLOT: AtomicU64 = AtomicU64::new(0);

fn registry() -> MutexGuard<'static, HashMap<thread::ThreadId, SlotValues>> {
    // A panic while the registry lock was held cannot leave the maps
    // structurally corrupt, so poisoning is ignored.
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    static TEARDOWN: TeardownGuard = TeardownGuard {
        id: thread::current().id(),
    };
}

/// Dropped by the runtime when the owning thread exits.
struct TeardownGuard {
    id: thread::ThreadId,
}

impl TeardownGuard {
    fn ensure(&self) {}
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        // Detach the whole sub-map first; the values' destructors run only
        // after the registry lock has been released.
        let values = registry().remove(&self.id);
        drop(values);
    }
}

/// A storage slot holding one `T` per thread.
///
/// Each thread that calls [`set`] gets its own independent value; no thread
/// can observe another thread's value. A thread's value is released when the
/// thread exits, when it is [`take`]n or overwritten, or when the storage
/// itself is dropped.
///
/// The storage handle is `Send + Sync` and is typically shared behind a
/// `static` or an `Arc`; all operations take `&self`.
///
/// [`set`]: ThreadLocalStorage::set
/// [`take`]: ThreadLocalStorage::take
pub struct ThreadLocalStorage<T> {
    slot: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ThreadLocalStorage<T> {
    /// Creates a storage with a fresh process-unique slot.
    pub fn new() -> Self {
        Self {
            slot: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    /// Stores `value` for the calling thread, dropping any previous value.
    ///
    /// The previous value's destructor runs after the registry lock has been
    /// released.
    pub fn set(&self, value: T) {
        // Force the teardown guard into existence before the value, so the
        // finalizer is in place even when this is the thread's first write.
        // During thread destruction the guard can no longer be created; a
        // value stored that late stays in the registry until process exit.
        let _ = TEARDOWN.try_with(TeardownGuard::ensure);

        let previous = {
            let mut registry = registry();
            registry
                .entry(thread::current().id())
                .or_default()
                .insert(self.slot, Box::new(value) as Box<dyn Any + Send>)
        };
        drop(previous);
    }

    /// Returns a clone of the calling thread's value, if any.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Calls `f` with a borrow of the calling thread's value, if any.
    ///
    /// The registry lock is held while `f` runs: `f` must not call back into
    /// this or any other storage, or it will deadlock.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let registry = registry();
        let value = registry
            .get(&thread::current().id())?
            .get(&self.slot)?
            .downcast_ref::<T>()?;
        Some(f(value))
    }

    /// Returns `true` if the calling thread currently holds a value.
    pub fn has_value(&self) -> bool {
        registry()
            .get(&thread::current().id())
            .is_some_and(|values| values.contains_key(&self.slot))
    }

    /// Removes and returns the calling thread's value, if any.
    pub fn take(&self) -> Option<T> {
        let boxed = {
            let mut registry = registry();
            registry.get_mut(&thread::current().id())?.remove(&self.slot)?
        };
        boxed.downcast::<T>().ok().map(|value| *value)
    }
}

impl<T: Send + 'static> Default for ThreadLocalStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ThreadLocalStorage<T> {
    fn drop(&mut self) {
        // Sweep this slot out of every thread's sub-map. The detached values
        // are dropped after the lock releases, on the thread running this
        // drop; `T: Send` (required to ever insert) makes that sound.
        let mut detached = Vec::new();
        {
            let mut registry = registry();
            for values in registry.values_mut() {
                if let Some(value) = values.remove(&self.slot) {
                    detached.push(value);
                }
            }
        }
        drop(detached);
    }
}

impl<T> fmt::Debug for ThreadLocalStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocalStorage")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    };

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ThreadLocalStorage<u32>: Send, Sync);

    /// Bumps a shared counter when dropped.
    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let storage = ThreadLocalStorage::new();
        assert_eq!(storage.get(), None);
        storage.set(17u32);
        assert_eq!(storage.get(), Some(17));
        assert!(storage.has_value());
    }

    #[test]
    fn with_borrows_without_cloning() {
        struct NotClone(u32);

        let storage = ThreadLocalStorage::new();
        assert_eq!(storage.with(|value: &NotClone| value.0), None);
        storage.set(NotClone(5));
        assert_eq!(storage.with(|value| value.0), Some(5));
    }

    #[test]
    fn take_removes_the_value() {
        let storage = ThreadLocalStorage::new();
        storage.set(String::from("gone"));
        assert_eq!(storage.take().as_deref(), Some("gone"));
        assert!(!storage.has_value());
        assert_eq!(storage.take(), None);
    }

    #[test]
    fn storages_do_not_alias_each_other() {
        let first = ThreadLocalStorage::new();
        let second = ThreadLocalStorage::new();
        first.set(1u32);
        second.set(2u32);
        assert_eq!(first.get(), Some(1));
        assert_eq!(second.get(), Some(2));
    }

    #[test]
    fn threads_see_only_their_own_values() {
        const THREADS: usize = 4;

        let storage = Arc::new(ThreadLocalStorage::new());
        let all_set = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|n| {
                let storage = Arc::clone(&storage);
                let all_set = Arc::clone(&all_set);
                thread::spawn(move || {
                    storage.set(n);
                    // Every thread has written before anyone reads back.
                    all_set.wait();
                    assert_eq!(storage.get(), Some(n));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        // The spawning thread never wrote.
        assert_eq!(storage.get(), None);
    }

    #[test]
    fn overwriting_drops_the_previous_value() {
        let drops = Arc::new(AtomicUsize::new(0));
        let storage = ThreadLocalStorage::new();

        storage.set(DropCounter(Arc::clone(&drops)));
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        storage.set(DropCounter(Arc::clone(&drops)));
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        drop(storage);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn thread_exit_drops_the_thread_values() {
        let drops = Arc::new(AtomicUsize::new(0));
        let storage = Arc::new(ThreadLocalStorage::new());

        let handle = {
            let storage = Arc::clone(&storage);
            let drops = Arc::clone(&drops);
            thread::spawn(move || {
                storage.set(DropCounter(drops));
                assert!(storage.has_value());
            })
        };
        handle.join().unwrap();

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_runs_on_the_exiting_thread() {
        /// Records which thread ran its destructor.
        struct DropProbe(Arc<Mutex<Option<thread::ThreadId>>>);

        impl Drop for DropProbe {
            fn drop(&mut self) {
                let mut slot = self.0.lock().unwrap();
                *slot = Some(thread::current().id());
            }
        }

        let dropped_on = Arc::new(Mutex::new(None));
        let storage = Arc::new(ThreadLocalStorage::new());

        let handle = {
            let storage = Arc::clone(&storage);
            let dropped_on = Arc::clone(&dropped_on);
            thread::spawn(move || {
                storage.set(DropProbe(dropped_on));
                thread::current().id()
            })
        };
        let worker_id = handle.join().unwrap();

        assert_eq!(*dropped_on.lock().unwrap(), Some(worker_id));
    }

    #[test]
    fn teardown_runs_after_a_panic() {
        let drops = Arc::new(AtomicUsize::new(0));
        let storage = Arc::new(ThreadLocalStorage::new());

        let handle = {
            let storage = Arc::clone(&storage);
            let drops = Arc::clone(&drops);
            thread::spawn(move || {
                storage.set(DropCounter(drops));
                panic!("boom");
            })
        };
        assert!(handle.join().is_err());

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_storage_releases_stored_values() {
        let drops = Arc::new(AtomicUsize::new(0));
        let storage = ThreadLocalStorage::new();

        storage.set(DropCounter(Arc::clone(&drops)));
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(storage);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
