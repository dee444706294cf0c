//! Scheduling primitives for the calling thread.

use std::{
    num::NonZeroUsize,
    thread,
    time::{Duration, Instant},
};

/// Puts the calling thread to sleep for at least `duration`.
pub fn sleep(duration: Duration) {
    thread::sleep(duration);
}

/// Puts the calling thread to sleep until `deadline` has passed. A
/// deadline already in the past returns immediately.
pub fn sleep_until(deadline: Instant) {
    if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        thread::sleep(remaining);
    }
}

/// Yields the calling thread's remaining timeslice to the scheduler.
pub fn yield_now() {
    thread::yield_now();
}

/// Number of hardware threads available to the process, or `1` when the
/// platform will not say.
pub fn hardware_concurrency() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
