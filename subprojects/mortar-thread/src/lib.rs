//! # mortar-thread
//!
//! Native thread lifecycle behind a cheaply cloneable handle.
//!
//! ## Design highlights
//! 1. **Shared inner state** — a [`Thread`] is an `Arc` around the state an
//!    OS thread and its observers need to share: the unit of work, the
//!    status gate, the native handle, and the stop flag. The clone moved
//!    into the worker keeps that state alive however early the spawning
//!    side drops its handles.
//! 2. **Status gate** — lifecycle transitions flow through a
//!    [`ConditionLock`](mortar_sync::ConditionLock) holding a
//!    [`ThreadStatus`]. The worker's exit hook publishes `Stopped` on every
//!    termination path, which is what unblocks the `wait` family.
//! 3. **Cooperative cancellation** — [`Thread::stop`] raises a flag that
//!    [`yield_stop`] checkpoints poll; a pending request unwinds the worker
//!    to its exit hook. There is no forced OS-level cancellation.
//! 4. **Current-thread registry** — every worker registers its own handle
//!    in per-thread storage before running its delegate; [`current()`]
//!    lazily registers a non-owned wrapper on threads this crate did not
//!    spawn.

mod cancel;
mod current;
mod handle;
mod signal;
mod sleep;
mod start;
mod status;
mod wait;

pub use cancel::{exit, yield_stop};
pub use current::current;
pub use handle::{ConfigError, PriorityError, Thread, ThreadDelegate};
pub use mortar_sys::ThreadId;
pub use signal::SignalError;
pub use sleep::{hardware_concurrency, sleep, sleep_until, yield_now};
pub use start::StartError;
pub use status::ThreadStatus;
pub use wait::WaitError;
