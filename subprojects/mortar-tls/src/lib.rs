//! # mortar-tls
//!
//! Keyed per-thread storage with automatic thread-exit teardown.
//!
//! [`ThreadLocalStorage`] gives each instance a process-unique slot and each
//! thread its own independent value for that slot. Unlike `thread_local!`,
//! instances can be created at runtime in any number and carry a type chosen
//! by the caller, which is what a "current thread object" registry needs.

mod storage;

pub use storage::ThreadLocalStorage;
