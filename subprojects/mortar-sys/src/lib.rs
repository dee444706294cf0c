//! # mortar-sys
//!
//! A thin wrapper around the platform's native threading primitives.
//!
//! Each safe wrapper maps almost one-to-one to its underlying OS call while
//! translating raw error codes into strongly typed Rust error enums. The
//! operations that take a thread id are `unsafe`: POSIX leaves every use of
//! an id undefined once its thread has been reaped, so the caller must pin
//! the target's lifetime (see the per-function safety contracts).
//!
//! On non-unix targets the posix-only operations report their `NotSupported`
//! variant and [`ThreadId`] degrades to a process-unique counter, so the
//! crates layered on top build everywhere.

pub mod thread;

pub use thread::*;
