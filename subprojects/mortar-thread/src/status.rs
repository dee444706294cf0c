//! Thread lifecycle states.

/// Lifecycle state of a [`Thread`](crate::Thread).
///
/// States only ever advance: `None`/`Initialized` before the spawn,
/// `Started` while the OS thread runs, `Stopped` once it has terminated.
/// `Stopped` is terminal; restarting requires a new `Thread`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    /// No unit of work has been configured yet.
    None = 0,
    /// Configured and ready to start.
    Initialized = 1,
    /// The OS thread is running (or has been observed running).
    Started = 2,
    /// The thread has terminated.
    Stopped = 3,
}

impl ThreadStatus {
    /// The status as a condition value for the status gate.
    pub(crate) fn as_condition(self) -> i32 {
        self as i32
    }

    /// Total inverse of [`as_condition`]; values outside the lifecycle read
    /// as `Stopped`, which can only arise from out-of-crate writes to a
    /// shared gate.
    ///
    /// [`as_condition`]: ThreadStatus::as_condition
    pub(crate) fn from_condition(condition: i32) -> Self {
        match condition {
            0 => Self::None,
            1 => Self::Initialized,
            2 => Self::Started,
            _ => Self::Stopped,
        }
    }
}
