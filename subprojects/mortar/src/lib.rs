//! # mortar

#[cfg(feature = "sync")]
pub mod sync {
    pub use mortar_sync::*;
}
#[cfg(feature = "thread")]
pub mod thread {
    pub use mortar_thread::*;
}
#[cfg(feature = "tls")]
pub mod tls {
    pub use mortar_tls::*;
}

#[cfg(feature = "sys")]
pub mod sys {
    pub use mortar_sys as thread;
}
