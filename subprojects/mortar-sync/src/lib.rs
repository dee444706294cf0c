//! # mortar-sync
//!
//! Condition-gated locking for coordinating thread state machines.
//!
//! The crate provides [`ConditionLock`], a mutex fused with a condition
//! variable around a single integer "condition". Callers acquire the lock
//! unconditionally or block until the condition reaches a target value, and
//! release it either unchanged or atomically publishing a new condition to
//! every waiter. The primitive is deliberately generic: any subsystem that
//! funnels state transitions through a small integer can use it, thread
//! lifecycle tracking being the motivating case.

mod condition_lock;

pub use condition_lock::{ConditionGuard, ConditionLock};
