//! # Physics Lock Ordering
//!
//! Deadlock prevention by hierarchy. Every physics lock is taken under a
//! [`LockRole`](crate::LockRole); within one thread and one
//! [`LockContext`](crate::LockContext), roles must be taken in rank order.
//!
//! ```text
//! Thread 1: BroadPhaseQuery ─► PerBody ─► BodiesList        OK
//! Thread 2: PerBody ─► BroadPhaseQuery                      VIOLATION
//! ```
//!
//! If every thread obeys the same order, no cycle of waiters can form.

mod guard;
mod lockable;
mod sequencer;

#[cfg(feature = "diagnostics")]
mod held;

pub use guard::{SharedLock, UniqueLock};
pub use lockable::{Lockable, SharedLockable};
pub use sequencer::PhysicsLock;

#[cfg(feature = "diagnostics")]
pub use held::HeldLocks;
