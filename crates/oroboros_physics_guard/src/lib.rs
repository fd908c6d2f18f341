//! # OROBOROS Physics Guard
//!
//! Debug-time concurrency safety for the multithreaded physics step:
//! - **Lock ordering**: a fixed hierarchy of physics locks, verified on every
//!   acquisition, per thread and per physics system
//! - **Body access rights**: scoped grants of read / read-write access to body
//!   velocities and positions, asserted before body state is touched
//!
//! ## Build Configuration
//!
//! Everything here is switched by the `diagnostics` Cargo feature (on by
//! default). Production builds use `default-features = false`: the public
//! API keeps the same shape, guards shrink to the bare lock reference, and
//! every check compiles away.
//!
//! Violations are programming errors. They are logged through `tracing` and
//! then panic, which aborts under the workspace profiles.
//!
//! ## Example
//!
//! ```rust,ignore
//! use oroboros_physics_guard::{
//!     AccessKind, AccessLevel, BodyAccess, LockContext, LockRole, SharedLock, UniqueLock,
//! };
//!
//! let context = LockContext::new();
//! let access = BodyAccess::new(context);
//!
//! let _query = SharedLock::new(&broad_phase, context, LockRole::BroadPhaseQuery);
//! let _body = UniqueLock::new(&body_mutex, context, LockRole::PerBody);
//!
//! // Broadphase is reading positions: velocities only from here on.
//! let _grant = access.grant(AccessLevel::ReadWrite, AccessLevel::Read);
//! access.assert_rights(AccessKind::Velocity, AccessLevel::ReadWrite);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod access;
pub mod context;
pub mod error;
pub mod lock;
pub mod role;

pub use access::{check_rights, AccessKind, AccessLevel, BodyAccess, Grant};
pub use context::LockContext;
pub use error::{AccessViolation, LockOrderViolation};
pub use lock::{Lockable, PhysicsLock, SharedLock, SharedLockable, UniqueLock};
pub use role::{LockRole, LockRoleSet};

#[cfg(feature = "diagnostics")]
pub use context::ThreadKey;
#[cfg(feature = "diagnostics")]
pub use lock::HeldLocks;

/// True when lock-order and access-right checks are compiled in.
pub const DIAGNOSTICS_ENABLED: bool = cfg!(feature = "diagnostics");
