//! # Violation Types
//!
//! The two programming errors this crate detects. Neither is recoverable:
//! the enforcing paths log them and then panic, which aborts the process
//! under the workspace's `panic = "abort"` profiles.

use thiserror::Error;

use crate::access::{AccessKind, AccessLevel};
use crate::context::LockContext;
use crate::role::{LockRole, LockRoleSet};

/// A thread tried to take a lock out of hierarchy order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "lock order violation in {context}: cannot acquire {requested} while holding \
     {highest_held} (held: {held})"
)]
pub struct LockOrderViolation {
    /// The physics system the locks belong to.
    pub context: LockContext,
    /// The role that was being acquired.
    pub requested: LockRole,
    /// The highest-ranked role already held.
    pub highest_held: LockRole,
    /// Every role held at the time.
    pub held: LockRoleSet,
}

/// Body state was touched without the required access level.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("access violation in {context}: {kind} access needs {desired}, granted {granted}")]
pub struct AccessViolation {
    /// The physics system whose bodies were touched.
    pub context: LockContext,
    /// Which body state was touched.
    pub kind: AccessKind,
    /// The level the call site needed.
    pub desired: AccessLevel,
    /// The level currently granted.
    pub granted: AccessLevel,
}

#[cfg(feature = "diagnostics")]
impl LockOrderViolation {
    /// Logs the violation and panics.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub(crate) fn raise(self) -> ! {
        tracing::error!(
            context = %self.context,
            requested = %self.requested,
            highest_held = %self.highest_held,
            held = %self.held,
            "lock order violation"
        );
        panic!("{self}");
    }
}

#[cfg(feature = "diagnostics")]
impl AccessViolation {
    /// Logs the violation and panics.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub(crate) fn raise(self) -> ! {
        tracing::error!(
            context = %self.context,
            kind = %self.kind,
            desired = %self.desired,
            granted = %self.granted,
            "access violation"
        );
        panic!("{self}");
    }
}

/// Logs a broken guard invariant (unbalanced release, out-of-order grant)
/// and panics.
#[cfg(feature = "diagnostics")]
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn invariant_breach(message: std::fmt::Arguments<'_>) -> ! {
    tracing::error!("{message}");
    panic!("{message}");
}
