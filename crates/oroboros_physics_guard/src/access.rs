//! # Body Access Rights
//!
//! Race detection for body state. Each physics system owns a [`BodyAccess`]
//! holding the level currently granted for velocities and for positions.
//! Pipeline phases narrow (or widen) those levels with a scoped [`Grant`],
//! and body accessors assert the level they need before touching memory.
//!
//! ```text
//! level   ReadWrite ──Grant(Read)──► Read ──Grant(None)──► None
//!                   ◄───── drop ────      ◄───── drop ────
//! ```
//!
//! ## Thread Safety
//!
//! Both levels and the grant nesting depth share one relaxed atomic word, so a
//! grant swaps them in a single step and any worker may read a consistent
//! pair. Grant scopes follow strict LIFO nesting and must NOT overlap across
//! threads. Two threads pushing grants on the same `BodyAccess` at once will
//! restore each other's levels. Within one thread, an out-of-order release is
//! caught on drop.

use std::fmt;
use std::marker::PhantomData;

#[cfg(feature = "diagnostics")]
use std::sync::atomic::{AtomicU32, Ordering};

use crate::context::LockContext;
use crate::error::AccessViolation;

/// Access level for one kind of body state.
///
/// The discriminants are capability bits: `ReadWrite` includes `Read`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum AccessLevel {
    /// No access.
    None = 0,
    /// Read only.
    Read = 1,
    /// Read and write.
    ReadWrite = 3,
}

impl AccessLevel {
    /// Returns the capability bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decodes capability bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::None),
            1 => Some(Self::Read),
            3 => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// Returns true if this level grants every capability of `desired`.
    #[inline]
    #[must_use]
    pub const fn includes(self, desired: Self) -> bool {
        self.bits() & desired.bits() == desired.bits()
    }

    /// Returns the level name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::ReadWrite => "read-write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which body state an access concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Linear and angular velocity.
    Velocity,
    /// Position and rotation.
    Position,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Velocity => "velocity",
            Self::Position => "position",
        })
    }
}

/// Returns true if `current` grants the capabilities of `desired`.
///
/// `desired == None` always passes; `ReadWrite` satisfies everything.
#[inline]
#[must_use]
pub const fn check_rights(current: AccessLevel, desired: AccessLevel) -> bool {
    current.includes(desired)
}

/// Packed grant state: velocity level in bits 0-1, position level in bits
/// 2-3, grant nesting depth above.
#[cfg(feature = "diagnostics")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct GrantState(u32);

#[cfg(feature = "diagnostics")]
impl GrantState {
    const LEVEL_MASK: u32 = 0b11;
    const POSITION_SHIFT: u32 = 2;
    const DEPTH_SHIFT: u32 = 4;

    const UNRESTRICTED: Self = Self::new(AccessLevel::ReadWrite, AccessLevel::ReadWrite, 0);

    #[allow(clippy::cast_lossless)]
    const fn new(velocity: AccessLevel, position: AccessLevel, depth: u32) -> Self {
        Self(
            (depth << Self::DEPTH_SHIFT)
                | ((position.bits() as u32) << Self::POSITION_SHIFT)
                | velocity.bits() as u32,
        )
    }

    /// The state a grant installs on top of this one.
    fn push(self, velocity: AccessLevel, position: AccessLevel) -> Self {
        Self::new(velocity, position, self.depth().wrapping_add(1))
    }

    fn level(self, kind: AccessKind) -> AccessLevel {
        let shift = match kind {
            AccessKind::Velocity => 0,
            AccessKind::Position => Self::POSITION_SHIFT,
        };
        u8::try_from((self.0 >> shift) & Self::LEVEL_MASK)
            .ok()
            .and_then(AccessLevel::from_bits)
            .unwrap_or(AccessLevel::None)
    }

    const fn depth(self) -> u32 {
        self.0 >> Self::DEPTH_SHIFT
    }
}

#[cfg(feature = "diagnostics")]
impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "velocity {} / position {} at depth {}",
            self.level(AccessKind::Velocity),
            self.level(AccessKind::Position),
            self.depth()
        )
    }
}

/// Access levels of one physics system's bodies.
///
/// Both kinds start at [`AccessLevel::ReadWrite`]. In production builds this
/// is zero-sized, every level reads as `ReadWrite` and every check passes.
#[derive(Debug)]
pub struct BodyAccess {
    #[cfg(feature = "diagnostics")]
    context: LockContext,
    #[cfg(feature = "diagnostics")]
    state: AtomicU32,
}

impl BodyAccess {
    /// Creates the access state for the system identified by `context`.
    #[must_use]
    pub fn new(context: LockContext) -> Self {
        #[cfg(feature = "diagnostics")]
        {
            Self {
                context,
                state: AtomicU32::new(GrantState::UNRESTRICTED.0),
            }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            let _ = context;
            Self {}
        }
    }

    /// Returns the owning system's context.
    #[inline]
    #[must_use]
    pub fn context(&self) -> LockContext {
        #[cfg(feature = "diagnostics")]
        {
            self.context
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            LockContext::new()
        }
    }

    /// Returns the level currently granted for `kind`.
    #[inline]
    #[must_use]
    pub fn level(&self, kind: AccessKind) -> AccessLevel {
        #[cfg(feature = "diagnostics")]
        {
            self.load().level(kind)
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            let _ = kind;
            AccessLevel::ReadWrite
        }
    }

    /// Returns the velocity and position levels, read together.
    #[inline]
    #[must_use]
    pub fn levels(&self) -> (AccessLevel, AccessLevel) {
        #[cfg(feature = "diagnostics")]
        {
            let state = self.load();
            (
                state.level(AccessKind::Velocity),
                state.level(AccessKind::Position),
            )
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            (AccessLevel::ReadWrite, AccessLevel::ReadWrite)
        }
    }

    /// Returns the level currently granted for velocities.
    #[inline]
    #[must_use]
    pub fn velocity(&self) -> AccessLevel {
        self.level(AccessKind::Velocity)
    }

    /// Returns the level currently granted for positions.
    #[inline]
    #[must_use]
    pub fn position(&self) -> AccessLevel {
        self.level(AccessKind::Position)
    }

    /// Grants the given levels until the returned guard is dropped.
    ///
    /// The previous levels are restored on drop, whatever happened in between.
    #[inline]
    pub fn grant(&self, velocity: AccessLevel, position: AccessLevel) -> Grant<'_> {
        #[cfg(feature = "diagnostics")]
        {
            let pushed = self
                .state
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    Some(GrantState(bits).push(velocity, position).0)
                });
            let prior = match pushed {
                Ok(bits) | Err(bits) => GrantState(bits),
            };
            tracing::trace!(
                context = %self.context,
                %velocity,
                %position,
                "body access granted"
            );
            Grant {
                access: self,
                installed: prior.push(velocity, position),
                prior,
                _not_send: PhantomData,
            }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            let _ = (velocity, position);
            Grant {
                _access: PhantomData,
                _not_send: PhantomData,
            }
        }
    }

    /// Checks that `desired` access to `kind` is currently granted.
    ///
    /// # Errors
    ///
    /// Returns [`AccessViolation`] if the granted level does not include
    /// `desired`. Never fails in production builds.
    #[inline]
    pub fn check(&self, kind: AccessKind, desired: AccessLevel) -> Result<(), AccessViolation> {
        let granted = self.level(kind);
        if check_rights(granted, desired) {
            Ok(())
        } else {
            Err(AccessViolation {
                context: self.context(),
                kind,
                desired,
                granted,
            })
        }
    }

    /// Asserts that `desired` access to `kind` is currently granted.
    ///
    /// Call this before every read or write of body state.
    ///
    /// # Panics
    ///
    /// Panics with an [`AccessViolation`] if the access is not granted.
    /// Compiles to nothing in production builds.
    #[inline]
    #[track_caller]
    pub fn assert_rights(&self, kind: AccessKind, desired: AccessLevel) {
        #[cfg(feature = "diagnostics")]
        {
            if let Err(violation) = self.check(kind, desired) {
                violation.raise();
            }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            let _ = (kind, desired);
        }
    }

    #[cfg(feature = "diagnostics")]
    fn load(&self) -> GrantState {
        GrantState(self.state.load(Ordering::Relaxed))
    }
}

/// A scoped access grant. Restores the previous levels on drop.
///
/// Grants must be dropped in reverse order of creation, on the thread that
/// created them.
#[must_use = "the grant is revoked as soon as it is dropped"]
pub struct Grant<'a> {
    #[cfg(feature = "diagnostics")]
    access: &'a BodyAccess,
    #[cfg(feature = "diagnostics")]
    installed: GrantState,
    #[cfg(feature = "diagnostics")]
    prior: GrantState,
    #[cfg(not(feature = "diagnostics"))]
    _access: PhantomData<&'a BodyAccess>,
    _not_send: PhantomData<*const ()>,
}

#[cfg(feature = "diagnostics")]
impl Drop for Grant<'_> {
    fn drop(&mut self) {
        let found = GrantState(self.access.state.swap(self.prior.0, Ordering::Relaxed));
        tracing::trace!(
            context = %self.access.context,
            restored = %self.prior,
            "body access restored"
        );

        // The depth tells identical grants apart.
        if found != self.installed && !std::thread::panicking() {
            crate::error::invariant_breach(format_args!(
                "access grant released out of order in {}: expected {}, found {found}",
                self.access.context, self.installed,
            ));
        }
    }
}
