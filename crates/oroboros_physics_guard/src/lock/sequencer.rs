//! # Physics Lock Sequencer
//!
//! Enforces the [`LockRole`] hierarchy on every lock the physics system takes.
//!
//! ```text
//! lock(role)                          unlock(role)
//!   │                                   │
//!   ├─ check: nothing above role held   ├─ drop one hold of role
//!   ├─ lockable.lock()   (may block)    └─ lockable.unlock()
//!   └─ record one hold of role
//! ```
//!
//! The check runs before the lockable is touched, so an out-of-order request
//! dies before it can deadlock. Bookkeeping lives in a thread-local
//! `HeldLocks` arena: no thread ever reads another's holds, and tracking
//! never blocks.
//!
//! With `diagnostics` off, every function here is the bare lockable call.

#![allow(unsafe_code)]

use crate::context::LockContext;
use crate::lock::lockable::{Lockable, SharedLockable};
use crate::role::{LockRole, LockRoleSet};

#[cfg(feature = "diagnostics")]
use crate::lock::held::HeldLocks;

/// The context and role of one acquisition, carried by the scoped guards.
///
/// Zero-sized in production builds.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LockTag {
    #[cfg(feature = "diagnostics")]
    context: LockContext,
    #[cfg(feature = "diagnostics")]
    role: LockRole,
}

impl LockTag {
    #[inline]
    pub(crate) fn new(context: LockContext, role: LockRole) -> Self {
        #[cfg(feature = "diagnostics")]
        {
            Self { context, role }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            let _ = (context, role);
            Self {}
        }
    }
}

#[cfg(feature = "diagnostics")]
mod tracking {
    use std::cell::RefCell;

    use super::LockTag;
    use crate::context::{LockContext, ThreadKey};
    use crate::error::invariant_breach;
    use crate::lock::held::HeldLocks;
    use crate::role::{LockRole, LockRoleSet};

    thread_local! {
        static HELD: RefCell<HeldLocks> = const { RefCell::new(HeldLocks::new()) };
    }

    #[track_caller]
    pub(super) fn before_acquire(tag: LockTag) {
        let thread = ThreadKey::current();
        let checked = HELD.with(|held| held.borrow().check(thread, tag.context, tag.role));
        if let Err(violation) = checked {
            violation.raise();
        }
    }

    pub(super) fn after_acquire(tag: LockTag) {
        let thread = ThreadKey::current();
        HELD.with(|held| held.borrow_mut().record(thread, tag.context, tag.role));
    }

    #[track_caller]
    pub(super) fn before_release(tag: LockTag) {
        let thread = ThreadKey::current();
        let released =
            HELD.with(|held| held.borrow_mut().release(thread, tag.context, tag.role));
        if !released {
            invariant_breach(format_args!(
                "released {} in {} on {thread}, but it is not held there",
                tag.role, tag.context,
            ));
        }
    }

    pub(super) fn held(context: LockContext) -> LockRoleSet {
        let thread = ThreadKey::current();
        HELD.with(|held| held.borrow().held(thread, context))
    }

    pub(super) fn is_held(context: LockContext, role: LockRole) -> bool {
        held(context).contains(role)
    }

    pub(super) fn with_arena<R>(f: impl FnOnce(&HeldLocks) -> R) -> R {
        HELD.with(|held| f(&held.borrow()))
    }
}

#[cfg(not(feature = "diagnostics"))]
mod tracking {
    use super::LockTag;
    use crate::context::LockContext;
    use crate::role::{LockRole, LockRoleSet};

    #[inline]
    pub(super) fn before_acquire(_: LockTag) {}

    #[inline]
    pub(super) fn after_acquire(_: LockTag) {}

    #[inline]
    pub(super) fn before_release(_: LockTag) {}

    #[inline]
    pub(super) fn held(_: LockContext) -> LockRoleSet {
        LockRoleSet::EMPTY
    }

    #[inline]
    pub(super) fn is_held(_: LockContext, _: LockRole) -> bool {
        true
    }
}

/// Ordered lock and unlock of physics locks.
///
/// Prefer the scoped [`UniqueLock`](crate::UniqueLock) and
/// [`SharedLock`](crate::SharedLock); the raw calls here exist for code that
/// cannot express its lock span as a scope.
pub struct PhysicsLock;

impl PhysicsLock {
    /// Takes `lockable` exclusively as `role` of `context`.
    ///
    /// # Panics
    ///
    /// Panics with a [`LockOrderViolation`](crate::LockOrderViolation) if the
    /// calling thread holds a higher-ranked role in `context`. The lockable is
    /// not touched in that case.
    #[inline]
    #[track_caller]
    pub fn lock<L: Lockable + ?Sized>(lockable: &L, context: LockContext, role: LockRole) {
        Self::lock_tagged(lockable, LockTag::new(context, role));
    }

    /// Releases an exclusive hold taken with [`PhysicsLock::lock`].
    ///
    /// # Safety
    ///
    /// The calling thread must hold `lockable` exclusively, taken with the
    /// same `context` and `role`.
    ///
    /// # Panics
    ///
    /// Panics if `role` is not held in `context` by the calling thread.
    #[inline]
    #[track_caller]
    pub unsafe fn unlock<L: Lockable + ?Sized>(lockable: &L, context: LockContext, role: LockRole) {
        // SAFETY: Forwarded from the caller.
        unsafe { Self::unlock_tagged(lockable, LockTag::new(context, role)) }
    }

    /// Takes `lockable` in shared mode as `role` of `context`.
    ///
    /// # Panics
    ///
    /// Same as [`PhysicsLock::lock`].
    #[inline]
    #[track_caller]
    pub fn lock_shared<L: SharedLockable + ?Sized>(
        lockable: &L,
        context: LockContext,
        role: LockRole,
    ) {
        Self::lock_shared_tagged(lockable, LockTag::new(context, role));
    }

    /// Releases a shared hold taken with [`PhysicsLock::lock_shared`].
    ///
    /// # Safety
    ///
    /// The calling thread must hold `lockable` in shared mode, taken with the
    /// same `context` and `role`.
    ///
    /// # Panics
    ///
    /// Panics if `role` is not held in `context` by the calling thread.
    #[inline]
    #[track_caller]
    pub unsafe fn unlock_shared<L: SharedLockable + ?Sized>(
        lockable: &L,
        context: LockContext,
        role: LockRole,
    ) {
        // SAFETY: Forwarded from the caller.
        unsafe { Self::unlock_shared_tagged(lockable, LockTag::new(context, role)) }
    }

    /// Returns the roles the calling thread holds in `context`.
    ///
    /// Always empty in production builds, where nothing is tracked. Unlike
    /// [`PhysicsLock::is_held`], which answers `true` there, this is a
    /// report rather than an assertion aid: do not derive "held" from it.
    #[inline]
    #[must_use]
    pub fn held_roles(context: LockContext) -> LockRoleSet {
        tracking::held(context)
    }

    /// Returns true if the calling thread holds `role` in `context`.
    ///
    /// Always true in production builds, so it is safe to assert on.
    #[inline]
    #[must_use]
    pub fn is_held(context: LockContext, role: LockRole) -> bool {
        tracking::is_held(context, role)
    }

    /// Asserts that the calling thread holds `role` in `context`.
    ///
    /// # Panics
    ///
    /// Panics if the role is not held. Compiles to nothing in production.
    #[inline]
    #[track_caller]
    pub fn assert_held(context: LockContext, role: LockRole) {
        assert!(
            Self::is_held(context, role),
            "{role} must be held in {context} (held: {})",
            Self::held_roles(context)
        );
    }

    /// Runs `f` against the calling thread's arena, for inspection.
    ///
    /// The arena is borrowed while `f` runs: `f` must not take or release
    /// physics locks.
    #[cfg(feature = "diagnostics")]
    pub fn inspect<R>(f: impl FnOnce(&HeldLocks) -> R) -> R {
        tracking::with_arena(f)
    }

    #[inline]
    #[track_caller]
    pub(crate) fn lock_tagged<L: Lockable + ?Sized>(lockable: &L, tag: LockTag) {
        tracking::before_acquire(tag);
        lockable.lock();
        tracking::after_acquire(tag);
    }

    #[inline]
    #[track_caller]
    pub(crate) unsafe fn unlock_tagged<L: Lockable + ?Sized>(lockable: &L, tag: LockTag) {
        tracking::before_release(tag);
        // SAFETY: Ownership is guaranteed by the caller.
        unsafe { lockable.unlock() }
    }

    #[inline]
    #[track_caller]
    pub(crate) fn lock_shared_tagged<L: SharedLockable + ?Sized>(lockable: &L, tag: LockTag) {
        tracking::before_acquire(tag);
        lockable.lock_shared();
        tracking::after_acquire(tag);
    }

    #[inline]
    #[track_caller]
    pub(crate) unsafe fn unlock_shared_tagged<L: SharedLockable + ?Sized>(
        lockable: &L,
        tag: LockTag,
    ) {
        tracking::before_release(tag);
        // SAFETY: Ownership is guaranteed by the caller.
        unsafe { lockable.unlock_shared() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "diagnostics")]
    #[test]
    fn test_raw_lock_tracks_roles() {
        let ctx = LockContext::new();
        let list = <parking_lot::RawMutex as parking_lot::lock_api::RawMutex>::INIT;
        let body = parking_lot::Mutex::new(());

        PhysicsLock::lock(&body, ctx, LockRole::PerBody);
        PhysicsLock::lock(&list, ctx, LockRole::BodiesList);
        assert!(PhysicsLock::is_held(ctx, LockRole::PerBody));
        assert_eq!(PhysicsLock::held_roles(ctx).highest(), Some(LockRole::BodiesList));

        unsafe {
            PhysicsLock::unlock(&list, ctx, LockRole::BodiesList);
            PhysicsLock::unlock(&body, ctx, LockRole::PerBody);
        }
        assert!(PhysicsLock::held_roles(ctx).is_empty());
        assert!(body.try_lock().is_some());
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    #[should_panic(expected = "lock order violation")]
    fn test_raw_lock_out_of_order_panics() {
        let ctx = LockContext::new();
        let list = parking_lot::Mutex::new(());
        let query = parking_lot::RwLock::new(());

        PhysicsLock::lock(&list, ctx, LockRole::BodiesList);
        PhysicsLock::lock_shared(&query, ctx, LockRole::BroadPhaseQuery);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    #[should_panic(expected = "not held")]
    fn test_unbalanced_unlock_panics() {
        let ctx = LockContext::new();
        let list = parking_lot::Mutex::new(());
        unsafe { PhysicsLock::unlock(&list, ctx, LockRole::BodiesList) };
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    #[should_panic(expected = "must be held")]
    fn test_assert_held_panics() {
        PhysicsLock::assert_held(LockContext::new(), LockRole::ConstraintsList);
    }

    #[cfg(not(feature = "diagnostics"))]
    #[test]
    fn test_production_tag_is_free() {
        assert_eq!(std::mem::size_of::<LockTag>(), 0);
        PhysicsLock::assert_held(LockContext::new(), LockRole::ConstraintsList);
        assert!(PhysicsLock::held_roles(LockContext::new()).is_empty());
    }
}
