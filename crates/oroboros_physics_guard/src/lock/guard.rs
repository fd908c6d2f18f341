//! # Scoped Physics Locks
//!
//! RAII wrappers over [`PhysicsLock`]: acquire in `new`, release in `Drop`.
//! Release runs on every exit path, unwinding included.
//!
//! Guards are `!Send`. A hold is tracked against the thread that took it and
//! must be released there.

use std::marker::PhantomData;

use crate::context::LockContext;
use crate::lock::lockable::{Lockable, SharedLockable};
use crate::lock::sequencer::{LockTag, PhysicsLock};
use crate::role::LockRole;

/// Exclusive hold of a physics lock for the current scope.
///
/// In production builds this is exactly one reference wide.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct UniqueLock<'a, L: Lockable + ?Sized> {
    lockable: &'a L,
    tag: LockTag,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: Lockable + ?Sized> UniqueLock<'a, L> {
    /// Takes `lockable` exclusively as `role` of `context`.
    ///
    /// # Panics
    ///
    /// Panics with a [`LockOrderViolation`](crate::LockOrderViolation) if the
    /// calling thread holds a higher-ranked role in `context`.
    #[inline]
    #[track_caller]
    pub fn new(lockable: &'a L, context: LockContext, role: LockRole) -> Self {
        let tag = LockTag::new(context, role);
        PhysicsLock::lock_tagged(lockable, tag);
        Self {
            lockable,
            tag,
            _not_send: PhantomData,
        }
    }

    /// Returns the locked object.
    #[inline]
    #[must_use]
    pub fn lockable(&self) -> &'a L {
        self.lockable
    }
}

#[allow(unsafe_code)]
impl<L: Lockable + ?Sized> Drop for UniqueLock<'_, L> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: Taken exclusively in `new` on this thread (the guard is !Send).
        unsafe { PhysicsLock::unlock_tagged(self.lockable, self.tag) }
    }
}

/// Shared hold of a physics lock for the current scope.
///
/// In production builds this is exactly one reference wide.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SharedLock<'a, L: SharedLockable + ?Sized> {
    lockable: &'a L,
    tag: LockTag,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: SharedLockable + ?Sized> SharedLock<'a, L> {
    /// Takes `lockable` in shared mode as `role` of `context`.
    ///
    /// # Panics
    ///
    /// Panics with a [`LockOrderViolation`](crate::LockOrderViolation) if the
    /// calling thread holds a higher-ranked role in `context`.
    #[inline]
    #[track_caller]
    pub fn new(lockable: &'a L, context: LockContext, role: LockRole) -> Self {
        let tag = LockTag::new(context, role);
        PhysicsLock::lock_shared_tagged(lockable, tag);
        Self {
            lockable,
            tag,
            _not_send: PhantomData,
        }
    }

    /// Returns the locked object.
    #[inline]
    #[must_use]
    pub fn lockable(&self) -> &'a L {
        self.lockable
    }
}

#[allow(unsafe_code)]
impl<L: SharedLockable + ?Sized> Drop for SharedLock<'_, L> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: Taken in shared mode in `new` on this thread (the guard is !Send).
        unsafe { PhysicsLock::unlock_shared_tagged(self.lockable, self.tag) }
    }
}
