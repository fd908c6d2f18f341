//! # Lockable Primitives
//!
//! The sequencer never locks anything itself. It drives whatever primitive
//! the physics system hands it through [`Lockable`] / [`SharedLockable`].
//!
//! ## Safety Note
//!
//! Releasing a raw lock is only sound for its owner, so the release halves of
//! these traits are `unsafe`. This module forwards to `parking_lot`'s own
//! unsafe release functions.

#![allow(unsafe_code)]

use parking_lot::lock_api;

/// A lock with exclusive acquisition.
pub trait Lockable {
    /// Blocks until exclusive ownership is acquired.
    fn lock(&self);

    /// Releases exclusive ownership.
    ///
    /// # Safety
    ///
    /// The lock must be exclusively held by the current context, through a
    /// prior call to [`Lockable::lock`].
    unsafe fn unlock(&self);
}

/// A lock that also supports shared (read-only) acquisition.
pub trait SharedLockable: Lockable {
    /// Blocks until shared ownership is acquired.
    fn lock_shared(&self);

    /// Releases one shared ownership.
    ///
    /// # Safety
    ///
    /// The lock must be held in shared mode by the current context, through a
    /// prior call to [`SharedLockable::lock_shared`].
    unsafe fn unlock_shared(&self);
}

impl Lockable for parking_lot::RawMutex {
    #[inline]
    fn lock(&self) {
        lock_api::RawMutex::lock(self);
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: Ownership is guaranteed by the caller.
        unsafe { lock_api::RawMutex::unlock(self) }
    }
}

impl Lockable for parking_lot::RawRwLock {
    #[inline]
    fn lock(&self) {
        lock_api::RawRwLock::lock_exclusive(self);
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: Exclusive ownership is guaranteed by the caller.
        unsafe { lock_api::RawRwLock::unlock_exclusive(self) }
    }
}

impl SharedLockable for parking_lot::RawRwLock {
    #[inline]
    fn lock_shared(&self) {
        lock_api::RawRwLock::lock_shared(self);
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        // SAFETY: Shared ownership is guaranteed by the caller.
        unsafe { lock_api::RawRwLock::unlock_shared(self) }
    }
}

/// Locks the mutex without handing out its data. The forgotten guard is
/// released again through `force_unlock`.
impl<T: ?Sized> Lockable for parking_lot::Mutex<T> {
    #[inline]
    fn lock(&self) {
        std::mem::forget(parking_lot::Mutex::lock(self));
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: The guard forgotten in `lock` is owned by the caller.
        unsafe { self.force_unlock() }
    }
}

impl<T: ?Sized> Lockable for parking_lot::RwLock<T> {
    #[inline]
    fn lock(&self) {
        std::mem::forget(self.write());
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: The write guard forgotten in `lock` is owned by the caller.
        unsafe { self.force_unlock_write() }
    }
}

impl<T: ?Sized> SharedLockable for parking_lot::RwLock<T> {
    #[inline]
    fn lock_shared(&self) {
        std::mem::forget(self.read());
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        // SAFETY: The read guard forgotten in `lock_shared` is owned by the caller.
        unsafe { self.force_unlock_read() }
    }
}
