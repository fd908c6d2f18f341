//! # Held Lock Arena
//!
//! Which physics locks each thread holds, per context. One slot per
//! `(thread, context)` pair, created on first acquisition and dropped as soon
//! as its last hold is released, so the arena stays as small as the number of
//! threads currently inside a locked region.
//!
//! The arena itself is plain data. [`PhysicsLock`](crate::PhysicsLock) keeps
//! one per thread; tests can build their own and drive it with fabricated
//! [`ThreadKey`]s.

use crate::context::{LockContext, ThreadKey};
use crate::error::LockOrderViolation;
use crate::role::{LockRole, LockRoleSet};

/// Held-lock bookkeeping for one thread in one context.
#[derive(Debug)]
struct HeldSlot {
    thread: ThreadKey,
    context: LockContext,
    /// Hold count per role, indexed by rank.
    counts: [u32; LockRole::COUNT],
}

impl HeldSlot {
    const fn new(thread: ThreadKey, context: LockContext) -> Self {
        Self {
            thread,
            context,
            counts: [0; LockRole::COUNT],
        }
    }

    fn held(&self) -> LockRoleSet {
        LockRole::ALL
            .into_iter()
            .filter(|role| self.counts[usize::from(role.rank())] > 0)
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }
}

/// Arena of held physics locks keyed by `(thread, context)`.
#[derive(Debug, Default)]
pub struct HeldLocks {
    slots: Vec<HeldSlot>,
}

impl HeldLocks {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Returns the number of `(thread, context)` pairs holding any lock.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no thread holds any lock.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the roles `thread` holds in `context`.
    #[must_use]
    pub fn held(&self, thread: ThreadKey, context: LockContext) -> LockRoleSet {
        self.find(thread, context)
            .map_or(LockRoleSet::EMPTY, |index| self.slots[index].held())
    }

    /// Returns how many times `thread` holds `role` in `context`.
    #[must_use]
    pub fn hold_count(&self, thread: ThreadKey, context: LockContext, role: LockRole) -> u32 {
        self.find(thread, context)
            .map_or(0, |index| self.slots[index].counts[usize::from(role.rank())])
    }

    /// Checks that `thread` may take `role` in `context`.
    ///
    /// Legal iff no role ranked above `role` is held. Taking the same role
    /// again is legal.
    ///
    /// # Errors
    ///
    /// Returns [`LockOrderViolation`] naming the highest held role otherwise.
    pub fn check(
        &self,
        thread: ThreadKey,
        context: LockContext,
        role: LockRole,
    ) -> Result<(), LockOrderViolation> {
        let held = self.held(thread, context);
        match held.highest() {
            Some(highest_held) if highest_held > role => Err(LockOrderViolation {
                context,
                requested: role,
                highest_held,
                held,
            }),
            _ => Ok(()),
        }
    }

    /// Records one more hold of `role`, without checking the order.
    pub fn record(&mut self, thread: ThreadKey, context: LockContext, role: LockRole) {
        let index = match self.find(thread, context) {
            Some(index) => index,
            None => {
                self.slots.push(HeldSlot::new(thread, context));
                self.slots.len() - 1
            }
        };
        self.slots[index].counts[usize::from(role.rank())] += 1;
    }

    /// Checks the order, then records the hold.
    ///
    /// # Errors
    ///
    /// Returns [`LockOrderViolation`] and records nothing if out of order.
    pub fn acquire(
        &mut self,
        thread: ThreadKey,
        context: LockContext,
        role: LockRole,
    ) -> Result<(), LockOrderViolation> {
        self.check(thread, context, role)?;
        self.record(thread, context, role);
        Ok(())
    }

    /// Releases one hold of `role`.
    ///
    /// Returns false, changing nothing, if `role` was not held.
    #[must_use]
    pub fn release(&mut self, thread: ThreadKey, context: LockContext, role: LockRole) -> bool {
        let Some(index) = self.find(thread, context) else {
            return false;
        };

        let slot = &mut self.slots[index];
        let count = &mut slot.counts[usize::from(role.rank())];
        if *count == 0 {
            return false;
        }
        *count -= 1;

        if slot.is_empty() {
            self.slots.swap_remove(index);
        }
        true
    }

    fn find(&self, thread: ThreadKey, context: LockContext) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.thread == thread && slot.context == context)
    }
}
