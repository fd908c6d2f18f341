//! # Physics Lock Roles
//!
//! Every lock in the physics system plays one of a small, fixed set of roles.
//! The declaration order of [`LockRole`] IS the acquisition order:
//!
//! ```text
//! BroadPhaseQuery   (rank 0)  ── take first
//! PerBody           (rank 1)
//! BodiesList        (rank 2)
//! BroadPhaseUpdate  (rank 3)
//! ConstraintsList   (rank 4)
//! ActiveBodiesList  (rank 5)  ── take last
//! ```
//!
//! Within one thread and one physics system, a lock may only be taken if no
//! lock further down this list is already held.

use std::fmt;

/// A named lock in the physics system.
///
/// Roles compare by rank, so `a < b` means `a` must be taken before `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LockRole {
    /// Broadphase query lock.
    BroadPhaseQuery = 0,
    /// Lock protecting a single body.
    PerBody = 1,
    /// Lock protecting the body list.
    BodiesList = 2,
    /// Broadphase update lock.
    BroadPhaseUpdate = 3,
    /// Lock protecting the constraint list.
    ConstraintsList = 4,
    /// Lock protecting the active body list.
    ActiveBodiesList = 5,
}

impl LockRole {
    /// Number of roles.
    pub const COUNT: usize = 6;

    /// All roles, in acquisition order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::BroadPhaseQuery,
        Self::PerBody,
        Self::BodiesList,
        Self::BroadPhaseUpdate,
        Self::ConstraintsList,
        Self::ActiveBodiesList,
    ];

    /// Returns the position of this role in the acquisition order.
    #[inline]
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Returns the single-bit mask of this role (`1 << rank`).
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u8 {
        1 << self.rank()
    }

    /// Looks up a role by rank.
    #[must_use]
    pub const fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Self::BroadPhaseQuery),
            1 => Some(Self::PerBody),
            2 => Some(Self::BodiesList),
            3 => Some(Self::BroadPhaseUpdate),
            4 => Some(Self::ConstraintsList),
            5 => Some(Self::ActiveBodiesList),
            _ => None,
        }
    }

    /// Returns the role name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BroadPhaseQuery => "BroadPhaseQuery",
            Self::PerBody => "PerBody",
            Self::BodiesList => "BodiesList",
            Self::BroadPhaseUpdate => "BroadPhaseUpdate",
            Self::ConstraintsList => "ConstraintsList",
            Self::ActiveBodiesList => "ActiveBodiesList",
        }
    }
}

impl fmt::Display for LockRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of lock roles, stored as a bitmask of [`LockRole::mask`] values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LockRoleSet(u8);

impl LockRoleSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Returns the raw bitmask.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if no role is in the set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of roles in the set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Returns true if `role` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, role: LockRole) -> bool {
        self.0 & role.mask() != 0
    }

    /// Returns this set with `role` added.
    #[inline]
    #[must_use]
    pub const fn with(self, role: LockRole) -> Self {
        Self(self.0 | role.mask())
    }

    /// Returns the highest-ranked role in the set.
    #[must_use]
    pub const fn highest(self) -> Option<LockRole> {
        if self.0 == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let rank = (u8::BITS - 1 - self.0.leading_zeros()) as u8;
        LockRole::from_rank(rank)
    }

    /// Iterates the roles in the set, in acquisition order.
    pub fn iter(self) -> impl Iterator<Item = LockRole> {
        LockRole::ALL.into_iter().filter(move |role| self.contains(*role))
    }
}

impl FromIterator<LockRole> for LockRoleSet {
    fn from_iter<I: IntoIterator<Item = LockRole>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Display for LockRoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }
        for (i, role) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(role.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_ordered_by_declaration() {
        for pair in LockRole::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].rank() + 1, pair[1].rank());
        }
        assert_eq!(LockRole::ActiveBodiesList.mask(), 1 << 5);
    }

    #[test]
    fn test_rank_round_trip() {
        for role in LockRole::ALL {
            assert_eq!(LockRole::from_rank(role.rank()), Some(role));
        }
        assert_eq!(LockRole::from_rank(6), None);
    }

    #[test]
    fn test_role_set_highest() {
        let set: LockRoleSet = [LockRole::PerBody, LockRole::ConstraintsList]
            .into_iter()
            .collect();

        assert_eq!(set.len(), 2);
        assert!(set.contains(LockRole::PerBody));
        assert!(!set.contains(LockRole::BodiesList));
        assert_eq!(set.highest(), Some(LockRole::ConstraintsList));
        assert_eq!(LockRoleSet::EMPTY.highest(), None);
    }

    #[test]
    fn test_role_set_display() {
        let set = LockRoleSet::EMPTY
            .with(LockRole::BodiesList)
            .with(LockRole::BroadPhaseQuery);
        assert_eq!(set.to_string(), "BroadPhaseQuery | BodiesList");
        assert_eq!(LockRoleSet::EMPTY.to_string(), "nothing");
    }
}
