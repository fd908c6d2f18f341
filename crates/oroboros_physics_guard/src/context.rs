//! # Lock Contexts
//!
//! Two physics systems stepping on the same thread must not cross-check each
//! other's locks. Every system therefore owns a [`LockContext`], and every
//! lock acquisition names the context it belongs to.
//!
//! In production builds the context is a zero-sized token.

use std::fmt;

#[cfg(feature = "diagnostics")]
use std::num::NonZeroU64;
#[cfg(feature = "diagnostics")]
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "diagnostics")]
static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

#[cfg(feature = "diagnostics")]
static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

/// Identity of one physics system instance.
///
/// Owned by the system that created it; the guard layer only compares
/// identities and never keeps anything alive through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockContext {
    #[cfg(feature = "diagnostics")]
    id: NonZeroU64,
}

impl LockContext {
    /// Creates a new, process-unique context.
    #[must_use]
    pub fn new() -> Self {
        #[cfg(feature = "diagnostics")]
        {
            let raw = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
            let context = Self {
                id: NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN),
            };
            tracing::debug!(%context, "physics lock context created");
            context
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            Self {}
        }
    }

    /// Returns the numeric id of this context (always 0 in production builds).
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        #[cfg(feature = "diagnostics")]
        {
            self.id.get()
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            0
        }
    }
}

impl Default for LockContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.id())
    }
}

/// Identity of a thread for lock tracking.
///
/// [`ThreadKey::current`] hands every OS thread its own key on first use.
/// [`ThreadKey::from_raw`] fabricates keys, which lets a single test thread
/// drive a [`HeldLocks`](crate::HeldLocks) arena as if it were many threads.
#[cfg(feature = "diagnostics")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadKey(NonZeroU64);

#[cfg(feature = "diagnostics")]
impl ThreadKey {
    /// Returns the key of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        thread_local! {
            static KEY: ThreadKey = ThreadKey::next();
        }
        KEY.with(|key| *key)
    }

    /// Wraps a raw key. Keys made this way may collide with real threads'
    /// keys, so keep them to private arenas.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Returns the raw key.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    fn next() -> Self {
        let raw = NEXT_THREAD.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

#[cfg(feature = "diagnostics")]
impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}
