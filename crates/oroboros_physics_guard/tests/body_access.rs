//! Integration tests for body access grants, alone and under physics locks.

#![cfg(feature = "diagnostics")]

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use oroboros_physics_guard::{
    check_rights, AccessKind, AccessLevel, AccessViolation, BodyAccess, LockContext, LockRole,
    PhysicsLock, SharedLock, UniqueLock,
};
use parking_lot::{Mutex, RwLock};

#[test]
fn test_check_rights_matrix() {
    use AccessLevel::{None as N, Read as R, ReadWrite as RW};

    // (current, desired, allowed)
    let table = [
        (N, N, true),
        (N, R, false),
        (N, RW, false),
        (R, N, true),
        (R, R, true),
        (R, RW, false),
        (RW, N, true),
        (RW, R, true),
        (RW, RW, true),
    ];

    for (current, desired, allowed) in table {
        assert_eq!(check_rights(current, desired), allowed, "{current} -> {desired}");
    }
}

#[test]
fn test_nested_grants_stack() {
    let access = BodyAccess::new(LockContext::new());
    assert_eq!(access.velocity(), AccessLevel::ReadWrite);

    let outer = access.grant(AccessLevel::Read, AccessLevel::Read);
    assert_eq!(access.velocity(), AccessLevel::Read);

    let inner = access.grant(AccessLevel::None, AccessLevel::None);
    assert_eq!(access.velocity(), AccessLevel::None);
    assert_eq!(access.position(), AccessLevel::None);

    drop(inner);
    assert_eq!(access.velocity(), AccessLevel::Read);
    assert_eq!(access.position(), AccessLevel::Read);

    drop(outer);
    assert_eq!(access.velocity(), AccessLevel::ReadWrite);
    assert_eq!(access.position(), AccessLevel::ReadWrite);
}

#[test]
fn test_grant_restored_on_unwind() {
    let access = BodyAccess::new(LockContext::new());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _grant = access.grant(AccessLevel::None, AccessLevel::Read);
        access.assert_rights(AccessKind::Velocity, AccessLevel::Read);
    }));

    assert!(result.is_err());
    assert_eq!(access.velocity(), AccessLevel::ReadWrite);
    assert_eq!(access.position(), AccessLevel::ReadWrite);
}

#[test]
fn test_identical_grants_released_out_of_order_are_fatal() {
    let access = BodyAccess::new(LockContext::new());

    let outer = access.grant(AccessLevel::Read, AccessLevel::Read);
    let inner = access.grant(AccessLevel::Read, AccessLevel::Read);
    let result = panic::catch_unwind(AssertUnwindSafe(move || drop(outer)));

    let message = result.unwrap_err();
    let message = message
        .downcast_ref::<String>()
        .map(String::as_str)
        .unwrap_or_default();
    assert!(message.contains("released out of order"), "{message}");

    // The outer grant restored its prior state regardless, so the inner one
    // finds someone else's levels too.
    assert_eq!(access.levels(), (AccessLevel::ReadWrite, AccessLevel::ReadWrite));
    assert!(panic::catch_unwind(AssertUnwindSafe(move || drop(inner))).is_err());
}

#[test]
fn test_readers_never_see_half_a_grant() {
    let access = BodyAccess::new(LockContext::new());
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut samples = 0_u64;
            loop {
                let (velocity, position) = access.levels();
                assert_eq!(velocity, position, "torn grant observed");
                samples += 1;
                if stop.load(Ordering::Relaxed) {
                    return samples;
                }
            }
        });

        for _ in 0..10_000 {
            let _frozen = access.grant(AccessLevel::None, AccessLevel::None);
            let _read = access.grant(AccessLevel::Read, AccessLevel::Read);
        }
        stop.store(true, Ordering::Relaxed);
        assert!(reader.join().unwrap() > 0);
    });
}

#[test]
fn test_systems_have_independent_rights() {
    let world_a = BodyAccess::new(LockContext::new());
    let world_b = BodyAccess::new(LockContext::new());

    let _frozen = world_a.grant(AccessLevel::None, AccessLevel::None);
    assert_eq!(world_a.velocity(), AccessLevel::None);
    assert_eq!(world_b.velocity(), AccessLevel::ReadWrite);
    world_b.assert_rights(AccessKind::Position, AccessLevel::ReadWrite);
}

#[test]
fn test_violation_names_system_and_kind() {
    let context = LockContext::new();
    let access = BodyAccess::new(context);
    let _grant = access.grant(AccessLevel::ReadWrite, AccessLevel::Read);

    let violation = access
        .check(AccessKind::Position, AccessLevel::ReadWrite)
        .unwrap_err();
    assert_eq!(
        violation,
        AccessViolation {
            context,
            kind: AccessKind::Position,
            desired: AccessLevel::ReadWrite,
            granted: AccessLevel::Read,
        }
    );
    assert_eq!(violation.context, access.context());
}

/// Minimal body store guarded the way the physics step guards it.
struct Bodies {
    context: LockContext,
    access: BodyAccess,
    query: RwLock<()>,
    positions: Vec<Mutex<[f32; 3]>>,
    velocities: Vec<Mutex<[f32; 3]>>,
}

impl Bodies {
    fn new(count: usize) -> Self {
        let context = LockContext::new();
        Self {
            context,
            access: BodyAccess::new(context),
            query: RwLock::new(()),
            positions: (0..count).map(|_| Mutex::new([0.0; 3])).collect(),
            velocities: (0..count).map(|_| Mutex::new([1.0, 0.0, 0.0])).collect(),
        }
    }

    fn position(&self, index: usize) -> [f32; 3] {
        self.access.assert_rights(AccessKind::Position, AccessLevel::Read);
        *self.positions[index].lock()
    }

    fn integrate(&self, index: usize, dt: f32) {
        PhysicsLock::assert_held(self.context, LockRole::PerBody);
        self.access.assert_rights(AccessKind::Velocity, AccessLevel::Read);
        self.access.assert_rights(AccessKind::Position, AccessLevel::ReadWrite);

        let velocity = *self.velocities[index].lock();
        let mut position = self.positions[index].lock();
        for (p, v) in position.iter_mut().zip(velocity) {
            *p += v * dt;
        }
    }
}

#[test]
fn test_integration_phase_under_locks() {
    let bodies = Bodies::new(4);
    let body_locks: Vec<Mutex<()>> = (0..4).map(|_| Mutex::new(())).collect();

    {
        // Integration: velocities frozen, positions writable.
        let _grant = bodies.access.grant(AccessLevel::Read, AccessLevel::ReadWrite);
        for (index, lock) in body_locks.iter().enumerate() {
            let _body = UniqueLock::new(lock, bodies.context, LockRole::PerBody);
            bodies.integrate(index, 0.5);
        }
    }

    assert_eq!(bodies.position(2), [0.5, 0.0, 0.0]);
}

#[test]
#[should_panic(expected = "position access needs read-write, granted read")]
fn test_integration_during_query_phase_is_fatal() {
    let bodies = Bodies::new(1);
    let body_lock = Mutex::new(());

    // Broadphase query: positions are being read in parallel.
    let _query = SharedLock::new(&bodies.query, bodies.context, LockRole::BroadPhaseQuery);
    let _grant = bodies.access.grant(AccessLevel::ReadWrite, AccessLevel::Read);
    assert_eq!(bodies.position(0), [0.0; 3]);

    let _body = UniqueLock::new(&body_lock, bodies.context, LockRole::PerBody);
    bodies.integrate(0, 1.0);
}

#[test]
#[should_panic(expected = "PerBody must be held")]
fn test_integration_without_body_lock_is_fatal() {
    let bodies = Bodies::new(1);
    bodies.integrate(0, 1.0);
}
