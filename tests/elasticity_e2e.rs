//! End-to-end elasticity tests: suspend/resume of units and pools.

use filament::test_utils::init_test_logging;
use filament::{
    current_pool, current_unit, resume_pool, resume_processing_unit, resume_processing_unit_cb,
    suspend_pool, suspend_pool_cb, suspend_processing_unit, suspend_processing_unit_cb,
    test_complete, test_phase, ErrorKind, PoolConfig, Runtime, RuntimeConfig, SchedulerMode,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

/// default: 2 units, full mode — runs the control-flow tasks.
/// elastic: 2 units, full mode — the suspension target.
/// rigid:   1 unit, stealing only (no elasticity).
/// pinned:  2 units, elasticity only (no stealing).
fn elasticity_runtime() -> Runtime {
    Runtime::new(
        RuntimeConfig::with_pool(PoolConfig::new("default").worker_threads(2))
            .add_pool(PoolConfig::new("elastic").worker_threads(2))
            .add_pool(
                PoolConfig::new("rigid")
                    .worker_threads(1)
                    .mode(SchedulerMode::STEALING),
            )
            .add_pool(
                PoolConfig::new("pinned")
                    .worker_threads(2)
                    .mode(SchedulerMode::ELASTICITY),
            ),
    )
    .expect("runtime starts")
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn suspend_requires_the_elasticity_mode_bit() {
    init_test("suspend_requires_the_elasticity_mode_bit");
    let runtime = elasticity_runtime();
    let rigid = runtime.pool("rigid").cloned().expect("rigid pool");
    assert!(!rigid.supports_elasticity());

    // Awaitable form, from inside a task.
    let rt = runtime.clone();
    let target = rigid.clone();
    let outcome = runtime
        .spawn(move || suspend_processing_unit(&rt, &target, 0).get())
        .get()
        .expect("task ran");
    let err = outcome.expect_err("precondition violated");
    assert_eq!(err.kind(), ErrorKind::ElasticityDisabled);

    // Callback form, synchronously from this plain thread.
    let err = suspend_processing_unit_cb(&runtime, &rigid, 0, || {})
        .expect_err("precondition violated");
    assert_eq!(err.kind(), ErrorKind::ElasticityDisabled);

    // No side effects on the unit's state.
    assert_eq!(rigid.is_unit_suspended(0), Ok(false));
    test_complete!("suspend_requires_the_elasticity_mode_bit");
}

#[test]
fn awaitable_forms_reject_plain_threads() {
    init_test("awaitable_forms_reject_plain_threads");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");

    let err = suspend_processing_unit(&runtime, &elastic, 0)
        .get()
        .expect_err("outside the runtime");
    assert_eq!(err.kind(), ErrorKind::OutsideRuntime);

    let err = resume_processing_unit(&runtime, &elastic, 0)
        .get()
        .expect_err("outside the runtime");
    assert_eq!(err.kind(), ErrorKind::OutsideRuntime);

    let err = suspend_pool(&runtime, &elastic)
        .get()
        .expect_err("outside the runtime");
    assert_eq!(err.kind(), ErrorKind::OutsideRuntime);

    let err = resume_pool(&runtime, &elastic)
        .get()
        .expect_err("outside the runtime");
    assert_eq!(err.kind(), ErrorKind::OutsideRuntime);
    test_complete!("awaitable_forms_reject_plain_threads");
}

#[test]
fn self_suspension_requires_the_stealing_mode_bit() {
    init_test("self_suspension_requires_the_stealing_mode_bit");
    let runtime = elasticity_runtime();
    let pinned = runtime.pool("pinned").cloned().expect("pinned pool");
    assert!(pinned.supports_elasticity());
    assert!(!pinned.supports_stealing());

    let rt = runtime.clone();
    let target = pinned.clone();
    let outcome = pinned
        .spawn(move || {
            let unit = current_unit().expect("running on a unit");
            let own = suspend_processing_unit(&rt, &target, unit).get();
            (unit, own)
        })
        .get()
        .expect("task ran");
    let (unit, own) = outcome;
    let err = own.expect_err("self-suspension without stealing");
    assert_eq!(err.kind(), ErrorKind::StealingDisabled);
    assert_eq!(pinned.is_unit_suspended(unit), Ok(false));

    // Suspending a *different* unit of the same no-stealing pool is fine.
    let rt = runtime.clone();
    let target = pinned.clone();
    let outcome = pinned
        .spawn(move || {
            let unit = current_unit().expect("running on a unit");
            let other = (unit + 1) % target.unit_count();
            let suspended = suspend_processing_unit(&rt, &target, other).get();
            (other, suspended)
        })
        .get()
        .expect("task ran");
    let (other, suspended) = outcome;
    suspended.expect("sibling suspension allowed");
    assert_eq!(pinned.is_unit_suspended(other), Ok(true));

    let rt = runtime.clone();
    let target = pinned.clone();
    runtime
        .spawn(move || resume_processing_unit(&rt, &target, other).get())
        .get()
        .expect("task ran")
        .expect("resume accepted");
    test_complete!("self_suspension_requires_the_stealing_mode_bit");
}

#[test]
fn unknown_unit_is_a_bounds_error() {
    init_test("unknown_unit_is_a_bounds_error");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");

    let rt = runtime.clone();
    let target = elastic.clone();
    let err = runtime
        .spawn(move || suspend_processing_unit(&rt, &target, 99).get())
        .get()
        .expect("task ran")
        .expect_err("bounds error");
    assert_eq!(err.kind(), ErrorKind::UnknownUnit);

    let err =
        suspend_processing_unit_cb(&runtime, &elastic, 99, || {}).expect_err("bounds error");
    assert_eq!(err.kind(), ErrorKind::UnknownUnit);
    test_complete!("unknown_unit_is_a_bounds_error");
}

#[test]
fn suspend_resume_round_trip_is_idempotent() {
    init_test("suspend_resume_round_trip_is_idempotent");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");

    let rt = runtime.clone();
    let target = elastic.clone();
    runtime
        .spawn_fallible(move || {
            suspend_processing_unit(&rt, &target, 1).get()?;
            assert_eq!(target.is_unit_suspended(1), Ok(true));
            // Resume is always accepted and idempotent.
            resume_processing_unit(&rt, &target, 1).get()?;
            resume_processing_unit(&rt, &target, 1).get()?;
            assert_eq!(target.is_unit_suspended(1), Ok(false));
            // Resuming a unit that was never suspended is a no-op.
            resume_processing_unit(&rt, &target, 0).get()?;
            Ok(())
        })
        .get()
        .expect("round trip");

    // The pool still schedules.
    assert_eq!(elastic.spawn(|| 5).get(), Ok(5));
    test_complete!("suspend_resume_round_trip_is_idempotent");
}

#[test]
fn a_pool_cannot_suspend_itself() {
    init_test("a_pool_cannot_suspend_itself");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");

    let rt = runtime.clone();
    let target = elastic.clone();
    let err = elastic
        .spawn(move || suspend_pool(&rt, &target).get())
        .get()
        .expect("task ran")
        .expect_err("self-suspension of the pool");
    assert_eq!(err.kind(), ErrorKind::PoolSelfSuspend);

    let rt = runtime.clone();
    let err = elastic
        .spawn(move || {
            let own = current_pool().expect("on a pool");
            suspend_pool_cb(&rt, &own, || {})
        })
        .get()
        .expect("task ran")
        .expect_err("self-suspension of the pool, callback form");
    assert_eq!(err.kind(), ErrorKind::PoolSelfSuspend);
    test_complete!("a_pool_cannot_suspend_itself");
}

#[test]
fn suspended_pool_queues_work_until_resumed() {
    init_test("suspended_pool_queues_work_until_resumed");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");

    let rt = runtime.clone();
    let target = elastic.clone();
    runtime
        .spawn(move || suspend_pool(&rt, &target).get())
        .get()
        .expect("task ran")
        .expect("pool suspended");
    for unit in 0..elastic.unit_count() {
        assert_eq!(elastic.is_unit_suspended(unit), Ok(true));
    }

    let probe = elastic.spawn(|| "ran");
    thread::sleep(Duration::from_millis(150));
    assert!(!probe.is_ready(), "no unit is scheduling while suspended");

    let rt = runtime.clone();
    let target = elastic.clone();
    runtime
        .spawn(move || resume_pool(&rt, &target).get())
        .get()
        .expect("task ran")
        .expect("pool resumed");
    assert_eq!(probe.get(), Ok("ran"));
    test_complete!("suspended_pool_queues_work_until_resumed");
}

#[test]
fn self_suspension_with_stealing_drains_local_work() {
    init_test("self_suspension_with_stealing_drains_local_work");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");
    let suspended_cb = Arc::new(AtomicBool::new(false));

    let rt = runtime.clone();
    let cb_flag = Arc::clone(&suspended_cb);
    let outcome = elastic
        .spawn(move || {
            let own_pool = current_pool().expect("on a pool");
            let unit = current_unit().expect("on a unit");
            // These land on this unit's local queue.
            let locals: Vec<_> = (0..6_usize).map(|i| own_pool.spawn(move || i)).collect();
            suspend_processing_unit_cb(&rt, &own_pool, unit, move || {
                cb_flag.store(true, Ordering::SeqCst);
            })
            .expect("self-suspension accepted with stealing");
            (unit, locals)
        })
        .get()
        .expect("task ran");
    let (unit, locals) = outcome;

    // Drained work is re-injected and completes on the remaining unit.
    for (i, local) in locals.into_iter().enumerate() {
        assert_eq!(local.get(), Ok(i));
    }
    wait_until("unit suspension", || {
        elastic.is_unit_suspended(unit) == Ok(true)
    });

    let resumed_cb = Arc::new(AtomicBool::new(false));
    let cb_flag = Arc::clone(&resumed_cb);
    resume_processing_unit_cb(&runtime, &elastic, unit, move || {
        cb_flag.store(true, Ordering::SeqCst);
    })
    .expect("resume accepted");
    wait_until("unit resume", || elastic.is_unit_suspended(unit) == Ok(false));
    wait_until("suspend callback", || suspended_cb.load(Ordering::SeqCst));
    wait_until("resume callback", || resumed_cb.load(Ordering::SeqCst));

    assert_eq!(elastic.spawn(|| 9).get(), Ok(9));
    test_complete!("self_suspension_with_stealing_drains_local_work");
}

#[test]
fn concurrent_suspend_and_resume_settle_to_one_state() {
    init_test("concurrent_suspend_and_resume_settle_to_one_state");
    let runtime = elasticity_runtime();
    let elastic = runtime.pool("elastic").cloned().expect("elastic pool");
    let callbacks = Arc::new(AtomicUsize::new(0));

    let hammers: Vec<_> = (0..4)
        .map(|worker| {
            let runtime = runtime.clone();
            let elastic = elastic.clone();
            let callbacks = Arc::clone(&callbacks);
            thread::spawn(move || {
                for round in 0..10 {
                    let counter = Arc::clone(&callbacks);
                    let result = if (worker + round) % 2 == 0 {
                        suspend_processing_unit_cb(&runtime, &elastic, 0, move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                    } else {
                        resume_processing_unit_cb(&runtime, &elastic, 0, move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                    };
                    result.expect("preconditions hold");
                }
            })
        })
        .collect();
    for hammer in hammers {
        hammer.join().expect("hammer thread");
    }
    wait_until("all callbacks", || callbacks.load(Ordering::SeqCst) == 40);

    // Settle to active and verify the pool still works.
    let settled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&settled);
    resume_processing_unit_cb(&runtime, &elastic, 0, move || {
        flag.store(true, Ordering::SeqCst);
    })
    .expect("final resume");
    wait_until("final resume callback", || settled.load(Ordering::SeqCst));
    wait_until("unit active", || elastic.is_unit_suspended(0) == Ok(false));
    assert_eq!(elastic.spawn(|| 3).get(), Ok(3));
    test_complete!("concurrent_suspend_and_resume_settle_to_one_state");
}
