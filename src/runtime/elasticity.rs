//! Suspend/resume helpers for processing units and whole pools.
//!
//! Every operation comes in two forms:
//!
//! - An **awaitable** form returning an [`AsyncResult<()>`], callable only
//!   from inside a running task. Called from a plain OS thread it fails
//!   with a precondition error directing the caller to the callback form.
//! - A **callback** form callable from anywhere. It runs the direct
//!   suspend/resume call and then the caller-supplied callback — as a newly
//!   submitted task when invoked from inside the runtime, on a fresh
//!   detached OS thread otherwise — so the caller's own scheduling loop is
//!   never blocked.
//!
//! Preconditions: unit-level operations require the pool's elasticity mode
//! bit. A unit suspending *itself* additionally requires the stealing bit —
//! without stealing no sibling could pick up its remaining work and wake it
//! back up. Suspending a pool from a task running on that same pool is
//! always rejected, independent of stealing. Pool-level operations carry no
//! elasticity-bit requirement of their own.
//!
//! Note that awaiting the suspension of the unit the caller itself runs on
//! cannot complete until the calling task yields the unit; use the
//! callback form for self-suspension.

use std::sync::Arc;

use crate::completion::result::AsyncResult;
use crate::error::{Error, ErrorKind};
use crate::runtime::context;
use crate::runtime::pool::WorkerPool;
use crate::runtime::Runtime;

fn unit_in_range(pool: &WorkerPool, unit: usize, op: &'static str) -> crate::Result<()> {
    if unit >= pool.unit_count() {
        return Err(Error::new(
            ErrorKind::UnknownUnit,
            op,
            format!(
                "unit {unit} out of range for pool '{}' with {} units",
                pool.name(),
                pool.unit_count()
            ),
        ));
    }
    Ok(())
}

fn elasticity_enabled(pool: &WorkerPool, op: &'static str) -> crate::Result<()> {
    if !pool.supports_elasticity() {
        return Err(Error::new(
            ErrorKind::ElasticityDisabled,
            op,
            format!(
                "pool '{}' does not support suspending processing units",
                pool.name()
            ),
        ));
    }
    Ok(())
}

fn spawn_detached(runtime: &Runtime, op: &'static str, f: impl FnOnce() + Send + 'static) -> crate::Result<()> {
    if context::in_runtime() {
        drop(runtime.spawn(f));
        Ok(())
    } else {
        std::thread::Builder::new()
            .name("filament-elasticity-cb".to_string())
            .spawn(f)
            .map(drop)
            .map_err(|err| Error::new(ErrorKind::ThreadSpawnFailed, op, err.to_string()))
    }
}

/// Awaitable form: stops `unit` of `pool` from scheduling.
///
/// The returned result completes once the unit has drained its local ready
/// state and parked. Fails with a precondition error when called from
/// outside the runtime, when the pool lacks the elasticity mode, or when
/// the caller tries to suspend its own unit on a pool without stealing;
/// fails with a bounds error for an unknown unit.
pub fn suspend_processing_unit(
    runtime: &Runtime,
    pool: &Arc<WorkerPool>,
    unit: usize,
) -> AsyncResult<()> {
    const OP: &str = "filament::suspend_processing_unit";
    if !context::in_runtime() {
        return AsyncResult::from_error(Error::new(
            ErrorKind::OutsideRuntime,
            OP,
            "cannot suspend a processing unit from outside the runtime, \
             use suspend_processing_unit_cb instead",
        ));
    }
    if let Err(err) = elasticity_enabled(pool, OP) {
        return AsyncResult::from_error(err);
    }
    if let Err(err) = unit_in_range(pool, unit, OP) {
        return AsyncResult::from_error(err);
    }
    if !pool.supports_stealing() && context::current_unit_in(pool) == Some(unit) {
        return AsyncResult::from_error(Error::new(
            ErrorKind::StealingDisabled,
            OP,
            format!(
                "pool '{}' does not support suspending processing units \
                 from themselves (no work stealing)",
                pool.name()
            ),
        ));
    }
    let pool = Arc::clone(pool);
    runtime.spawn_fallible(move || pool.suspend_processing_unit_direct(unit))
}

/// Callback form of [`suspend_processing_unit`], callable from any thread.
///
/// # Errors
///
/// Precondition and bounds violations are reported synchronously; the
/// suspension itself runs detached and fires `callback` when done.
pub fn suspend_processing_unit_cb(
    runtime: &Runtime,
    pool: &Arc<WorkerPool>,
    unit: usize,
    callback: impl FnOnce() + Send + 'static,
) -> crate::Result<()> {
    const OP: &str = "filament::suspend_processing_unit_cb";
    elasticity_enabled(pool, OP)?;
    unit_in_range(pool, unit, OP)?;
    if context::in_runtime()
        && !pool.supports_stealing()
        && context::current_unit_in(pool) == Some(unit)
    {
        return Err(Error::new(
            ErrorKind::StealingDisabled,
            OP,
            format!(
                "pool '{}' does not support suspending processing units \
                 from themselves (no work stealing)",
                pool.name()
            ),
        ));
    }

    let target = Arc::clone(pool);
    spawn_detached(runtime, OP, move || {
        if let Err(err) = target.suspend_processing_unit_direct(unit) {
            tracing::error!(error = %err, "detached unit suspension failed");
        }
        callback();
    })
}

/// Awaitable form: restores `unit` of `pool` to active scheduling.
///
/// Resuming is always safe from any unit; only the elasticity mode and the
/// inside-the-runtime precondition apply.
pub fn resume_processing_unit(
    runtime: &Runtime,
    pool: &Arc<WorkerPool>,
    unit: usize,
) -> AsyncResult<()> {
    const OP: &str = "filament::resume_processing_unit";
    if !context::in_runtime() {
        return AsyncResult::from_error(Error::new(
            ErrorKind::OutsideRuntime,
            OP,
            "cannot resume a processing unit from outside the runtime, \
             use resume_processing_unit_cb instead",
        ));
    }
    if let Err(err) = elasticity_enabled(pool, OP) {
        return AsyncResult::from_error(err);
    }
    if let Err(err) = unit_in_range(pool, unit, OP) {
        return AsyncResult::from_error(err);
    }
    let pool = Arc::clone(pool);
    runtime.spawn_fallible(move || pool.resume_processing_unit_direct(unit))
}

/// Callback form of [`resume_processing_unit`], callable from any thread.
///
/// # Errors
///
/// Precondition and bounds violations are reported synchronously.
pub fn resume_processing_unit_cb(
    runtime: &Runtime,
    pool: &Arc<WorkerPool>,
    unit: usize,
    callback: impl FnOnce() + Send + 'static,
) -> crate::Result<()> {
    const OP: &str = "filament::resume_processing_unit_cb";
    elasticity_enabled(pool, OP)?;
    unit_in_range(pool, unit, OP)?;

    let target = Arc::clone(pool);
    spawn_detached(runtime, OP, move || {
        if let Err(err) = target.resume_processing_unit_direct(unit) {
            tracing::error!(error = %err, "detached unit resume failed");
        }
        callback();
    })
}

/// Awaitable form: suspends every unit of `pool`.
///
/// A pool can never be suspended from a task running on that same pool —
/// it would pull its own caller out from under itself — regardless of the
/// stealing mode.
pub fn suspend_pool(runtime: &Runtime, pool: &Arc<WorkerPool>) -> AsyncResult<()> {
    const OP: &str = "filament::suspend_pool";
    if !context::in_runtime() {
        return AsyncResult::from_error(Error::new(
            ErrorKind::OutsideRuntime,
            OP,
            "cannot suspend a pool from outside the runtime, use suspend_pool_cb instead",
        ));
    }
    if context::is_current_pool(pool) {
        return AsyncResult::from_error(Error::new(
            ErrorKind::PoolSelfSuspend,
            OP,
            format!("cannot suspend pool '{}' from itself", pool.name()),
        ));
    }
    let pool = Arc::clone(pool);
    runtime.spawn_fallible(move || pool.suspend_direct())
}

/// Callback form of [`suspend_pool`], callable from any thread.
///
/// # Errors
///
/// The self-suspension precondition is reported synchronously.
pub fn suspend_pool_cb(
    runtime: &Runtime,
    pool: &Arc<WorkerPool>,
    callback: impl FnOnce() + Send + 'static,
) -> crate::Result<()> {
    const OP: &str = "filament::suspend_pool_cb";
    if context::is_current_pool(pool) {
        return Err(Error::new(
            ErrorKind::PoolSelfSuspend,
            OP,
            format!("cannot suspend pool '{}' from itself", pool.name()),
        ));
    }
    let target = Arc::clone(pool);
    spawn_detached(runtime, OP, move || {
        if let Err(err) = target.suspend_direct() {
            tracing::error!(error = %err, "detached pool suspension failed");
        }
        callback();
    })
}

/// Awaitable form: resumes every unit of `pool`.
pub fn resume_pool(runtime: &Runtime, pool: &Arc<WorkerPool>) -> AsyncResult<()> {
    const OP: &str = "filament::resume_pool";
    if !context::in_runtime() {
        return AsyncResult::from_error(Error::new(
            ErrorKind::OutsideRuntime,
            OP,
            "cannot resume a pool from outside the runtime, use resume_pool_cb instead",
        ));
    }
    let pool = Arc::clone(pool);
    runtime.spawn_fallible(move || pool.resume_direct())
}

/// Callback form of [`resume_pool`], callable from any thread.
///
/// # Errors
///
/// Fails only when the detached callback thread cannot be spawned.
pub fn resume_pool_cb(
    runtime: &Runtime,
    pool: &Arc<WorkerPool>,
    callback: impl FnOnce() + Send + 'static,
) -> crate::Result<()> {
    const OP: &str = "filament::resume_pool_cb";
    let target = Arc::clone(pool);
    spawn_detached(runtime, OP, move || {
        if let Err(err) = target.resume_direct() {
            tracing::error!(error = %err, "detached pool resume failed");
        }
        callback();
    })
}
