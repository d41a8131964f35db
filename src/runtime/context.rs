//! Thread-local record of which pool and processing unit is running the
//! current code, if any.
//!
//! Worker threads enter their context at startup and leave it on exit;
//! everything else observes it read-only. Elasticity preconditions are
//! phrased in terms of this context: "am I inside the runtime at all?",
//! "am I on this pool?", "am I this very unit?".

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use crate::runtime::pool::WorkerPool;

struct CurrentUnit {
    pool: Weak<WorkerPool>,
    unit: usize,
}

thread_local! {
    static CURRENT: RefCell<Option<CurrentUnit>> = const { RefCell::new(None) };
}

/// Marks the calling thread as unit `unit` of `pool`.
pub(crate) fn enter(pool: &Arc<WorkerPool>, unit: usize) {
    CURRENT.with(|current| {
        *current.borrow_mut() = Some(CurrentUnit {
            pool: Arc::downgrade(pool),
            unit,
        });
    });
}

/// Clears the calling thread's context.
pub(crate) fn exit() {
    CURRENT.with(|current| {
        *current.borrow_mut() = None;
    });
}

/// Returns true when called from a task running on a pool worker.
#[must_use]
pub fn in_runtime() -> bool {
    CURRENT.with(|current| current.borrow().is_some())
}

/// Returns the pool the calling task runs on, if any.
#[must_use]
pub fn current_pool() -> Option<Arc<WorkerPool>> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(|unit| unit.pool.upgrade())
    })
}

/// Returns the calling task's processing-unit index, if any.
#[must_use]
pub fn current_unit() -> Option<usize> {
    CURRENT.with(|current| current.borrow().as_ref().map(|unit| unit.unit))
}

/// Returns true when the calling task runs on `pool`.
pub(crate) fn is_current_pool(pool: &WorkerPool) -> bool {
    current_pool().is_some_and(|current| std::ptr::eq(Arc::as_ptr(&current), pool))
}

/// Returns the calling task's unit index within `pool`, if it runs there.
pub(crate) fn current_unit_in(pool: &WorkerPool) -> Option<usize> {
    CURRENT.with(|current| {
        current.borrow().as_ref().and_then(|unit| {
            let current_pool = unit.pool.upgrade()?;
            std::ptr::eq(Arc::as_ptr(&current_pool), pool).then_some(unit.unit)
        })
    })
}
