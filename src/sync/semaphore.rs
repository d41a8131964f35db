//! Binary semaphore with timed acquisition.
//!
//! A [`BinarySemaphore`] holds at most one permit. [`release`] makes the
//! permit available and wakes at most one waiter; releases without an
//! intervening acquire saturate at a single outstanding permit rather than
//! accumulating. Acquisition is available in blocking, non-blocking and
//! timed forms, and works identically from a task running on a worker pool
//! and from a plain OS thread.
//!
//! Pairing this with [`BoundedChannel`](crate::sync::BoundedChannel) gives
//! blocking channel semantics: producers release after a push, consumers
//! acquire before a pop.
//!
//! [`release`]: BinarySemaphore::release

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A one-permit semaphore.
#[derive(Debug)]
pub struct BinarySemaphore {
    permit: Mutex<bool>,
    available: Condvar,
}

impl BinarySemaphore {
    /// Creates a semaphore whose permit is initially available or not.
    #[must_use]
    pub const fn new(initially_available: bool) -> Self {
        Self {
            permit: Mutex::new(initially_available),
            available: Condvar::new(),
        }
    }

    /// Blocks the calling task or thread until the permit is available,
    /// then consumes it.
    pub fn acquire(&self) {
        let mut permit = self.permit.lock();
        while !*permit {
            self.available.wait(&mut permit);
        }
        *permit = false;
    }

    /// Consumes the permit if it is currently available.
    ///
    /// Returns whether the permit was consumed.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut permit = self.permit.lock();
        if *permit {
            *permit = false;
            true
        } else {
            false
        }
    }

    /// Blocks up to `timeout`, consuming the permit if it becomes available
    /// within the bound.
    ///
    /// Returns whether the permit was consumed; on timeout the permit is
    /// left untouched.
    #[must_use]
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        self.try_acquire_until(Instant::now() + timeout)
    }

    /// Blocks up to `deadline`, consuming the permit if it becomes
    /// available in time.
    #[must_use]
    pub fn try_acquire_until(&self, deadline: Instant) -> bool {
        let mut permit = self.permit.lock();
        while !*permit {
            if self.available.wait_until(&mut permit, deadline).timed_out() {
                if *permit {
                    // Released in the same instant the wait timed out.
                    break;
                }
                return false;
            }
        }
        *permit = false;
        true
    }

    /// Makes the permit available and wakes at most one waiter.
    ///
    /// Releasing an already-available permit is a no-op; the count
    /// saturates at one.
    pub fn release(&self) {
        {
            let mut permit = self.permit.lock();
            *permit = true;
        }
        self.available.notify_one();
    }
}
