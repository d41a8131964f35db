//! Low-level synchronization primitives.
//!
//! These are the two foundations everything else hands work and signals
//! through: a non-blocking bounded MPMC ring channel and a one-permit
//! semaphore with timed acquisition, plus the spinlock the channel is built
//! on. All of them are safe to use from pool tasks and plain OS threads
//! alike.

pub mod channel;
pub mod semaphore;
pub mod spinlock;

pub use channel::{BoundedChannel, TryRecvError, TrySendError};
pub use semaphore::BinarySemaphore;
pub use spinlock::{Spinlock, SpinlockGuard};
