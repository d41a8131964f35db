//! Filament: an elastic many-task runtime.
//!
//! # Overview
//!
//! Filament multiplexes lightweight cooperative tasks onto fixed pools of
//! worker threads, one pinned thread per processing unit, and gives the
//! application explicit control over elasticity: individual processing
//! units — or whole pools — can be suspended and resumed at runtime, with
//! mode-bit preconditions that keep a pool from stranding its own work.
//!
//! On top of the scheduler sits an asynchronous-result layer: a
//! [`Promise`]/[`AsyncResult`] pair sharing a one-shot completion state that
//! is observable by polling, blocking wait, or continuation registration,
//! and an N-of-M join combinator ([`when_some`]) composing collections of
//! such results. Underneath sit the two primitives work and signals move
//! through: a spinlock-protected bounded MPMC ring channel
//! ([`BoundedChannel`]) and a one-permit semaphore with timed acquisition
//! ([`BinarySemaphore`]).
//!
//! Every public operation is usable both from a task running on a pool
//! worker and from a plain OS thread.
//!
//! # Module Structure
//!
//! - [`completion`]: promises, result handles, the join combinator
//! - [`runtime`]: worker pools, scheduling, elasticity control, config
//! - [`sync`]: bounded channel, binary semaphore, spinlock
//! - [`error`]: the crate error taxonomy
//! - [`test_utils`]: logging and runtime helpers shared by the test suites
//!
//! # Example
//!
//! ```
//! use filament::{when_some, Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::new(RuntimeConfig::default()).expect("runtime starts");
//! let results: Vec<_> = (0..4_u64).map(|i| runtime.spawn(move || i * i)).collect();
//!
//! // Wait for any two of the four squares.
//! let joined = when_some(&runtime, 2, results).get().expect("join");
//! assert_eq!(joined.indices.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod completion;
pub mod error;
pub mod runtime;
pub mod sync;
pub mod test_utils;
pub mod util;

pub use completion::{
    when_some, when_some_n, AsyncResult, CompletionObserver, Promise, ResultSequence,
    WhenSomeResult,
};
pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use runtime::{
    current_pool, current_unit, in_runtime, resume_pool, resume_pool_cb, resume_processing_unit,
    resume_processing_unit_cb, suspend_pool, suspend_pool_cb, suspend_processing_unit,
    suspend_processing_unit_cb, PoolConfig, Runtime, RuntimeConfig, SchedulerMode, WorkerPool,
};
pub use sync::{BinarySemaphore, BoundedChannel};
