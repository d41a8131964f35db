//! Asynchronous results: promises, result handles, and the join layer.
//!
//! The [`AsyncResult`]/[`Promise`] pair shares one completion state — a
//! one-shot cell observable by polling, blocking wait, or continuation
//! registration. [`when_some`] composes collections of such results into
//! "N of M" joins.

pub mod result;
pub mod state;
pub mod when_some;

pub use result::{AsyncResult, Promise};
pub use state::{CompletionObserver, Continuation};
pub use when_some::{when_some, when_some_n, ResultSequence, WhenSomeResult};
