//! Promise and asynchronous-result handles.
//!
//! [`AsyncResult::pair`] creates the producer/observer pair over one shared
//! completion state. The producer completes it exactly once with a value or
//! an error; the handle observes it by polling ([`try_get`]), blocking
//! ([`get`]) or continuation ([`register_continuation`]). Blocking works
//! from a pool task and from a plain OS thread alike: the caller's agent is
//! suspended and resumed by whichever thread completes the state.
//!
//! # Example
//!
//! ```
//! use filament::completion::AsyncResult;
//!
//! let (promise, result) = AsyncResult::pair();
//! std::thread::spawn(move || {
//!     promise.set_value(21 * 2).expect("first completion");
//! });
//! assert_eq!(result.get(), Ok(42));
//! ```
//!
//! [`try_get`]: AsyncResult::try_get
//! [`get`]: AsyncResult::get
//! [`register_continuation`]: AsyncResult::register_continuation

use std::sync::Arc;

use crate::completion::state::{CompletionObserver, CompletionState};
use crate::error::{Error, ErrorKind};
use crate::runtime::agent;

/// The producing side of an asynchronous result.
///
/// Dropping a promise without completing it completes the state with a
/// broken-promise error so that waiters are never stranded.
pub struct Promise<T> {
    state: Arc<CompletionState<T>>,
}

impl<T> Promise<T> {
    /// Completes the shared state with `value`.
    ///
    /// # Errors
    ///
    /// Completing an already-completed state is a protocol violation.
    pub fn set_value(&self, value: T) -> crate::Result<()> {
        self.state.complete(Ok(value), "filament::Promise::set_value")
    }

    /// Completes the shared state with `error`.
    ///
    /// # Errors
    ///
    /// Completing an already-completed state is a protocol violation.
    pub fn set_error(&self, error: Error) -> crate::Result<()> {
        self.state
            .complete(Err(error), "filament::Promise::set_error")
    }

    /// Returns true once the state has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.is_ready()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // No-op when the promise was fulfilled; otherwise waiters observe
        // the broken promise instead of hanging.
        let _ = self.state.complete(
            Err(Error::new(
                ErrorKind::BrokenPromise,
                "filament::Promise::drop",
                "promise dropped before completing its state",
            )),
            "filament::Promise::drop",
        );
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.state.is_ready())
            .finish()
    }
}

/// The observing side of an asynchronous result.
///
/// The handle is the single consumer of the payload; combinators observe
/// readiness without consuming, so inspecting an input after a join sees
/// its value or error intact.
pub struct AsyncResult<T> {
    state: Arc<CompletionState<T>>,
}

impl<T: Send + 'static> AsyncResult<T> {
    /// Creates a promise/result pair over a fresh pending state.
    #[must_use]
    pub fn pair() -> (Promise<T>, AsyncResult<T>) {
        let state = CompletionState::new_started();
        (
            Promise {
                state: Arc::clone(&state),
            },
            AsyncResult { state },
        )
    }

    /// Creates a result that is immediately ready with `value`.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self {
            state: CompletionState::new_completed(Ok(value)),
        }
    }

    /// Creates a result that is immediately failed with `error`.
    #[must_use]
    pub fn from_error(error: Error) -> Self {
        Self {
            state: CompletionState::new_completed(Err(error)),
        }
    }

    /// Creates a lazily-started result.
    ///
    /// `f` runs inline on the first caller that forces the result — a
    /// blocking [`get`](Self::get) or a join combinator probing its inputs —
    /// and never more than once.
    #[must_use]
    pub fn deferred(f: impl FnOnce() -> T + Send + 'static) -> Self {
        Self {
            state: CompletionState::new_deferred(move || Ok(f())),
        }
    }

    pub(crate) fn from_state(state: Arc<CompletionState<T>>) -> Self {
        Self { state }
    }

    /// Returns true once a value or error is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Non-blocking retrieval.
    ///
    /// Returns `None` while the operation is still pending. On the first
    /// call after completion the payload is taken; retrieving again is a
    /// protocol violation surfaced inside the `Some`.
    #[must_use]
    pub fn try_get(&self) -> Option<crate::Result<T>> {
        self.state.try_take("filament::AsyncResult::try_get")
    }

    /// Blocking retrieval.
    ///
    /// Forces a deferred operation, then suspends the calling context until
    /// the state completes, and returns the stored value or error.
    pub fn get(self) -> crate::Result<T> {
        self.state.force_start();
        let waiting = agent::current();
        let registered = self
            .state
            .try_register(Box::new(move || waiting.resume()))
            .is_ok();
        if registered {
            // A stale wake token at worst causes one extra loop turn.
            while !self.state.is_ready() {
                agent::suspend();
            }
        }
        match self.state.try_take("filament::AsyncResult::get") {
            Some(result) => result,
            None => unreachable!("completion state observed ready without a payload"),
        }
    }

    /// Registers a continuation to run when the state completes.
    ///
    /// If the state is already completed the continuation is invoked inline
    /// before this returns; otherwise it runs synchronously on whichever
    /// thread completes the state.
    pub fn register_continuation(&self, continuation: impl FnOnce() + Send + 'static) {
        self.state.register(Box::new(continuation));
    }

    /// The observer interface used by combinators.
    #[must_use]
    pub fn observer(&self) -> &dyn CompletionObserver {
        &*self.state
    }

    #[cfg(test)]
    pub(crate) fn was_started(&self) -> bool {
        self.state.was_started()
    }
}

impl<T> std::fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncResult")
            .field("ready", &self.state.is_ready())
            .finish()
    }
}
